use colored::*;
use terminal_size::{Width, Height, terminal_size};

use crate::client::Agent;

pub fn print_header(base_url: &str, agent: Option<&Agent>, connected: bool) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "mastra-chat".magenta().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let status = if connected {
        "connected".green()
    } else {
        "example mode".yellow()
    };
    println!("  {}  •  {}", base_url.cyan(), status);

    if let Some(agent) = agent {
        println!("  {} {}", "agent:".black().bold(), agent_label(agent));
    }

    println!("{}", line.black().bold());
}

pub fn agent_label(agent: &Agent) -> String {
    format!("{} ({})", agent.name.bold(), agent.id)
}

pub fn print_agents(agents: &[Agent], selected: Option<&str>) {
    for agent in agents {
        let marker = if Some(agent.id.as_str()) == selected {
            "▸".green().bold()
        } else {
            " ".normal()
        };
        println!("  {} {}", marker, agent_label(agent));
        if let Some(description) = &agent.description {
            println!("      {}", description.black().bold());
        }
        if let Some(model) = &agent.model {
            println!("      {} {}", "model:".black().bold(), model);
        }
    }
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}
