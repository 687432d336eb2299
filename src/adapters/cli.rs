//! CLI adapter — interactive and single-message command line interface.
//!
//! Replies are printed as they are revealed; only the new suffix of each
//! snapshot is written so the terminal never redraws.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatSession, FALLBACK_REPLY};
use crate::client::Transport;
use crate::ui;
use crate::Result;

/// Token of the reply currently streaming, if any.
///
/// Shared with the Ctrl+C handler so an interrupt cancels the reply instead
/// of the process.
pub type ActiveReply = Arc<Mutex<Option<CancellationToken>>>;

/// CLI channel for interactive agent sessions.
pub struct CliChannel<T: Transport> {
    session: ChatSession<T>,
    active: ActiveReply,
}

impl<T: Transport> CliChannel<T> {
    /// Create a new CLI channel.
    pub fn new(session: ChatSession<T>, active: ActiveReply) -> Self {
        Self { session, active }
    }

    pub fn session(&self) -> &ChatSession<T> {
        &self.session
    }

    /// Send one message and print the streamed reply.
    ///
    /// Returns `false` when the reply was the fallback for a failed request.
    pub async fn run_once(&mut self, message: &str) -> Result<bool> {
        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.active.lock() {
            *slot = Some(cancel.clone());
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner());
        spinner.set_message("awaiting reply");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut stdout = io::stdout();
        let mut reveal = Reveal::default();
        let on_chunk = |snapshot: &str| {
            let (first, fresh) = reveal.advance(snapshot);
            if first {
                spinner.finish_and_clear();
                print!("\n{}: ", "Agent".green().bold());
            }
            print!("{}", fresh);
            let _ = stdout.flush();
        };

        let reply = self
            .session
            .send(message, on_chunk, &cancel)
            .await
            .map(|m| m.content.clone());
        spinner.finish_and_clear();

        if let Ok(mut slot) = self.active.lock() {
            *slot = None;
        }

        match reply {
            Some(content) if content == FALLBACK_REPLY => {
                ui::print_error(&content);
                Ok(false)
            }
            Some(_) => {
                if cancel.is_cancelled() {
                    println!(" {}", "[interrupted]".black().bold());
                } else {
                    println!();
                }
                Ok(true)
            }
            None => {
                if cancel.is_cancelled() {
                    println!("{}", "[interrupted]".black().bold());
                }
                Ok(true)
            }
        }
    }

    /// Run interactive REPL loop.
    pub async fn run_interactive(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            // Print prompt
            print!("\n{} ", ">".blue().bold());
            stdout.flush()?;

            // Read input
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            // Check for exit commands
            if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q") {
                println!("Goodbye! 👋");
                break;
            }

            if let Some(command) = input.strip_prefix('/') {
                self.run_command(command);
                continue;
            }

            self.run_once(input).await?;
        }

        Ok(())
    }

    fn run_command(&mut self, command: &str) {
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("clear"), _) => {
                self.session.clear();
                ui::print_success("Conversation cleared");
            }
            (Some("agents"), _) => {
                let selected = self.session.selected_agent().map(|a| a.id.clone());
                ui::print_agents(self.session.agents(), selected.as_deref());
            }
            (Some("agent"), Some(id)) => match self.session.select_agent(id) {
                Ok(()) => ui::print_success(&format!("Now talking to {}", id)),
                Err(e) => ui::print_error(&e.to_string()),
            },
            (Some("agent"), None) => self.pick_agent(),
            _ => ui::print_warning("Commands: /clear, /agents, /agent [id], exit"),
        }
    }

    fn pick_agent(&mut self) {
        let labels: Vec<String> = self.session.agents().iter().map(ui::agent_label).collect();
        let Ok(choice) = inquire::Select::new("Choose an agent:", labels.clone()).prompt() else {
            return;
        };
        let Some(index) = labels.iter().position(|l| *l == choice) else {
            return;
        };
        let id = self.session.agents()[index].id.clone();
        if self.session.select_agent(&id).is_ok() {
            ui::print_success(&format!("Now talking to {}", id));
        }
    }
}

/// How much of the growing reply is already on screen.
#[derive(Default)]
struct Reveal {
    started: bool,
    printed: usize,
}

impl Reveal {
    /// Whether `snapshot` is the first one, and the part not yet printed.
    fn advance<'a>(&mut self, snapshot: &'a str) -> (bool, &'a str) {
        let first = !self.started;
        self.started = true;
        let fresh = snapshot.get(self.printed..).unwrap_or("");
        self.printed = snapshot.len();
        (first, fresh)
    }
}
