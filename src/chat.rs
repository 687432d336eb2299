//! Chat session — conversation state over an [`AgentClient`].
//!
//! Keeps the history, the agent catalogue and the selected agent, and turns
//! client failures into something the user can still read.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Agent, AgentClient, Message, ReqwestTransport, StreamHandler, Transport};
use crate::error::Error;
use crate::Result;

/// Assistant reply recorded when generation fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I ran into a technical problem. Please check that your Mastra server is running.";

/// Agents offered when the server is unreachable or has none.
pub fn example_agents() -> Vec<Agent> {
    vec![
        Agent::new("creative-writer", "Creative Writer")
            .with_description("Helps with creative writing, storytelling and copy"),
        Agent::new("tech-advisor", "Tech Advisor")
            .with_description("Advice on programming, architecture and technology choices"),
        Agent::new("data-analyst", "Data Analyst")
            .with_description("Assists with data analysis, visualisation and insights"),
    ]
}

/// A conversation with one agent server.
pub struct ChatSession<T: Transport = ReqwestTransport> {
    client: AgentClient<T>,
    agents: Vec<Agent>,
    selected: Option<String>,
    default_agent: Option<String>,
    connected: bool,
    history: Vec<Message>,
}

impl<T: Transport> ChatSession<T> {
    /// Create a session showing the example catalogue until [`connect`](Self::connect).
    pub fn new(client: AgentClient<T>, default_agent: Option<String>) -> Self {
        let agents = example_agents();
        let selected = agents.first().map(|a| a.id.clone());
        Self {
            client,
            agents,
            selected,
            default_agent,
            connected: false,
            history: Vec::new(),
        }
    }

    /// Load the server's agents, falling back to the examples.
    ///
    /// Returns whether the server offered any agents.
    pub async fn connect(&mut self) -> bool {
        let agents = self.client.list_agents().await;

        if agents.is_empty() {
            warn!("No agents available from server, using examples");
            self.agents = example_agents();
            self.connected = false;
        } else {
            info!("Connected: {} agents available", agents.len());
            self.agents = agents;
            self.connected = true;
        }

        let preferred = self
            .default_agent
            .as_deref()
            .filter(|id| self.agents.iter().any(|a| a.id == *id));
        self.selected = preferred
            .map(str::to_string)
            .or_else(|| self.agents.first().map(|a| a.id.clone()));

        self.connected
    }

    pub fn select_agent(&mut self, id: &str) -> Result<()> {
        if !self.agents.iter().any(|a| a.id == id) {
            return Err(Error::UnknownAgent(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn selected_agent(&self) -> Option<&Agent> {
        let id = self.selected.as_deref()?;
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn client(&self) -> &AgentClient<T> {
        &self.client
    }

    /// Clear conversation history.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Send `input` and stream the reply into `on_chunk`.
    ///
    /// Returns the assistant message appended to the history: the reply,
    /// the partial text shown before cancellation, or [`FALLBACK_REPLY`].
    /// Blank input or no selected agent sends nothing and returns `None`.
    pub async fn send<F: FnMut(&str)>(
        &mut self,
        input: &str,
        on_chunk: F,
        cancel: &CancellationToken,
    ) -> Option<&Message> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let agent_id = self.selected.clone()?;

        self.history.push(Message::user(input).stamped());

        let mut turn = Turn {
            on_chunk,
            shown: String::new(),
            completed: None,
            failed: false,
        };
        self.client
            .stream_generate(&agent_id, &self.history, &mut turn, cancel)
            .await;

        let content = if turn.failed {
            FALLBACK_REPLY.to_string()
        } else if let Some(text) = turn.completed {
            text
        } else if !turn.shown.is_empty() {
            debug!("Keeping {} chars of cancelled reply", turn.shown.len());
            turn.shown
        } else {
            return None;
        };

        self.history.push(Message::assistant(content).stamped());
        self.history.last()
    }
}

/// Handler for one reply; forwards chunks and remembers how it ended.
struct Turn<F> {
    on_chunk: F,
    shown: String,
    completed: Option<String>,
    failed: bool,
}

impl<F: FnMut(&str)> StreamHandler for Turn<F> {
    fn on_chunk(&mut self, snapshot: &str) {
        self.shown.clear();
        self.shown.push_str(snapshot);
        (self.on_chunk)(snapshot);
    }

    fn on_complete(&mut self, full_text: &str) {
        self.completed = Some(full_text.to_string());
    }

    fn on_error(&mut self, _error: &Error) {
        self.failed = true;
    }
}
