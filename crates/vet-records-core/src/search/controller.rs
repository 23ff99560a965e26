//! Debounced search controller.
//!
//! A single task owns the search state. Keystrokes restart a quiet-period
//! timer; filter changes, filter resets and refreshes query immediately with
//! the already-settled text. Every request carries a sequence number and
//! only the response to the most recently issued request is applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::{search_patients, FilterKind, FilterUpdate, SearchError, SearchFilters, SearchResult};
use crate::config::{ClinicConfig, DEFAULT_DEBOUNCE_MS};
use crate::models::Patient;
use crate::notify::{messages, Notification, Notifier};
use crate::store::TableStore;

/// Where the controller is in its input cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    /// Results correspond to the current inputs.
    Idle,
    /// Typed text waiting for the quiet period to elapse.
    PendingDebounce(String),
    /// Latest request is in flight.
    Querying,
}

/// Observable controller state.
#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub state: SearchState,
    /// Settled query text (the one results were requested with)
    pub query: String,
    pub filters: SearchFilters,
    /// Results of the latest applied response
    pub patients: Arc<Vec<Patient>>,
    /// Number of responses applied so far
    pub generation: u64,
}

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl From<&ClinicConfig> for SearchConfig {
    fn from(config: &ClinicConfig) -> Self {
        Self {
            debounce: config.search_debounce,
        }
    }
}

#[derive(Debug)]
enum Command {
    Keystroke(String),
    SetFilter(FilterUpdate),
    ClearFilters,
    Refresh,
    Shutdown,
}

type Response = (u64, SearchResult<Vec<Patient>>);

/// Search state machine, run as a task by [`SearchController::spawn`].
pub struct SearchController {
    store: Arc<dyn TableStore>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    query: String,
    pending: Option<String>,
    deadline: Option<Instant>,
    filters: SearchFilters,
    patients: Arc<Vec<Patient>>,
    generation: u64,
    /// Sequence number of the most recently issued request
    issued: u64,
    /// Task running the most recently issued request
    latest_task: Option<Id>,
    awaiting_latest: bool,
    in_flight: JoinSet<Response>,
    snapshot: watch::Sender<SearchSnapshot>,
}

impl SearchController {
    /// Start the controller on the current tokio runtime.
    ///
    /// Nothing is queried until the first input or [`SearchHandle::refresh`].
    pub fn spawn(
        store: Arc<dyn TableStore>,
        notifier: Arc<dyn Notifier>,
        config: SearchConfig,
    ) -> SearchHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SearchSnapshot {
            state: SearchState::Idle,
            query: String::new(),
            filters: SearchFilters::default(),
            patients: Arc::new(Vec::new()),
            generation: 0,
        });

        let controller = SearchController {
            store,
            notifier,
            debounce: config.debounce,
            query: String::new(),
            pending: None,
            deadline: None,
            filters: SearchFilters::default(),
            patients: Arc::new(Vec::new()),
            generation: 0,
            issued: 0,
            latest_task: None,
            awaiting_latest: false,
            in_flight: JoinSet::new(),
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(controller.run(commands_rx));

        SearchHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.settle();
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.complete(joined);
                }
            }
        }

        let dropped = self.in_flight.len();
        self.in_flight.abort_all();
        debug!(dropped, "search controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Keystroke(text) => {
                self.pending = Some(text);
                self.deadline = Some(Instant::now() + self.debounce);
                self.publish();
            }
            Command::SetFilter(update) => {
                self.filters.apply(update);
                self.issue();
            }
            Command::ClearFilters => {
                self.filters.clear();
                self.issue();
            }
            Command::Refresh => self.issue(),
            Command::Shutdown => {}
        }
    }

    fn settle(&mut self) {
        self.deadline = None;
        if let Some(text) = self.pending.take() {
            self.query = text;
            self.issue();
        }
    }

    fn issue(&mut self) {
        self.issued += 1;
        let seq = self.issued;
        let store = Arc::clone(&self.store);
        let query = self.query.clone();
        let filters = self.filters.clone();
        debug!(seq, query = %query, ?filters, "issuing search");

        let task = self.in_flight.spawn(async move {
            let result = search_patients(store.as_ref(), &query, &filters).await;
            (seq, result)
        });
        self.latest_task = Some(task.id());
        self.awaiting_latest = true;
        self.publish();
    }

    fn complete(&mut self, joined: Result<Response, JoinError>) {
        let (seq, result) = match joined {
            Ok(response) => response,
            Err(err) if Some(err.id()) == self.latest_task => {
                warn!(error = %err, seq = self.issued, "search task failed");
                self.awaiting_latest = false;
                self.notifier
                    .notify(Notification::error(messages::SEARCH_FAILED));
                self.publish();
                return;
            }
            Err(err) => {
                debug!(error = %err, "stale search task failed");
                return;
            }
        };

        if seq != self.issued {
            debug!(seq, latest = self.issued, "discarding stale search response");
            return;
        }

        self.awaiting_latest = false;
        match result {
            Ok(patients) => {
                self.patients = Arc::new(patients);
                self.generation += 1;
            }
            Err(err) => {
                warn!(error = %err, seq, "patient search failed");
                self.notifier
                    .notify(Notification::error(messages::SEARCH_FAILED));
            }
        }
        self.publish();
    }

    fn state(&self) -> SearchState {
        match (&self.pending, self.awaiting_latest) {
            (Some(text), _) => SearchState::PendingDebounce(text.clone()),
            (None, true) => SearchState::Querying,
            (None, false) => SearchState::Idle,
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(SearchSnapshot {
            state: self.state(),
            query: self.query.clone(),
            filters: self.filters.clone(),
            patients: Arc::clone(&self.patients),
            generation: self.generation,
        });
    }
}

/// Caller side of a running [`SearchController`].
///
/// Dropping the handle stops the controller and drops in-flight requests.
pub struct SearchHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SearchSnapshot>,
    task: JoinHandle<()>,
}

impl SearchHandle {
    /// Record a change of the search text.
    pub fn keystroke(&self, text: impl Into<String>) -> SearchResult<()> {
        self.send(Command::Keystroke(text.into()))
    }

    /// Change one filter and query immediately. `"all"` clears it.
    pub fn select_filter(&self, kind: FilterKind, value: &str) -> SearchResult<()> {
        self.send(Command::SetFilter(FilterUpdate::parse(kind, value)?))
    }

    /// [`select_filter`](Self::select_filter) by filter name.
    pub fn select_filter_by_name(&self, name: &str, value: &str) -> SearchResult<()> {
        self.select_filter(name.parse()?, value)
    }

    /// Reset every filter to `"all"` and query immediately.
    pub fn clear_filters(&self) -> SearchResult<()> {
        self.send(Command::ClearFilters)
    }

    /// Re-run the search with the current inputs.
    pub fn refresh(&self) -> SearchResult<()> {
        self.send(Command::Refresh)
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the controller and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "search controller task failed");
        }
    }

    fn send(&self, command: Command) -> SearchResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SearchError::ControllerClosed)
    }
}
