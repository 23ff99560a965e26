//! Debounced search controller tests, run on a paused clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::{sleep, Instant};
use vet_records_core::notify::{messages, ChannelNotifier};
use vet_records_core::search::{FilterKind, SearchConfig, SearchController, SearchState};
use vet_records_core::store::{
    Predicate, Record, RemoteQueryError, StoreResult, TableQuery, TableStore,
};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// How the store answers one query.
#[derive(Clone, Copy, Default)]
struct Step {
    delay: Duration,
    fail: bool,
}

/// Table store that evaluates predicates in memory and answers
/// according to a script.
struct ScriptedStore {
    patients: Vec<Record>,
    calls: Mutex<Vec<TableQuery>>,
    script: Mutex<VecDeque<Step>>,
}

impl ScriptedStore {
    fn new() -> Arc<Self> {
        let patients = [
            ("p1", "Bob", "dog", "Labrador", 2.0),
            ("p2", "Bia", "cat", "Siamês", 4.0),
            ("p3", "Mia", "cat", "Persa", 9.0),
        ]
        .into_iter()
        .map(|(id, name, species, breed, age)| {
            let value = json!({
                "id": id, "name": name, "species": species, "breed": breed,
                "age": age, "weight": 5.0, "sex": "female"
            });
            value.as_object().unwrap().clone()
        })
        .collect();

        Arc::new(Self {
            patients,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        })
    }

    fn then(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    fn calls(&self) -> Vec<TableQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableStore for ScriptedStore {
    async fn query(&self, query: &TableQuery) -> StoreResult<Vec<Record>> {
        self.calls.lock().unwrap().push(query.clone());
        let step = self.script.lock().unwrap().pop_front().unwrap_or_default();

        if !step.delay.is_zero() {
            sleep(step.delay).await;
        }
        if step.fail {
            return Err(RemoteQueryError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(self
            .patients
            .iter()
            .filter(|r| query.filters.iter().all(|p| p.matches(r)))
            .cloned()
            .collect())
    }

    async fn insert(&self, _table: &str, _fields: Record) -> StoreResult<Record> {
        unreachable!()
    }

    async fn update(&self, _table: &str, _id: &str, _fields: Record) -> StoreResult<Record> {
        unreachable!()
    }

    async fn delete(&self, _table: &str, _id: &str) -> StoreResult<()> {
        unreachable!()
    }
}

fn text_filter(text: &str) -> Predicate {
    Predicate::any(vec![
        Predicate::contains("name", text),
        Predicate::contains("breed", text),
    ])
}

fn spawn(
    store: &Arc<ScriptedStore>,
) -> (
    vet_records_core::search::SearchHandle,
    tokio::sync::mpsc::UnboundedReceiver<vet_records_core::Notification>,
) {
    let (notifier, rx) = ChannelNotifier::new();
    let handle = SearchController::spawn(
        store.clone(),
        Arc::new(notifier),
        SearchConfig { debounce: DEBOUNCE },
    );
    (handle, rx)
}

#[tokio::test(start_paused = true)]
async fn test_fast_typing_sends_one_query() {
    let store = ScriptedStore::new();
    let (handle, _rx) = spawn(&store);
    let mut updates = handle.subscribe();

    for text in ["b", "bo", "bob"] {
        handle.keystroke(text).unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(
            handle.snapshot().state,
            SearchState::PendingDebounce(text.to_string())
        );
    }
    assert!(store.calls().is_empty());

    sleep(DEBOUNCE).await;
    let snapshot = updates.wait_for(|s| s.generation == 1).await.unwrap().clone();

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].filters, vec![text_filter("bob")]);
    assert_eq!(snapshot.query, "bob");
    assert_eq!(snapshot.state, SearchState::Idle);
    assert_eq!(snapshot.patients.len(), 1);
    assert_eq!(snapshot.patients[0].name, "Bob");
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_queries_immediately() {
    let store = ScriptedStore::new();
    let (handle, _rx) = spawn(&store);
    let mut updates = handle.subscribe();

    let start = Instant::now();
    handle.select_filter(FilterKind::Species, "cat").unwrap();
    let snapshot = updates.wait_for(|s| s.generation == 1).await.unwrap().clone();

    assert!(start.elapsed() < DEBOUNCE);
    assert_eq!(store.calls().len(), 1);
    assert_eq!(store.calls()[0].filters, vec![Predicate::eq("species", "cat")]);
    assert_eq!(snapshot.patients.len(), 2);
    assert_eq!(snapshot.filters.selection(FilterKind::Species), "cat");
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_uses_settled_text() {
    let store = ScriptedStore::new();
    let (handle, _rx) = spawn(&store);
    let mut updates = handle.subscribe();

    handle.keystroke("mi").unwrap();
    handle.select_filter(FilterKind::Species, "cat").unwrap();
    let snapshot = updates.wait_for(|s| s.generation == 1).await.unwrap().clone();

    assert_eq!(store.calls()[0].filters, vec![Predicate::eq("species", "cat")]);
    assert_eq!(snapshot.state, SearchState::PendingDebounce("mi".to_string()));
    assert_eq!(snapshot.patients.len(), 2);

    sleep(DEBOUNCE).await;
    let snapshot = updates.wait_for(|s| s.generation == 2).await.unwrap().clone();
    assert_eq!(
        store.calls()[1].filters,
        vec![text_filter("mi"), Predicate::eq("species", "cat")]
    );
    assert_eq!(snapshot.patients.len(), 1);
    assert_eq!(snapshot.patients[0].name, "Mia");
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_is_discarded() {
    let store = ScriptedStore::new();
    store.then(Step {
        delay: Duration::from_millis(500),
        fail: false,
    });
    let (handle, _rx) = spawn(&store);
    let mut updates = handle.subscribe();

    handle.refresh().unwrap();
    handle.select_filter(FilterKind::Species, "dog").unwrap();
    let snapshot = updates.wait_for(|s| s.generation == 1).await.unwrap().clone();
    assert_eq!(snapshot.patients.len(), 1);
    assert_eq!(snapshot.state, SearchState::Idle);

    // Slow, unfiltered response lands after the fresh one.
    sleep(Duration::from_millis(600)).await;
    let snapshot = handle.snapshot();
    assert_eq!(store.calls().len(), 2);
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.patients.len(), 1);
    assert_eq!(snapshot.patients[0].name, "Bob");
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_results_and_notifies_once() {
    let store = ScriptedStore::new();
    let (handle, mut rx) = spawn(&store);
    let mut updates = handle.subscribe();

    handle.refresh().unwrap();
    updates.wait_for(|s| s.generation == 1).await.unwrap();
    assert_eq!(handle.snapshot().patients.len(), 3);

    store.then(Step {
        delay: Duration::ZERO,
        fail: true,
    });
    handle.select_filter(FilterKind::Species, "dog").unwrap();

    let notification = rx.recv().await.unwrap();
    assert!(notification.is_error());
    assert_eq!(notification.description, messages::SEARCH_FAILED);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.patients.len(), 3);
    assert_eq!(snapshot.state, SearchState::Idle);

    sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(store.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_failure_is_silent() {
    let store = ScriptedStore::new();
    store.then(Step {
        delay: Duration::from_millis(500),
        fail: true,
    });
    let (handle, mut rx) = spawn(&store);
    let mut updates = handle.subscribe();

    handle.refresh().unwrap();
    handle.refresh().unwrap();
    updates.wait_for(|s| s.generation == 1).await.unwrap();

    sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(handle.snapshot().patients.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_pending_work() {
    let store = ScriptedStore::new();
    let (handle, mut rx) = spawn(&store);
    let updates = handle.subscribe();

    handle.keystroke("bob").unwrap();
    handle.shutdown().await;

    sleep(Duration::from_secs(1)).await;
    assert!(store.calls().is_empty());
    assert!(rx.try_recv().is_err());
    assert!(updates.has_changed().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_drops_in_flight_request() {
    let store = ScriptedStore::new();
    store.then(Step {
        delay: Duration::from_millis(500),
        fail: true,
    });
    let (handle, mut rx) = spawn(&store);

    handle.refresh().unwrap();
    tokio::task::yield_now().await;
    drop(handle);

    sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());
}
