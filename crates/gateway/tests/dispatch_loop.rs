use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use es_domain::config::SchedulerConfig;
use es_gateway::runtime::entries::{validate, Coordinate, Entry, EntryStore, NewEntry, NotFound};
use es_gateway::runtime::mailer::{DeliveryError, DeliverySink, OutboundMessage};
use es_gateway::runtime::weather::{FetchError, WeatherClient};
use es_gateway::runtime::{Dispatcher, PollLoop, Scheduler};

// ── Fakes ───────────────────────────────────────────────────────────

/// Returns `payload` after `delay`; fails while `failing` is set.
struct FakeWeather {
    payload: Value,
    delay: Duration,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeWeather {
    fn new(payload: Value) -> Self {
        Self {
            payload,
            delay: Duration::ZERO,
            failing: Mutex::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(payload: Value, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(payload)
        }
    }
}

#[async_trait]
impl WeatherClient for FakeWeather {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.failing.lock() {
            return Err(FetchError::Http("connection refused".into()));
        }
        Ok(self.payload.clone())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl Outbox {
    fn count_to(&self, to: &str) -> usize {
        self.sent.lock().iter().filter(|m| m.to == to).count()
    }
}

#[async_trait]
impl DeliverySink for Outbox {
    fn name(&self) -> &'static str {
        "outbox"
    }
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

struct BouncingSink;

#[async_trait]
impl DeliverySink for BouncingSink {
    fn name(&self) -> &'static str {
        "bouncing"
    }
    async fn deliver(&self, _message: &OutboundMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Sink("mailbox unavailable".into()))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn due_entry(store: &EntryStore, recipient: &str) -> Entry {
    let input = NewEntry {
        recipient: Some(recipient.into()),
        fire_date: Some("2025-01-01".into()),
        fire_time: Some("00:00".into()),
        fire_timezone: Some("UTC".into()),
        latitude: Some(Coordinate::Number(0.0)),
        longitude: Some(Coordinate::Number(0.0)),
    };
    store.create(validate(&input).unwrap())
}

fn poll_loop(store: Arc<EntryStore>, weather: Arc<FakeWeather>, outbox: Arc<Outbox>) -> PollLoop {
    let dispatcher = Dispatcher::new(weather, outbox, Duration::from_secs(5));
    PollLoop::new(store, dispatcher, &SchedulerConfig::default())
}

fn after_due() -> DateTime<Utc> {
    "2025-01-01T00:00:01Z".parse().unwrap()
}

const CONDITIONS: &str = r#"{"temperature": 18.5, "windspeed": 4.2, "time": "2025-01-01T00:00"}"#;

fn conditions() -> Value {
    serde_json::from_str(CONDITIONS).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_dispatch_keeps_entry_then_success_removes_it_once() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::new(conditions()));
    let outbox = Arc::new(Outbox::default());
    let entry = due_entry(&store, "a@example.com");
    let p = poll_loop(store.clone(), weather.clone(), outbox.clone());

    *weather.failing.lock() = true;
    let report = p.run_once(after_due()).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(store.get(&entry.id).unwrap(), entry);
    assert_eq!(store.delivery_count(), 0);

    *weather.failing.lock() = false;
    let report = p.run_once(after_due()).await;
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.removed, 1);
    assert!(store.get(&entry.id).is_err());
    assert_eq!(store.records_for(&entry.id).len(), 1);

    // Nothing left to do.
    let report = p.run_once(after_due()).await;
    assert_eq!(report.scanned, 0);
    assert_eq!(store.delivery_count(), 1);
    assert_eq!(outbox.count_to("a@example.com"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cycles_never_double_dispatch() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::slow(conditions(), Duration::from_millis(150)));
    let outbox = Arc::new(Outbox::default());
    let recipients: Vec<String> = (0..10).map(|i| format!("user{i}@example.com")).collect();
    for r in &recipients {
        due_entry(&store, r);
    }

    let a = Arc::new(poll_loop(store.clone(), weather.clone(), outbox.clone()));
    let b = Arc::new(poll_loop(store.clone(), weather.clone(), outbox.clone()));

    let (ra, rb) = tokio::join!(
        {
            let a = a.clone();
            tokio::spawn(async move { a.run_once(after_due()).await })
        },
        {
            let b = b.clone();
            tokio::spawn(async move { b.run_once(after_due()).await })
        },
    );
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.dispatched + rb.dispatched, 10);
    assert_eq!(ra.removed + rb.removed, 10);
    for r in &recipients {
        assert_eq!(outbox.count_to(r), 1, "{r} dispatched more than once");
    }
    assert_eq!(store.delivery_count(), 10);
    assert!(store.is_empty());
    assert_eq!(store.in_flight_count(), 0);
}

#[tokio::test]
async fn malformed_payload_still_delivers_fallback() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::new(json!({ "reason": "upstream hiccup" })));
    let outbox = Arc::new(Outbox::default());
    let entry = due_entry(&store, "a@example.com");

    let report = poll_loop(store.clone(), weather, outbox.clone())
        .run_once(after_due())
        .await;

    assert_eq!(report.dispatched, 1);
    let records = store.records_for(&entry.id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject, "Weather update");
    assert_eq!(records[0].external_snapshot, json!({ "reason": "upstream hiccup" }));
    let sent = outbox.sent.lock();
    assert!(sent[0].body.contains("Could not fetch detailed weather"));
}

#[tokio::test]
async fn delete_after_dispatch_is_not_found() {
    let store = Arc::new(EntryStore::new());
    let entry = due_entry(&store, "a@example.com");
    poll_loop(
        store.clone(),
        Arc::new(FakeWeather::new(conditions())),
        Arc::new(Outbox::default()),
    )
    .run_once(after_due())
    .await;

    assert_eq!(store.delete(&entry.id), Err(NotFound(entry.id)));
    assert_eq!(store.delivery_count(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn delete_during_dispatch_keeps_the_record() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::slow(conditions(), Duration::from_millis(200)));
    let entry = due_entry(&store, "a@example.com");
    let p = Arc::new(poll_loop(store.clone(), weather, Arc::new(Outbox::default())));

    let cycle = {
        let p = p.clone();
        tokio::spawn(async move { p.run_once(after_due()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.is_claimed(&entry.id));
    assert!(store.delete(&entry.id).is_ok());

    let report = cycle.await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(store.records_for(&entry.id).len(), 1);
}

#[tokio::test]
async fn entries_created_mid_cycle_wait_for_the_next_one() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::slow(conditions(), Duration::from_millis(150)));
    due_entry(&store, "first@example.com");
    let p = Arc::new(poll_loop(store.clone(), weather, Arc::new(Outbox::default())));

    let cycle = {
        let p = p.clone();
        tokio::spawn(async move { p.run_once(after_due()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let late = due_entry(&store, "late@example.com");

    let report = cycle.await.unwrap();
    assert_eq!(report.scanned, 1);
    assert!(store.get(&late.id).is_ok());
}

#[tokio::test]
async fn double_start_runs_one_driver() {
    let store = Arc::new(EntryStore::new());
    let weather = Arc::new(FakeWeather::new(conditions()));
    let outbox = Arc::new(Outbox::default());
    due_entry(&store, "a@example.com");
    let scheduler = Scheduler::new(Arc::new(poll_loop(store.clone(), weather.clone(), outbox.clone())));

    assert!(scheduler.start());
    assert!(!scheduler.start());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(scheduler.status().cycles_completed, 1);
    assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outbox.count_to("a@example.com"), 1);
    assert!(scheduler.shutdown(Duration::from_secs(1)).await);
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn nonexistent_local_time_fires_with_standard_offset() {
    let store = Arc::new(EntryStore::new());
    let input = NewEntry {
        recipient: Some("ny@example.com".into()),
        fire_date: Some("2025-03-09".into()),
        fire_time: Some("02:30".into()),
        fire_timezone: Some("America/New_York".into()),
        latitude: Some(Coordinate::Text("40.7".into())),
        longitude: Some(Coordinate::Text("-74.0".into())),
    };
    let entry = store.create(validate(&input).unwrap());
    let p = poll_loop(
        store.clone(),
        Arc::new(FakeWeather::new(conditions())),
        Arc::new(Outbox::default()),
    );

    let before: DateTime<Utc> = "2025-03-09T07:29:59Z".parse().unwrap();
    assert_eq!(p.run_once(before).await.due, 0);

    let at: DateTime<Utc> = "2025-03-09T07:30:00Z".parse().unwrap();
    assert_eq!(p.run_once(at).await.dispatched, 1);
    assert!(store.get(&entry.id).is_err());
}

#[tokio::test]
async fn delivery_failure_leaves_entry_untouched() {
    let store = Arc::new(EntryStore::new());
    let entry = due_entry(&store, "a@example.com");
    let dispatcher = Dispatcher::new(
        Arc::new(FakeWeather::new(conditions())),
        Arc::new(BouncingSink),
        Duration::from_secs(5),
    );
    let p = PollLoop::new(store.clone(), dispatcher, &SchedulerConfig::default());

    let report = p.run_once(after_due()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(store.get(&entry.id).unwrap(), entry);
    assert_eq!(store.delivery_count(), 0);
    assert!(!store.is_claimed(&entry.id));
}

#[tokio::test]
async fn oversized_year_is_refused_and_driver_keeps_running() {
    let huge = NewEntry {
        recipient: Some("far@example.com".into()),
        fire_date: Some("+262142-12-31".into()),
        fire_time: Some("10:00".into()),
        fire_timezone: Some("America/New_York".into()),
        latitude: Some(Coordinate::Number(0.0)),
        longitude: Some(Coordinate::Number(0.0)),
    };
    assert_eq!(validate(&huge).unwrap_err().field, "fire_date");

    let store = Arc::new(EntryStore::new());
    let outbox = Arc::new(Outbox::default());
    due_entry(&store, "good@example.com");
    let scheduler = Scheduler::new(Arc::new(poll_loop(
        store.clone(),
        Arc::new(FakeWeather::new(conditions())),
        outbox.clone(),
    )));

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(scheduler.is_running());
    assert_eq!(outbox.count_to("good@example.com"), 1);
    assert!(store.is_empty());
    scheduler.shutdown(Duration::from_secs(1)).await;
}
