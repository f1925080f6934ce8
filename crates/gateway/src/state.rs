use std::sync::Arc;
use std::time::{Duration, Instant};

use es_domain::config::Config;

use crate::runtime::dispatch::Dispatcher;
use crate::runtime::entries::EntryStore;
use crate::runtime::lifecycle::Scheduler;
use crate::runtime::mailer::DeliverySink;
use crate::runtime::poll::PollLoop;
use crate::runtime::weather::WeatherClient;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<EntryStore>,
    pub scheduler: Arc<Scheduler>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the store, dispatcher and scheduler around the given clients.
    /// The scheduler is created stopped.
    pub fn new(
        config: Arc<Config>,
        weather: Arc<dyn WeatherClient>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        let store = Arc::new(EntryStore::new());
        let dispatcher = Dispatcher::new(
            weather,
            sink,
            Duration::from_millis(config.scheduler.call_timeout_ms),
        );
        let poll = Arc::new(PollLoop::new(store.clone(), dispatcher, &config.scheduler));
        Self {
            config,
            store,
            scheduler: Arc::new(Scheduler::new(poll)),
            started_at: Instant::now(),
        }
    }
}
