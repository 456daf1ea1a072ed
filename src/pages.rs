//! Mounted page runtimes: fetch dispatch, the schedule ticker and unmount cleanup.
//!
//! Both pages must be mounted from inside a tokio runtime. Backend calls run on the
//! blocking pool; completions are applied through a weak handle, so anything that
//! finishes after the page is dropped is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::{Backend, FetchError, TODAYS_MINTS_PATH};
use crate::schedule::{ScheduleConfig, ScheduleController, ScheduleTableQuery, ScheduleView};
use crate::search::{run_search_fetch, PageDirection, SearchController, SearchFetch, SearchView};

pub struct SearchPage {
    state: Arc<Mutex<SearchController>>,
    backend: Arc<dyn Backend>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl SearchPage {
    pub fn mount(backend: Arc<dyn Backend>, search_text: impl Into<String>) -> Self {
        let page = Self {
            state: Arc::new(Mutex::new(SearchController::new())),
            backend,
            in_flight: Mutex::new(Vec::new()),
        };
        page.set_query(search_text, 0);
        page
    }

    pub fn set_query(&self, search_text: impl Into<String>, page_number: i64) {
        let fetches = self.controller().set_query(search_text, page_number);
        self.dispatch(fetches);
    }

    pub fn handle_page(&self, direction: PageDirection) {
        let fetch = self.controller().handle_page(direction);
        self.dispatch(fetch.into_iter().collect());
    }

    pub fn refetch(&self) {
        let fetches = self.controller().refetch();
        self.dispatch(fetches);
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.controller().set_viewport_width(width);
    }

    pub fn view(&self) -> SearchView {
        self.controller().view()
    }

    /// Waits for every fetch dispatched so far to be applied.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(
                    component = "search",
                    event = "search.fetch.join_error",
                    error = %err
                );
            }
        }
    }

    fn controller(&self) -> MutexGuard<'_, SearchController> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, fetches: Vec<SearchFetch>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|handle| !handle.is_finished());

        for fetch in fetches {
            info!(
                component = "search",
                event = "search.fetch.issued",
                endpoint = fetch.endpoint(),
                generation = fetch.generation()
            );

            let backend = Arc::clone(&self.backend);
            let state = Arc::downgrade(&self.state);
            in_flight.push(tokio::spawn(async move {
                let completion =
                    match tokio::task::spawn_blocking(move || run_search_fetch(backend.as_ref(), fetch))
                        .await
                    {
                        Ok(completion) => completion,
                        Err(err) => {
                            warn!(
                                component = "search",
                                event = "search.fetch.join_error",
                                error = %err
                            );
                            return;
                        }
                    };

                apply_if_mounted(&state, |controller| {
                    controller.apply(completion);
                });
            }));
        }
    }
}

fn apply_if_mounted<T>(state: &Weak<Mutex<T>>, f: impl FnOnce(&mut T)) {
    match state.upgrade() {
        Some(state) => {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard);
        }
        None => debug!(
            component = "pages",
            event = "page.unmounted.result_dropped"
        ),
    }
}

pub struct SchedulePage {
    state: Arc<RwLock<ScheduleController>>,
    backend: Arc<dyn Backend>,
    rearm: Arc<Notify>,
    ticker: JoinHandle<()>,
    fetch: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulePage {
    /// Starts the ticker and issues the one fetch made at mount.
    pub fn mount(backend: Arc<dyn Backend>, config: ScheduleConfig) -> Self {
        let state = Arc::new(RwLock::new(ScheduleController::new()));
        let rearm = Arc::new(Notify::new());
        let ticker = tokio::spawn(run_ticker(
            Arc::downgrade(&state),
            Arc::clone(&rearm),
            Duration::from_millis(config.tick_interval_ms.max(1)),
        ));

        let page = Self {
            state,
            backend,
            rearm,
            ticker,
            fetch: Mutex::new(None),
        };
        page.refetch();
        page
    }

    /// Fetches today's mints again, replacing the list wholesale on success.
    pub fn refetch(&self) {
        self.write_state().begin_fetch();

        let backend = Arc::clone(&self.backend);
        let state = Arc::downgrade(&self.state);
        let rearm = Arc::clone(&self.rearm);
        let handle = tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || backend.todays_mints())
                .await
                .unwrap_or_else(|err| {
                    Err(FetchError::Transport {
                        url: TODAYS_MINTS_PATH.to_string(),
                        message: err.to_string(),
                    })
                });

            let Some(state) = state.upgrade() else {
                debug!(
                    component = "pages",
                    event = "page.unmounted.result_dropped"
                );
                return;
            };
            let length_changed = state
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .apply_fetch(result, Utc::now());
            if length_changed {
                rearm.notify_one();
            }
        });

        if let Some(previous) = self
            .fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    pub fn select_project(&self, project: &str) -> bool {
        self.write_state().select_project(project)
    }

    pub fn dismiss_notification(&self) {
        self.write_state().dismiss_notification();
    }

    pub fn view(&self, table: &ScheduleTableQuery) -> ScheduleView {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .view(Utc::now(), table)
    }

    /// Waits for the outstanding fetch, if any, to be applied.
    pub async fn settle(&self) {
        let handle = self
            .fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(
                        component = "schedule",
                        event = "schedule.fetch.join_error",
                        error = %err
                    );
                }
            }
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ScheduleController> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SchedulePage {
    fn drop(&mut self) {
        self.ticker.abort();
        if let Some(fetch) = self
            .fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            fetch.abort();
        }
        debug!(component = "schedule", event = "schedule.unmount");
    }
}

async fn run_ticker(
    state: Weak<RwLock<ScheduleController>>,
    rearm: Arc<Notify>,
    period: Duration,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = rearm.notified() => {
                interval.reset();
            }
        }

        let Some(state) = state.upgrade() else {
            break;
        };
        state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(Utc::now());
    }
}
