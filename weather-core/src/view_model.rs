//! Screen state for a single-city weather lookup.
//!
//! [`WeatherViewModel`] owns one [`ViewState`] cell, published through a
//! `tokio::sync::watch` channel so observers only ever see the latest value.
//! Searches run on the tokio runtime; each carries a generation number and a
//! result is applied only while its generation is still the newest issued.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{model::WeatherSnapshot, prefs::PreferenceStore, provider::WeatherProvider};

/// Failure surfaced to the presentation layer.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport error, non-success status or unusable body; the cause is kept as raised.
    #[error("{0:#}")]
    FetchFailed(Arc<anyhow::Error>),
}

impl FetchError {
    pub fn cause(&self) -> &anyhow::Error {
        match self {
            FetchError::FetchFailed(cause) => cause,
        }
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        FetchError::FetchFailed(Arc::new(err))
    }
}

#[derive(Debug, Clone, Default)]
pub enum ViewState {
    /// No search performed yet.
    #[default]
    Default,
    Loading,
    Success {
        snapshot: WeatherSnapshot,
        showing_details: bool,
    },
    Error(FetchError),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            ViewState::Success { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ViewState::Default => "default",
            ViewState::Loading => "loading",
            ViewState::Success { .. } => "success",
            ViewState::Error(_) => "error",
        }
    }
}

#[derive(Debug)]
pub struct WeatherViewModel {
    provider: Arc<dyn WeatherProvider>,
    prefs: Arc<dyn PreferenceStore>,
    state: Arc<watch::Sender<ViewState>>,
    generation: Arc<AtomicU64>,
}

impl WeatherViewModel {
    /// Create the view model and, if a city was saved earlier, start a search
    /// for it that lands on the detail view.
    ///
    /// Must be called inside a tokio runtime when a city may be saved.
    pub fn new(provider: Arc<dyn WeatherProvider>, prefs: Arc<dyn PreferenceStore>) -> Self {
        let vm = Self::without_restore(provider, prefs);

        let saved = vm.prefs.saved_city().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "could not read saved city");
            None
        });

        if let Some(city) = saved {
            info!(%city, "restoring saved city");
            vm.fetch_weather(city, true);
        }

        vm
    }

    /// Create the view model in `Default` without looking at the saved city,
    /// for callers that search right away.
    pub fn without_restore(
        provider: Arc<dyn WeatherProvider>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        let (state, _) = watch::channel(ViewState::Default);
        Self { provider, prefs, state: Arc::new(state), generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Latest state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Wait until no search is in flight and return the state at that point.
    pub async fn settled(&self) -> ViewState {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|state| !state.is_loading()).await.map(|state| state.clone());
        // The sender lives in `self`, so the channel cannot close while we wait.
        settled.unwrap_or_else(|_| self.state())
    }

    /// Start a search for `city` with the summary view.
    ///
    /// The state is `Loading` when this returns; the result is applied by the
    /// spawned task unless a newer search has been issued in the meantime.
    pub fn search(&self, city: impl Into<String>) -> JoinHandle<()> {
        self.fetch_weather(city.into(), false)
    }

    fn fetch_weather(&self, city: String, show_details: bool) -> JoinHandle<()> {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ViewState::Loading;
        });
        debug!(%city, generation, "search started");

        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.generation);

        tokio::spawn(async move {
            let next = match provider.fetch_current(&city).await {
                Ok(snapshot) => ViewState::Success { snapshot, showing_details: show_details },
                Err(err) => ViewState::Error(err.into()),
            };

            let applied = state.send_if_modified(|current| {
                if latest.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *current = next;
                true
            });

            if applied {
                let current = state.borrow();
                match &*current {
                    ViewState::Error(err) => warn!(%city, error = %err, "search failed"),
                    other => info!(%city, state = other.name(), "search finished"),
                }
            } else {
                debug!(%city, generation, "discarding stale search result");
            }
        })
    }

    /// Flip between summary and detail view. Returns `false` (and leaves the
    /// state alone) unless the current state is `Success`.
    pub fn toggle_details(&self) -> bool {
        self.state.send_if_modified(|state| match state {
            ViewState::Success { showing_details, .. } => {
                *showing_details = !*showing_details;
                true
            }
            _ => false,
        })
    }

    /// Remember `city` for the next start. Does not touch the view state;
    /// store failures are logged, not raised.
    pub fn persist_current_city(&self, city: &str) {
        match self.prefs.save_city(city) {
            Ok(()) => info!(%city, "saved city"),
            Err(err) => warn!(%city, error = %format!("{err:#}"), "could not save city"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferenceStore;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{Mutex, atomic::AtomicUsize},
    };
    use tokio::sync::oneshot;

    type Reply = anyhow::Result<WeatherSnapshot>;

    /// Provider whose answers are handed in by the test, one per city. Counts calls.
    #[derive(Debug, Default)]
    struct FakeProvider {
        pending: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn expect(&self, city: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(city.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_current(&self, city: &str) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.pending.lock().unwrap().remove(city);
            match rx {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(anyhow::anyhow!("reply dropped"))),
                None => Err(anyhow::anyhow!("unexpected city {city}")),
            }
        }
    }

    /// Store that refuses every operation.
    #[derive(Debug)]
    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("disk on fire"))
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        }
    }

    fn snapshot(name: &str, temp_c: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: name.into(),
            region: String::new(),
            country: "United Kingdom".into(),
            temperature_c: temp_c,
            condition_text: "Sunny".into(),
            condition_icon: "//cdn.weatherapi.com/weather/64x64/day/113.png".into(),
            humidity_pct: 40,
            uv_index: 5.0,
            feels_like_c: temp_c - 1.0,
            observed_at: None,
        }
    }

    fn setup(prefs: MemoryPreferenceStore) -> (Arc<FakeProvider>, Arc<MemoryPreferenceStore>) {
        (Arc::new(FakeProvider::default()), Arc::new(prefs))
    }

    #[tokio::test]
    async fn search_succeeds_from_empty_store() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);
        assert!(matches!(vm.state(), ViewState::Default));

        let reply = provider.expect("London");
        let handle = vm.search("London");
        assert!(vm.state().is_loading());

        reply.send(Ok(snapshot("London", 15.0))).unwrap();
        handle.await.unwrap();

        match vm.state() {
            ViewState::Success { snapshot: s, showing_details } => {
                assert_eq!(s, snapshot("London", 15.0));
                assert!(!showing_details);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_resets_details_flag_from_any_prior_state() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);

        provider.expect("Rome").send(Ok(snapshot("Rome", 25.0))).unwrap();
        vm.search("Rome").await.unwrap();
        assert!(vm.toggle_details());

        provider.expect("Milan").send(Ok(snapshot("Milan", 20.0))).unwrap();
        vm.search("Milan").await.unwrap();

        assert!(matches!(
            vm.state(),
            ViewState::Success { ref snapshot, showing_details: false } if snapshot.location_name == "Milan"
        ));
    }

    #[tokio::test]
    async fn failed_fetch_becomes_error_state_with_cause() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);

        let reply = provider.expect("Atlantis");
        let handle = vm.search("Atlantis");
        reply.send(Err(anyhow::anyhow!("Failed to fetch weather data"))).unwrap();
        handle.await.unwrap();

        match vm.state() {
            ViewState::Error(err) => {
                assert_eq!(err.to_string(), "Failed to fetch weather data");
                assert_eq!(err.cause().to_string(), "Failed to fetch weather data");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toggle_details_flips_only_the_flag() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);

        provider.expect("Oslo").send(Ok(snapshot("Oslo", -3.0))).unwrap();
        vm.search("Oslo").await.unwrap();

        assert!(vm.toggle_details());
        assert!(matches!(vm.state(), ViewState::Success { showing_details: true, .. }));
        assert_eq!(vm.state().snapshot(), Some(&snapshot("Oslo", -3.0)));

        assert!(vm.toggle_details());
        assert!(matches!(vm.state(), ViewState::Success { showing_details: false, .. }));
        assert_eq!(vm.state().snapshot(), Some(&snapshot("Oslo", -3.0)));
    }

    #[tokio::test]
    async fn toggle_details_is_noop_outside_success() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);
        let mut rx = vm.subscribe();

        assert!(!vm.toggle_details());
        assert!(matches!(vm.state(), ViewState::Default));

        let reply = provider.expect("Lima");
        let handle = vm.search("Lima");
        rx.borrow_and_update();
        assert!(!vm.toggle_details());
        assert!(vm.state().is_loading());
        assert!(!rx.has_changed().unwrap());

        reply.send(Err(anyhow::anyhow!("boom"))).unwrap();
        handle.await.unwrap();
        assert!(!vm.toggle_details());
        assert!(matches!(vm.state(), ViewState::Error(_)));
    }

    #[tokio::test]
    async fn persist_current_city_writes_store_and_keeps_state() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs.clone());

        provider.expect("Berlin").send(Ok(snapshot("Berlin", 12.0))).unwrap();
        vm.search("Berlin").await.unwrap();
        let mut rx = vm.subscribe();

        vm.persist_current_city("Berlin");

        assert_eq!(prefs.saved_city().unwrap().as_deref(), Some("Berlin"));
        assert!(!rx.has_changed().unwrap());
        assert!(matches!(vm.state(), ViewState::Success { showing_details: false, .. }));
    }

    #[tokio::test]
    async fn persist_failure_is_swallowed() {
        let provider = Arc::new(FakeProvider::default());
        let vm = WeatherViewModel::new(provider, Arc::new(BrokenStore));

        assert!(matches!(vm.state(), ViewState::Default));
        vm.persist_current_city("Paris");
        assert!(matches!(vm.state(), ViewState::Default));
    }

    #[tokio::test]
    async fn saved_city_is_searched_with_details_on_construction() {
        let (provider, prefs) = setup(MemoryPreferenceStore::with_saved_city("Paris"));
        let reply = provider.expect("Paris");

        let vm = WeatherViewModel::new(provider.clone(), prefs);
        assert!(vm.state().is_loading());

        reply.send(Ok(snapshot("Paris", 18.0))).unwrap();

        match vm.settled().await {
            ViewState::Success { snapshot: s, showing_details } => {
                assert_eq!(s.location_name, "Paris");
                assert!(showing_details);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn without_restore_makes_a_single_request() {
        let (provider, prefs) = setup(MemoryPreferenceStore::with_saved_city("Paris"));
        let vm = WeatherViewModel::without_restore(provider.clone(), prefs.clone());
        assert!(matches!(vm.state(), ViewState::Default));

        provider.expect("London").send(Ok(snapshot("London", 15.0))).unwrap();
        vm.search("London").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(vm.state().snapshot().map(|s| s.location_name.as_str()), Some("London"));

        vm.persist_current_city("London");
        assert_eq!(prefs.saved_city().unwrap().as_deref(), Some("London"));
    }

    #[tokio::test]
    async fn new_with_saved_city_requests_it_once() {
        let (provider, prefs) = setup(MemoryPreferenceStore::with_saved_city("Paris"));
        provider.expect("Paris").send(Ok(snapshot("Paris", 18.0))).unwrap();

        let vm = WeatherViewModel::new(provider.clone(), prefs);
        vm.settled().await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_result_does_not_overwrite_newer_search() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);

        let slow = provider.expect("Madrid");
        let fast = provider.expect("Lisbon");

        let first = vm.search("Madrid");
        let second = vm.search("Lisbon");

        fast.send(Ok(snapshot("Lisbon", 21.0))).unwrap();
        second.await.unwrap();
        assert_eq!(vm.state().snapshot().map(|s| s.location_name.as_str()), Some("Lisbon"));

        slow.send(Ok(snapshot("Madrid", 30.0))).unwrap();
        first.await.unwrap();
        assert_eq!(vm.state().snapshot().map(|s| s.location_name.as_str()), Some("Lisbon"));
    }

    #[tokio::test]
    async fn stale_result_while_newer_search_in_flight_keeps_loading() {
        let (provider, prefs) = setup(MemoryPreferenceStore::new());
        let vm = WeatherViewModel::new(provider.clone(), prefs);

        let old = provider.expect("Cairo");
        let new = provider.expect("Doha");

        let first = vm.search("Cairo");
        let second = vm.search("Doha");

        old.send(Err(anyhow::anyhow!("timeout"))).unwrap();
        first.await.unwrap();
        assert!(vm.state().is_loading());

        new.send(Ok(snapshot("Doha", 35.0))).unwrap();
        second.await.unwrap();
        assert!(matches!(vm.state(), ViewState::Success { .. }));
    }

    #[tokio::test]
    async fn unreadable_store_starts_in_default() {
        let provider = Arc::new(FakeProvider::default());
        let vm = WeatherViewModel::new(provider, Arc::new(BrokenStore));

        assert!(matches!(vm.state(), ViewState::Default));
        assert!(matches!(vm.settled().await, ViewState::Default));
    }
}
