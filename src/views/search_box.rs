//! Debounced search input
//!
//! Each keystroke bumps a generation counter and schedules a search after
//! the debounce delay. Only a search whose generation is still current when
//! the delay expires reaches the store, and only the latest result is shown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::SearchConfig;
use crate::models::Profile;
use crate::services::SearchService;
use crate::views::Notice;

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Profile>,
    pub searching: bool,
    pub error: Option<Notice>,
}

impl SearchState {
    /// True when a finished, non-blank search matched nobody.
    pub fn is_empty_result(&self) -> bool {
        !self.searching && self.error.is_none() && !self.query.trim().is_empty() && self.results.is_empty()
    }
}

pub struct SearchBox {
    service: Arc<SearchService>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    state: watch::Sender<SearchState>,
}

impl SearchBox {
    pub fn new(service: Arc<SearchService>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            service,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            state,
        }
    }

    /// Debounce taken from `search.debounce_ms`
    pub fn from_config(service: Arc<SearchService>, config: &SearchConfig) -> Self {
        Self::new(service, Duration::from_millis(config.debounce_ms))
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Record the new input and schedule its search.
    pub fn input(&self, query: impl Into<String>) {
        let query = query.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if query.trim().is_empty() {
            self.state.send_replace(SearchState {
                query,
                ..SearchState::default()
            });
            return;
        }

        self.state.send_modify(|s| {
            s.query = query.clone();
            s.searching = true;
        });

        let service = self.service.clone();
        let current = self.generation.clone();
        let state = self.state.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let outcome = service.search(&query).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let next = match outcome {
                Ok(results) => SearchState {
                    query,
                    results,
                    searching: false,
                    error: None,
                },
                Err(e) => SearchState {
                    query,
                    results: Vec::new(),
                    searching: false,
                    error: Some(Notice::from_error("Search failed", &e)),
                },
            };
            state.send_replace(next);
        });
    }
}
