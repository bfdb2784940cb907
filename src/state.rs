// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    repository::{AttemptStore, Directory, TopicCatalog},
    services::{attempts::AttemptService, performance::PerformanceService},
    storage::FileStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub attempts: AttemptService,
    pub reports: PerformanceService,
}

impl AppState {
    /// Wires both services to the same set of collaborators.
    pub fn new(
        config: Config,
        directory: Arc<dyn Directory>,
        store: Arc<dyn AttemptStore>,
        storage: Arc<dyn FileStorage>,
        topics: Arc<dyn TopicCatalog>,
    ) -> Self {
        let scoring = config.scoring;
        Self {
            attempts: AttemptService::new(directory.clone(), store.clone(), storage, scoring),
            reports: PerformanceService::new(directory, store, topics, scoring),
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for PerformanceService {
    fn from_ref(state: &AppState) -> Self {
        state.reports.clone()
    }
}
