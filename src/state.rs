// src/state.rs
use crate::{
    clock::Clock,
    config::{AppConfig, ExportPaths},
    repository::AttendanceRepository,
};
use std::sync::Arc;

/// Tudo o que os serviços precisam, criado uma vez no arranque.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AttendanceRepository>,
    pub clock: Arc<dyn Clock>,
    pub paths: ExportPaths,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: Arc<dyn AttendanceRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            clock,
            paths: config.export_paths(),
            config,
        }
    }
}
