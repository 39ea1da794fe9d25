//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use studypulse_core::ports::{DatabaseService, SummaryGenerationService};

/// The shared application state, created once at startup and passed to all handlers.
///
/// Adapters are held behind their port traits so handlers never touch a
/// concrete database or LLM client. The summary adapter is optional: without
/// an API key the service runs with post-session summaries disabled.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub summary_adapter: Option<Arc<dyn SummaryGenerationService>>,
}
