use crate::config::Config;
use crate::session::CallHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active call sessions (session_id → handle)
    pub calls: Arc<RwLock<HashMap<String, CallHandle>>>,

    /// Service configuration (backend endpoints, call timings)
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            calls: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }
}
