use crate::session::Sessions;
use crate::storage::Store;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            sessions: Arc::new(Sessions::default()),
        }
    }
}
