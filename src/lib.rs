pub mod app;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod password;
pub mod repository;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;

pub use app::router;
pub use state::AppState;
pub use storage::{resolve_data_path, Store};
