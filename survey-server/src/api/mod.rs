//! HTTP API handlers for survey-server

pub mod error;
pub mod health;
pub mod progress;
pub mod results;
pub mod sessions;

pub use error::ApiError;
pub use health::health_routes;
pub use progress::save_progress;
pub use results::{results_csv, results_json};
pub use sessions::{ensure_session, get_session};
