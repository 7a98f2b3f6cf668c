pub mod backends;
pub mod chat;
pub mod config;
pub mod detection;
pub mod dispatch;
pub mod error;
pub mod logger;
#[cfg(feature = "tensorflow")]
pub mod model_files;
pub mod routes;
pub mod uploads;

pub use config::Config;
pub use detection::DetectionResult;
pub use dispatch::{Backend, BackendOutcome, FallbackChain};
pub use error::{AppError, BackendError, Result};
pub use routes::{router, AppState};
