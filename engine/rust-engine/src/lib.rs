pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod services;
pub mod signals;
pub mod telemetry;
pub mod utils;

pub use config::EngineConfig;
pub use services::EngineState;
