pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{auth, orchestrator, plugins, schema, service};
pub use config::{AppConfig, ConfigError, ModelConfig};
pub use domain::types;
pub use infrastructure::{model, server};
