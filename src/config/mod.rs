pub mod settings;

pub use settings::{BehaviorConfig, Config, ConfigError, GitConfig};
