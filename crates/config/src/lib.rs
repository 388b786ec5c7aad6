// Configuration loading

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{config_path, ClientConfig, SignatureMethod, DEFAULT_VAT_RATE};
