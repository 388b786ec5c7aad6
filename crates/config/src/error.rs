use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read or written.
    Io { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    Parse(String),
    /// A required option is empty.
    Missing(&'static str),
    /// An option has a value outside its accepted range.
    Invalid { option: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Missing(option) => write!(f, "missing required option '{option}'"),
            Self::Invalid { option, message } => write!(f, "invalid '{option}': {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
