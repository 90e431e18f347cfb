use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    HostsEmpty,
    BadHost(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::HostsEmpty => write!(f, "No monitored hosts configured"),
            ConfigError::BadHost(e) => write!(f, "Host configuration error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures talking to a management interface. Always recovered by the
/// status client, which degrades them to an empty line set.
#[derive(Debug)]
pub enum StatusError {
    ConnectFailed(std::io::Error),
    ConnectTimeout,
    EndOfStream,
    Io(std::io::Error),
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusError::ConnectFailed(e) => write!(f, "Connection failed: {}", e),
            StatusError::ConnectTimeout => write!(f, "Connection timed out"),
            StatusError::EndOfStream => write!(f, "Connection closed before any data was read"),
            StatusError::Io(e) => write!(f, "Management interface IO error: {}", e),
        }
    }
}

impl std::error::Error for StatusError {}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    TooFewFields(usize),
    BadNumber { field: &'static str, value: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooFewFields(n) => write!(f, "Expected at least 9 fields, got {}", n),
            ParseError::BadNumber { field, value } => {
                write!(f, "Field `{}` is not an integer: {:?}", field, value)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    SchemaFailed(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::SchemaFailed(e) => write!(f, "Storage schema preparation failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// Reasons a pipeline unit stops. Every variant is fatal to the process.
#[derive(Debug)]
pub enum PipelineError {
    ChannelClosed(&'static str),
    StorageError(StorageError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ChannelClosed(name) => write!(f, "Channel `{}` closed", name),
            PipelineError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    UnitFailed { unit: String, error: PipelineError },
    UnitStopped(String),
    UnitPanicked(String),
    NoUnits,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::UnitFailed { unit, error } => {
                write!(f, "Unit `{}` failed: {}", unit, error)
            }
            ControllerError::UnitStopped(unit) => write!(f, "Unit `{}` stopped unexpectedly", unit),
            ControllerError::UnitPanicked(e) => write!(f, "A unit panicked: {}", e),
            ControllerError::NoUnits => write!(f, "No units to supervise"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}
