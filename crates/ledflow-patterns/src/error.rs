use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Unknown pattern: {0} (expected chase, strobe, rainbow, wave or solid)")]
    UnknownPattern(String),
}
