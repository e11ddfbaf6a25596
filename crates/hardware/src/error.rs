use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("no interface registered under '{0}'")]
    UnknownInterface(String),

    #[error("interface '{0}' is already registered")]
    DuplicateInterface(String),
}
