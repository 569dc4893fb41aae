use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("sip stack error: {0}")]
    SipStack(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("serializer {0} already exists")]
    SerializerExists(String),

    #[error("serializer {0} is shut down")]
    SerializerClosed(String),

    #[error("module {0} is already registered")]
    ModuleExists(String),
}

impl Error {
    pub fn sip_stack<E: std::fmt::Display>(err: E) -> Self {
        Self::SipStack(err.to_string())
    }

    pub fn configuration<E: std::fmt::Display>(err: E) -> Self {
        Self::Configuration(err.to_string())
    }
}
