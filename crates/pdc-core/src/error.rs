use thiserror::Error;

pub type PdcResult<T> = Result<T, PdcError>;

#[derive(Debug, Error)]
pub enum PdcError {
    /// Bad key, IV, buffer length, or a capability that does not fit the construct.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An operation was called in a state that does not allow it.
    #[error("call sequence violation: {operation} is not allowed in state {state}")]
    CallSequence {
        operation: &'static str,
        state: &'static str,
    },

    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("corrupted padding")]
    InvalidPadding,

    #[error("overflow: {0}")]
    Overflow(String),

    /// The wrapped block cipher itself failed.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdcError {
    /// Shorthand for [`PdcError::InvalidParameter`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        PdcError::InvalidParameter(msg.into())
    }
}
