use hublink_codec::CodecError;
use hublink_frame::FrameError;

/// Protocol-level error codes surfaced to caller-supplied callbacks.
///
/// Numeric codes match the gateway's published table. `AutoReconnectInProgress`
/// and `ConnectFailed` share code 13 on the wire; they stay distinct variants
/// here so callers can match without comparing numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    /// `connect` called while already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// A request was attempted while not connected.
    #[error("not connected")]
    NotConnected,

    /// `connect` called while an auto-reconnect is in progress.
    #[error("auto-reconnect in progress")]
    AutoReconnectInProgress,

    /// A connect attempt failed before reaching the connected state.
    #[error("connect failed")]
    ConnectFailed,

    /// `disconnect` called while not connected.
    #[error("already disconnected")]
    AlreadyDisconnected,

    /// The device has no response policy for the requested function id.
    #[error("invalid function id")]
    InvalidFunctionId,

    /// No matching response arrived within the request deadline.
    #[error("request timed out")]
    Timeout,

    /// The peer rejected a request parameter.
    #[error("invalid parameter")]
    InvalidParameter,

    /// The peer does not support the requested function.
    #[error("function not supported")]
    FunctionNotSupported,
}

impl ErrorCode {
    /// The numeric code as published by the gateway protocol.
    pub fn code(self) -> u8 {
        match self {
            ErrorCode::AlreadyConnected => 11,
            ErrorCode::NotConnected => 12,
            // Historic collision in the protocol's error table, kept for
            // compatibility with existing peers.
            ErrorCode::AutoReconnectInProgress | ErrorCode::ConnectFailed => 13,
            ErrorCode::AlreadyDisconnected => 14,
            ErrorCode::InvalidFunctionId => 21,
            ErrorCode::Timeout => 31,
            ErrorCode::InvalidParameter => 41,
            ErrorCode::FunctionNotSupported => 42,
        }
    }
}

/// Errors a request can fail with before anything is handed to the worker.
///
/// Connection-state, protocol, and timeout failures are reported through the
/// request's error callback instead; these cover malformed local input only.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The argument list does not match the pack format.
    #[error("argument packing failed: {0}")]
    Codec(#[from] CodecError),

    /// The packed payload exceeds the wire packet budget.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_match_protocol_table() {
        assert_eq!(ErrorCode::AlreadyConnected.code(), 11);
        assert_eq!(ErrorCode::NotConnected.code(), 12);
        assert_eq!(ErrorCode::AlreadyDisconnected.code(), 14);
        assert_eq!(ErrorCode::InvalidFunctionId.code(), 21);
        assert_eq!(ErrorCode::Timeout.code(), 31);
        assert_eq!(ErrorCode::InvalidParameter.code(), 41);
        assert_eq!(ErrorCode::FunctionNotSupported.code(), 42);
    }

    #[test]
    fn reconnect_and_connect_failed_share_code() {
        assert_eq!(ErrorCode::AutoReconnectInProgress.code(), 13);
        assert_eq!(ErrorCode::ConnectFailed.code(), 13);
        assert_ne!(ErrorCode::AutoReconnectInProgress, ErrorCode::ConnectFailed);
    }
}
