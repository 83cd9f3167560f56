use std::fmt;

use hublink_conn::ErrorCode;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONNECT_FAILED: i32 = 3;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn protocol_error(context: &str, code: ErrorCode) -> CliError {
    let exit = match code {
        ErrorCode::Timeout => TIMEOUT,
        ErrorCode::ConnectFailed | ErrorCode::NotConnected => CONNECT_FAILED,
        ErrorCode::AlreadyConnected
        | ErrorCode::AlreadyDisconnected
        | ErrorCode::AutoReconnectInProgress
        | ErrorCode::InvalidFunctionId => USAGE,
        _ => FAILURE,
    };
    CliError::new(exit, format!("{context}: {code}"))
}
