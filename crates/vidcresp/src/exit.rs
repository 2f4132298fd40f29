use std::fmt;
use std::io;

use vidcresp_packet::PacketError;
use vidcresp_session::ResponseError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
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

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

/// Exit code for a response the core refused.
pub fn response_code(err: &ResponseError) -> i32 {
    match err {
        ResponseError::Malformed(_) => DATA_INVALID,
        ResponseError::DuplicateSession(_) | ResponseError::ReservedSessionId => USAGE,
        _ => FAILURE,
    }
}

pub fn response_error(context: &str, err: ResponseError) -> CliError {
    CliError::new(response_code(&err), format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_responses_are_data_invalid() {
        let err = ResponseError::Malformed(PacketError::EmptyBuffer);
        assert_eq!(response_code(&err), DATA_INVALID);
        assert_eq!(response_code(&ResponseError::UnknownSession(3)), FAILURE);
        assert_eq!(response_code(&ResponseError::ReservedSessionId), USAGE);
    }

    #[test]
    fn missing_file_is_usage() {
        let err = io_error("read", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, USAGE);
        assert!(err.to_string().starts_with("read: "));
    }
}
