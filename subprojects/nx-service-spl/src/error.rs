//! Errors returned by spl and csrng commands.

use nx_sf::{
    ServiceName,
    cmif::{ParseResponseError, RESULT_INVALID_OUT_RAW_SIZE},
    hipc::MessageTooLarge,
    wire::{DecodeError, EncodeError},
};
use nx_svc::{
    error::{ClientError, ToRawResultCode},
    ipc::SendSyncError,
    result::ResultCode,
};

/// Error returned by spl and csrng commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The session the command routes to has not been opened.
    #[error("{0} is not initialized")]
    NotInitialized(ServiceName),
    /// A buffer argument has the wrong length.
    #[error("buffer of {got} bytes, expected {expected}")]
    InvalidSize { expected: usize, got: usize },
    /// An output is larger than the client can receive.
    #[error("output of {size} bytes exceeds the {max} byte limit")]
    BufferTooLarge { size: usize, max: usize },
    /// The request did not fit in the message buffer.
    #[error("failed to build request")]
    BuildRequest(#[source] MessageTooLarge),
    /// The request payload did not match its record.
    #[error("failed to encode request")]
    Encode(#[source] EncodeError),
    /// Failed to send the IPC request.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// The service returned a non-zero result.
    #[error("service error: {0:#x}")]
    Service(ResultCode),
    /// The reply was malformed.
    #[error("failed to parse response")]
    ParseResponse(#[source] ParseResponseError),
    /// The reply payload did not match its record.
    #[error("invalid response")]
    InvalidResponse(#[source] DecodeError),
    /// A field the reply record should define was absent.
    #[error("missing field {0} in response")]
    MissingField(&'static str),
    /// The reply did not carry the expected handle.
    #[error("missing handle in response")]
    MissingHandle,
}

impl From<ParseResponseError> for CommandError {
    fn from(err: ParseResponseError) -> Self {
        match err {
            ParseResponseError::ServiceError(code) => Self::Service(code),
            err => Self::ParseResponse(err),
        }
    }
}

impl ToRawResultCode for CommandError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::NotInitialized(_) => ClientError::NotInitialized.to_rc(),
            Self::InvalidSize { .. } | Self::BufferTooLarge { .. } => ClientError::BadInput.to_rc(),
            Self::BuildRequest(err) => err.to_rc(),
            Self::Encode(err) => err.to_rc(),
            Self::SendRequest(err) => err.to_rc(),
            Self::Service(code) => code,
            Self::ParseResponse(err) => err.to_rc(),
            Self::InvalidResponse(_) | Self::MissingField(_) | Self::MissingHandle => {
                RESULT_INVALID_OUT_RAW_SIZE
            }
        }
    }
}

/// Fails with [`CommandError::InvalidSize`] unless `got == expected`.
pub(crate) fn check_size(got: usize, expected: usize) -> Result<(), CommandError> {
    if got == expected {
        Ok(())
    } else {
        Err(CommandError::InvalidSize { expected, got })
    }
}
