//! IPC session management for Horizon OS.
//!
//! Safe wrappers around the kernel's IPC session SVCs. A session handle
//! represents the client side of an IPC connection to a service port.
//!
//! ## Horizon OS Terminology
//!
//! - **Session**: A bidirectional IPC channel between a client and server.
//! - **Named Port**: A kernel object registered with a string name (e.g., `"sm:"`)
//!   that clients can connect to by name.
//! - **Copy Handle**: A handle duplicated into the client's handle table by a
//!   service reply (events, debug objects).
//!
//! The error types and their result-code classification are available on
//! every target; the SVC wrappers only on Horizon OS.

#[cfg(target_os = "horizon")]
use core::ffi::CStr;

#[cfg(target_os = "horizon")]
use crate::raw;
use crate::{
    error::{KernelError as KError, ToRawResultCode},
    result::{Error, ResultCode, raw::Result as RawResult},
};

define_waitable_handle_type! {
    /// A handle to a client session kernel object.
    ///
    /// Obtained by connecting to a named port via [`connect_to_named_port`] or
    /// returned by a service manager lookup. Requests are sent over it with
    /// [`send_sync_request`].
    pub struct Handle
}

define_waitable_handle_type! {
    /// A handle to a readable event, as handed out by a service reply.
    pub struct EventHandle
}

/// Connects to a registered named port and returns a session handle.
#[cfg(target_os = "horizon")]
pub fn connect_to_named_port(name: &CStr) -> Result<Handle, ConnectError> {
    let mut handle = raw::INVALID_HANDLE;
    // SAFETY: `name` is a valid null-terminated C string (guaranteed by CStr),
    // and `handle` is a valid mutable pointer to receive the output handle.
    let rc = unsafe { raw::connect_to_named_port(&mut handle, name.as_ptr()) };
    ConnectError::from_rc(rc).map(|()| Handle(handle))
}

/// Error returned by [`connect_to_named_port`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Port name exceeds 11 characters or is not null-terminated.
    #[error("Port name out of range")]
    OutOfRange,
    /// No port registered with the given name.
    #[error("Port not found")]
    NotFound,
    /// Process handle table is full.
    #[error("Out of handles")]
    OutOfHandles,
    /// Port's maximum session limit reached.
    #[error("Out of sessions")]
    OutOfSessions,
    /// Process session resource limit exceeded.
    #[error("Limit reached")]
    LimitReached,
    /// Unexpected kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl ConnectError {
    /// Classifies the result code of `svcConnectToNamedPort`.
    pub fn from_rc(rc: ResultCode) -> Result<(), Self> {
        RawResult::from_raw(rc).map((), |rc| match rc.description() {
            desc if KError::OutOfRange == desc => Self::OutOfRange,
            desc if KError::NotFound == desc => Self::NotFound,
            desc if KError::OutOfHandles == desc => Self::OutOfHandles,
            desc if KError::OutOfSessions == desc => Self::OutOfSessions,
            desc if KError::LimitReached == desc => Self::LimitReached,
            _ => Self::Unknown(rc.into()),
        })
    }
}

impl ToRawResultCode for ConnectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::OutOfRange => KError::OutOfRange.to_rc(),
            Self::NotFound => KError::NotFound.to_rc(),
            Self::OutOfHandles => KError::OutOfHandles.to_rc(),
            Self::OutOfSessions => KError::OutOfSessions.to_rc(),
            Self::LimitReached => KError::LimitReached.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Sends a synchronous IPC request on a session.
///
/// The request must already be in the calling thread's TLS IPC buffer; the
/// reply overwrites it.
#[cfg(target_os = "horizon")]
pub fn send_sync_request(handle: Handle) -> Result<(), SendSyncError> {
    // SAFETY: The kernel validates the session handle and returns an error if invalid.
    // The IPC message is read from the thread-local storage buffer.
    let rc = unsafe { raw::send_sync_request(handle.to_raw()) };
    SendSyncError::from_rc(rc)
}

/// Error returned by [`send_sync_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendSyncError {
    /// Thread is terminating.
    #[error("Termination requested")]
    TerminationRequested,
    /// Failed to allocate session request.
    #[error("Out of resource")]
    OutOfResource,
    /// Invalid session handle.
    #[error("Invalid handle")]
    InvalidHandle,
    /// Session closed by server.
    #[error("Session closed")]
    SessionClosed,
    /// Unexpected kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl SendSyncError {
    /// Classifies the result code of `svcSendSyncRequest`.
    pub fn from_rc(rc: ResultCode) -> Result<(), Self> {
        RawResult::from_raw(rc).map((), |rc| match rc.description() {
            desc if KError::TerminationRequested == desc => Self::TerminationRequested,
            desc if KError::OutOfResource == desc => Self::OutOfResource,
            desc if KError::InvalidHandle == desc => Self::InvalidHandle,
            desc if KError::SessionClosed == desc => Self::SessionClosed,
            _ => Self::Unknown(rc.into()),
        })
    }
}

impl ToRawResultCode for SendSyncError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::TerminationRequested => KError::TerminationRequested.to_rc(),
            Self::OutOfResource => KError::OutOfResource.to_rc(),
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::SessionClosed => KError::SessionClosed.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

/// Closes a session handle, decrementing the kernel reference count.
#[cfg(target_os = "horizon")]
pub fn close_handle(handle: Handle) -> Result<(), CloseHandleError> {
    // SAFETY: The kernel validates the handle and returns an error if invalid.
    // Closing an already-closed handle is safe (returns InvalidHandle error).
    let rc = unsafe { raw::close_handle(handle.to_raw()) };
    CloseHandleError::from_rc(rc)
}

/// Error returned by [`close_handle`].
#[derive(Debug, thiserror::Error)]
pub enum CloseHandleError {
    /// The supplied handle is not a valid handle (raw code `0xE401`).
    #[error("Invalid handle")]
    InvalidHandle,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl CloseHandleError {
    /// Classifies the result code of `svcCloseHandle`.
    pub fn from_rc(rc: ResultCode) -> Result<(), Self> {
        RawResult::from_raw(rc).map((), |rc| match rc.description() {
            desc if KError::InvalidHandle == desc => Self::InvalidHandle,
            _ => Self::Unknown(rc.into()),
        })
    }
}

impl ToRawResultCode for CloseHandleError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidHandle => KError::InvalidHandle.to_rc(),
            Self::Unknown(err) => err.to_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_sync_error_classification() {
        assert_eq!(SendSyncError::from_rc(0), Ok(()));
        assert_eq!(
            SendSyncError::from_rc(KError::SessionClosed.to_rc()),
            Err(SendSyncError::SessionClosed)
        );

        let other = Error::from_parts(crate::error::Module::Sm, 2).to_raw();
        let err = SendSyncError::from_rc(other).expect_err("non-zero code");
        assert_eq!(err.to_rc(), other);
    }

    #[test]
    fn test_connect_error_round_trips_raw_code() {
        let err = ConnectError::from_rc(KError::NotFound.to_rc()).expect_err("non-zero code");
        assert!(matches!(err, ConnectError::NotFound));
        assert_eq!(err.to_rc(), 0xF201);
    }

    #[test]
    fn test_handle_validity() {
        // SAFETY: test-only construction of handle values.
        let (valid, invalid) = unsafe { (Handle::from_raw(0x1234), Handle::from_raw(0)) };
        assert!(valid.is_valid());
        assert!(!invalid.is_valid());
        assert_eq!(valid, 0x1234u32);
    }
}
