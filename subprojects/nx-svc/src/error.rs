//! Result-code modules and kernel error descriptions.
//!
//! Ref: <https://switchbrew.org/wiki/Error_codes>

pub use crate::result::ToRawResultCode;
use crate::result::{Error, ResultCode};

/// Result-code module numbers for the components this workspace talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Module {
    /// The kernel.
    Kernel = 1,
    /// The service framework (CMIF).
    Sf = 10,
    /// The HIPC message layer.
    Hipc = 11,
    /// The process manager.
    Pm = 15,
    /// The service manager.
    Sm = 21,
    /// The secure monitor interface.
    Spl = 26,
    /// Client-side failures detected before a request is sent.
    Libnx = 345,
}

/// Client-side result descriptions, under [`Module::Libnx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ClientError {
    /// The service session has not been opened.
    NotInitialized = 8,
    /// An argument failed validation.
    BadInput = 11,
}

impl ClientError {
    pub const fn to_rc(self) -> ResultCode {
        Error::from_parts(Module::Libnx, self as u32).to_raw()
    }
}

/// Kernel result descriptions.
///
/// Only the descriptions the IPC and handle calls can report are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KernelError {
    OutOfSessions = 7,
    TerminationRequested = 59,
    InvalidSize = 101,
    InvalidAddress = 102,
    OutOfResource = 103,
    OutOfHandles = 105,
    InvalidHandle = 114,
    Cancelled = 118,
    OutOfRange = 119,
    NotFound = 121,
    SessionClosed = 123,
    InvalidState = 125,
    LimitReached = 132,
    ReceiveListBroken = 258,
    MessageTooLarge = 260,
}

impl KernelError {
    /// Maps a kernel error code to its description.
    ///
    /// Returns `None` for codes from other modules or unlisted descriptions.
    pub fn from_error(err: &Error) -> Option<Self> {
        if err.module() != Module::Kernel as u32 {
            return None;
        }

        let desc = match err.description() {
            7 => Self::OutOfSessions,
            59 => Self::TerminationRequested,
            101 => Self::InvalidSize,
            102 => Self::InvalidAddress,
            103 => Self::OutOfResource,
            105 => Self::OutOfHandles,
            114 => Self::InvalidHandle,
            118 => Self::Cancelled,
            119 => Self::OutOfRange,
            121 => Self::NotFound,
            123 => Self::SessionClosed,
            125 => Self::InvalidState,
            132 => Self::LimitReached,
            258 => Self::ReceiveListBroken,
            260 => Self::MessageTooLarge,
            _ => return None,
        };
        Some(desc)
    }

    /// Returns the full kernel result code for this description.
    pub const fn to_rc(self) -> ResultCode {
        Error::from_parts(Module::Kernel, self as u32).to_raw()
    }
}

impl PartialEq<u32> for KernelError {
    fn eq(&self, other: &u32) -> bool {
        *self as u32 == *other
    }
}

impl PartialEq<KernelError> for u32 {
    fn eq(&self, other: &KernelError) -> bool {
        *self == *other as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_error_round_trips_through_result_code() {
        let rc = KernelError::SessionClosed.to_rc();
        let err = Error::from_raw(rc).expect("non-zero code");
        assert_eq!(KernelError::from_error(&err), Some(KernelError::SessionClosed));
        assert_eq!(err.description(), KernelError::SessionClosed);
    }

    #[test]
    fn test_client_error_codes() {
        let err = Error::from_raw(ClientError::NotInitialized.to_rc()).expect("non-zero code");
        assert_eq!(err.module(), Module::Libnx as u32);
        assert_eq!(err.description(), 8);
    }

    #[test]
    fn test_kernel_error_ignores_other_modules() {
        let err = Error::from_parts(Module::Spl, 123);
        assert_eq!(KernelError::from_error(&err), None);
    }
}
