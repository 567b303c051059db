//! Horizon OS result codes.
//!
//! Every kernel call and every service command reports its outcome as a
//! 32-bit result code, `0` meaning success. The code is structured as:
//!
//! - **Bits 0-8:** Module ID
//! - **Bits 9-21:** Description
//! - **Bits 22-31:** Reserved
//!
//! Service clients in this workspace never reinterpret a service's result
//! code; they carry it to the caller unchanged. [`Error`] exists so those
//! codes can take part in `core::error::Error` chains and print in the
//! familiar `2XXX-YYYY` form.
//!
//! # References
//! - [Switchbrew Wiki: Error Codes](https://switchbrew.org/wiki/Error_codes)

use crate::error::Module;

/// Type alias for Result with [`Error`] as the error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The raw representation of a result code, containing both success and error states.
pub type ResultCode = u32;

/// The error type for Horizon OS result codes.
///
/// The result code is stored as a raw `u32` value, and it is guaranteed to be non-zero.
///
/// # Formatting
///
/// The error code is formatted as `2XXX-YYYY` where:
///  - `XXX` is `2000` + module number
///  - `YYYY` is the `description`
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Error(raw::ResultCode);

impl Error {
    /// Wraps a raw result code, returning `None` for the success value `0`.
    #[inline]
    pub const fn from_raw(code: ResultCode) -> Option<Self> {
        if code == 0 {
            None
        } else {
            Some(Self(raw::ResultCode::from_raw(code)))
        }
    }

    /// Builds an error from its module and description.
    #[inline]
    pub const fn from_parts(module: Module, description: u32) -> Self {
        Self(raw::ResultCode::from_parts(module as u32, description))
    }

    /// Returns the raw module number of the error.
    #[inline]
    pub const fn module(&self) -> u32 {
        self.0.module()
    }

    /// Returns the description value
    #[inline]
    pub const fn description(&self) -> u32 {
        self.0.description()
    }

    /// Returns the raw value (`u32`) of this error code
    #[inline]
    pub const fn to_raw(self) -> ResultCode {
        self.0.to_raw()
    }
}

impl core::fmt::Display for Error {
    /// Formats the error code as a `2XXX-YYYY` string.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:04}",
            2000 + self.0.module(),
            self.0.description()
        )
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Error")
            .field("code", &format_args!("{}", self))
            .field("module", &self.0.module())
            .field("description", &self.0.description())
            .field("raw", &format_args!("{:#x}", self.0.to_raw()))
            .finish()
    }
}

impl core::error::Error for Error {}

/// Conversion from typed errors back to the raw code the kernel or service reported.
pub trait ToRawResultCode {
    /// Returns the raw result code.
    fn to_rc(self) -> ResultCode;
}

impl ToRawResultCode for Error {
    fn to_rc(self) -> ResultCode {
        self.to_raw()
    }
}

/// Raw representation of the result code
// NOTE: For internal use only
pub(crate) mod raw {
    /// Successful result code
    const SUCCESS: u32 = 0;

    /// Mask for the module field (9 bits)
    const MODULE_MASK: u32 = 0x1FF;
    /// Mask for the description field (13 bits)
    const DESCRIPTION_MASK: u32 = 0x1FFF;
    /// Shift amount for the description field
    const DESCRIPTION_SHIFT: u32 = 9;

    /// Encapsulates a Horizon OS result code, allowing it to be separated into its constituent fields.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    #[repr(transparent)]
    pub struct ResultCode(u32);

    impl ResultCode {
        /// Creates a new [`ResultCode`] from a raw value
        #[inline]
        pub const fn from_raw(value: u32) -> Self {
            Self(value)
        }

        /// Get the raw value of the [`ResultCode`]
        #[inline]
        pub const fn to_raw(self) -> u32 {
            self.0
        }

        /// Creates a new [`ResultCode`] from a module and description
        #[inline]
        pub const fn from_parts(module: u32, description: u32) -> Self {
            let module_val = module & MODULE_MASK;
            let desc_val = (description & DESCRIPTION_MASK) << DESCRIPTION_SHIFT;
            Self(module_val | desc_val)
        }

        /// Returns the module that caused the error
        #[inline]
        pub const fn module(&self) -> u32 {
            self.0 & MODULE_MASK
        }

        /// Returns the description value
        #[inline]
        pub const fn description(&self) -> u32 {
            (self.0 >> DESCRIPTION_SHIFT) & DESCRIPTION_MASK
        }
    }

    /// Result for Horizon OS kernel SVC functions.
    pub enum Result {
        /// The operation was successful
        Success,
        /// The operation failed with an error code
        Error(ResultCode),
    }

    impl Result {
        /// Creates a new [`Result`] from a raw result code `u32` value
        pub fn from_raw(raw: u32) -> Self {
            if raw == SUCCESS {
                Result::Success
            } else {
                Result::Error(ResultCode(raw))
            }
        }

        /// Converts this [`Result`] into a [`core::result::Result`] with custom success and error values
        #[inline]
        pub fn map<T, E>(
            self,
            ok: T,
            err: impl FnOnce(ResultCode) -> E,
        ) -> core::result::Result<T, E> {
            match self {
                Result::Success => Ok(ok),
                Result::Error(rc) => Err(err(rc)),
            }
        }
    }

    impl From<ResultCode> for super::Error {
        fn from(value: ResultCode) -> Self {
            super::Error(value)
        }
    }
}
