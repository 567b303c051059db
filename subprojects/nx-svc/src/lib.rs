//! # nx-svc
//!
//! The kernel boundary used by the service clients in this workspace: handle
//! types, result codes, and the handful of _Supervisor Calls_ (SVCs) that the
//! IPC path needs (`svcConnectToNamedPort`, `svcSendSyncRequest`,
//! `svcCloseHandle`).
//!
//! The SVC stubs themselves only exist when building for Horizon OS
//! (`target_os = "horizon"`). Everything else (handle newtypes, result codes,
//! typed kernel errors) is plain data and builds on any target, which is what
//! lets the service crates run their marshalling tests on the host.
//!
//! ## References:
//! - [Switchbrew Wiki: SVC](https://switchbrew.org/wiki/SVC)
//! - [Switchbrew Wiki: Error Codes](https://switchbrew.org/wiki/Error_codes)

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod handle;

pub mod code;
pub mod error;
pub mod ipc;
pub mod raw;
pub mod result;
#[cfg(target_os = "horizon")]
pub mod tls;

pub use handle::Waitable;
