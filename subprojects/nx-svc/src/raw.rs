//! Raw _Supervisor Call (SVC)_ API.
//!
//! Only the calls needed to talk to system services are exposed. The stubs
//! are compiled for Horizon OS only; the handle constants are available
//! everywhere.

#[cfg(target_os = "horizon")]
use core::ffi::c_char;

#[cfg(target_os = "horizon")]
use crate::{code::*, result::ResultCode};

/// A raw handle type.
///
/// Alias for `u32`.
pub type Handle = u32;

/// Invalid handle
pub const INVALID_HANDLE: Handle = 0;

/// Closes a handle, decrementing the reference count of the corresponding kernel object.
///
/// `Result svcCloseHandle(Handle handle);`
///
/// Syscall code: [CLOSE_HANDLE](crate::code::CLOSE_HANDLE) (`0x16`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#CloseHandle>
///
/// # Safety
///
/// The caller must ensure that `handle` is a valid kernel handle owned by the current process.
#[cfg(target_os = "horizon")]
#[unsafe(naked)]
pub unsafe extern "C" fn close_handle(handle: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}", // Issue the SVC call with immediate value 0x16
        "ret",
        code = const CLOSE_HANDLE,
    );
}

/// Connects to a registered named port.
///
/// `Result svcConnectToNamedPort(Handle* session, const char* name);`
///
/// Syscall code: [CONNECT_TO_NAMED_PORT](crate::code::CONNECT_TO_NAMED_PORT) (`0x1F`).
///
/// | Arg | Name | Description |
/// | --- | --- | --- |
/// | OUT | _session_ | Pointer to store the session handle. |
/// | IN | _name_ | Pointer to the name of the port. |
///
/// Ref: <https://switchbrew.org/wiki/SVC#ConnectToNamedPort>
///
/// # Safety
///
/// The caller must ensure:
/// - `session` is a valid, aligned pointer to writable memory for the output handle
/// - `name` points to a null-terminated C string that is valid and readable
#[cfg(target_os = "horizon")]
#[unsafe(naked)]
pub unsafe extern "C" fn connect_to_named_port(
    session: *mut Handle,
    name: *const c_char,
) -> ResultCode {
    core::arch::naked_asm!(
        "str x0, [sp, #-16]!", // Store x0 (session pointer) on stack
        "svc {code}",          // Issue the SVC call with immediate value 0x1F
        "ldr x2, [sp], #16",   // Load x2 from stack
        "str w1, [x2]",        // Store w1 (session handle) to address in x2
        "ret",
        code = const CONNECT_TO_NAMED_PORT,
    );
}

/// Sends an IPC synchronization request to a session.
///
/// The request is read from, and the reply written to, the calling thread's
/// TLS IPC buffer.
///
/// `Result svcSendSyncRequest(Handle session);`
///
/// Syscall code: [SEND_SYNC_REQUEST](crate::code::SEND_SYNC_REQUEST) (`0x21`).
///
/// Ref: <https://switchbrew.org/wiki/SVC#SendSyncRequest>
///
/// # Safety
///
/// The caller must ensure that `session` is a valid kernel session handle owned by the current process.
#[cfg(target_os = "horizon")]
#[unsafe(naked)]
pub unsafe extern "C" fn send_sync_request(session: Handle) -> ResultCode {
    core::arch::naked_asm!(
        "svc {code}", // Issue the SVC call with immediate value 0x21
        "ret",
        code = const SEND_SYNC_REQUEST,
    );
}
