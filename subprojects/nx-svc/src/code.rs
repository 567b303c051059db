//! SVC numbers used by the IPC path.
//!
//! Ref: <https://switchbrew.org/wiki/SVC>

/// Closes a handle, decrementing the reference count of the corresponding kernel object.
pub const CLOSE_HANDLE: u16 = 0x16;

/// Connects to a registered named port.
pub const CONNECT_TO_NAMED_PORT: u16 = 0x1F;

/// Sends an IPC synchronization request to a session.
pub const SEND_SYNC_REQUEST: u16 = 0x21;
