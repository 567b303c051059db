//! The request/reply seam between service clients and the kernel.
//!
//! Service clients build a request in a [`MessageBuffer`] and hand it to a
//! [`Transport`], which performs the blocking round trip and leaves the
//! reply in the same buffer. On Horizon OS this is [`KernelTransport`]; host
//! tests use the scripted transport from the `mock` module.

use nx_svc::ipc::{Handle, SendSyncError};

use crate::MessageBuffer;

/// A client session handle.
pub type SessionHandle = Handle;

/// Performs synchronous IPC round trips.
pub trait Transport {
    /// Sends the request in `msg` on `session` and waits for the reply.
    ///
    /// On success the reply has overwritten `msg`.
    fn send_sync_request(
        &self,
        session: SessionHandle,
        msg: &mut MessageBuffer,
    ) -> Result<(), SendSyncError>;

    /// Tells the server to drop `session` and closes the handle.
    fn close_session(&self, session: SessionHandle);
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send_sync_request(
        &self,
        session: SessionHandle,
        msg: &mut MessageBuffer,
    ) -> Result<(), SendSyncError> {
        (**self).send_sync_request(session, msg)
    }

    fn close_session(&self, session: SessionHandle) {
        (**self).close_session(session)
    }
}

/// The real kernel transport, going through the thread's TLS IPC buffer.
#[cfg(target_os = "horizon")]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelTransport;

#[cfg(target_os = "horizon")]
impl Transport for KernelTransport {
    fn send_sync_request(
        &self,
        session: SessionHandle,
        msg: &mut MessageBuffer,
    ) -> Result<(), SendSyncError> {
        use nx_svc::tls::{IPC_BUFFER_SIZE, ipc_buffer_ptr};
        use static_assertions::const_assert_eq;

        const_assert_eq!(IPC_BUFFER_SIZE, MessageBuffer::SIZE);

        let ipc_buf = ipc_buffer_ptr();

        // SAFETY: The TLS IPC region is IPC_BUFFER_SIZE bytes, belongs to the
        // calling thread, and never overlaps `msg`.
        unsafe {
            core::ptr::copy_nonoverlapping(msg.as_bytes().as_ptr(), ipc_buf, MessageBuffer::SIZE)
        };

        let result = nx_svc::ipc::send_sync_request(session);

        // SAFETY: Same region as above, now holding the reply (or the
        // untouched request if the call failed).
        unsafe {
            core::ptr::copy_nonoverlapping(
                ipc_buf,
                msg.as_bytes_mut().as_mut_ptr(),
                MessageBuffer::SIZE,
            )
        };

        result
    }

    fn close_session(&self, session: SessionHandle) {
        let mut msg = MessageBuffer::new();
        crate::cmif::make_close_request(&mut msg);
        if let Err(err) = self.send_sync_request(session, &mut msg) {
            log::debug!("close request on session {:#x} failed: {err}", session.to_raw());
        }
        if let Err(err) = nx_svc::ipc::close_handle(session) {
            log::warn!("failed to close session {:#x}: {err}", session.to_raw());
        }
    }
}
