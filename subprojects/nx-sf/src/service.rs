//! Process-wide service sessions.
//!
//! A [`ServiceSlot`] holds the session for one named service together with
//! the number of clients currently using it. The first
//! [`acquire`](ServiceSlot::acquire) opens the session through a
//! [`ServiceConnector`] (normally the service manager), the last
//! [`release`](ServiceSlot::release) closes it. Slots are plain atomics and
//! can live in `static`s.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use nx_svc::{
    error::ToRawResultCode,
    ipc::SendSyncError,
    raw::INVALID_HANDLE,
    result::ResultCode,
};

use crate::{
    ServiceName,
    cmif::ParseResponseError,
    hipc::MessageTooLarge,
    wire::EncodeError,
    transport::{SessionHandle, Transport},
};

/// Opens sessions to named services.
pub trait ServiceConnector {
    /// Returns a new session to the service registered as `name`.
    fn get_service_handle(&self, name: ServiceName) -> Result<SessionHandle, GetServiceError>;
}

impl<C: ServiceConnector + ?Sized> ServiceConnector for &C {
    fn get_service_handle(&self, name: ServiceName) -> Result<SessionHandle, GetServiceError> {
        (**self).get_service_handle(name)
    }
}

/// Error returned by [`ServiceConnector::get_service_handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GetServiceError {
    /// The request did not fit in the message buffer.
    #[error("failed to build request")]
    BuildRequest(#[source] MessageTooLarge),
    /// The request payload did not match its record.
    #[error("failed to encode request")]
    Encode(#[source] EncodeError),
    /// The request to the service manager could not be delivered.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// The service manager rejected the request.
    #[error("service manager error: {0:#x}")]
    Service(ResultCode),
    /// The service manager's reply was malformed.
    #[error("invalid response")]
    ParseResponse(#[source] ParseResponseError),
    /// The reply did not carry a session handle.
    #[error("missing session handle in response")]
    MissingHandle,
}

impl From<ParseResponseError> for GetServiceError {
    fn from(err: ParseResponseError) -> Self {
        match err {
            ParseResponseError::ServiceError(code) => Self::Service(code),
            err => Self::ParseResponse(err),
        }
    }
}

impl ToRawResultCode for GetServiceError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::BuildRequest(err) => err.to_rc(),
            Self::Encode(err) => err.to_rc(),
            Self::SendRequest(err) => err.to_rc(),
            Self::Service(code) => code,
            Self::ParseResponse(err) => err.to_rc(),
            Self::MissingHandle => ParseResponseError::Truncated.to_rc(),
        }
    }
}

/// A reference-counted session to one named service.
#[derive(Debug)]
pub struct ServiceSlot {
    name: ServiceName,
    refcount: AtomicU64,
    session: AtomicU32,
}

impl ServiceSlot {
    /// Creates an inactive slot for the service registered as `name`.
    pub const fn new(name: ServiceName) -> Self {
        Self {
            name,
            refcount: AtomicU64::new(0),
            session: AtomicU32::new(INVALID_HANDLE),
        }
    }

    pub const fn name(&self) -> ServiceName {
        self.name
    }

    /// Registers one more user, opening the session if none is active.
    ///
    /// If two threads race to open the session, the one that loses closes
    /// its redundant handle. If opening fails the registration is undone and
    /// the error returned.
    pub fn acquire<C, T>(&self, connector: &C, transport: &T) -> Result<(), GetServiceError>
    where
        C: ServiceConnector + ?Sized,
        T: Transport + ?Sized,
    {
        self.refcount.fetch_add(1, Ordering::AcqRel);

        if self.is_active() {
            return Ok(());
        }

        let session = match connector.get_service_handle(self.name) {
            Ok(session) => session,
            Err(err) => {
                self.refcount.fetch_sub(1, Ordering::AcqRel);
                log::debug!("failed to open {}: {err}", self.name);
                return Err(err);
            }
        };

        match self.session.compare_exchange(
            INVALID_HANDLE,
            session.to_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => log::debug!("opened {} (session {:#x})", self.name, session.to_raw()),
            Err(_) => {
                log::warn!("{} was opened concurrently, closing duplicate", self.name);
                transport.close_session(session);
            }
        }

        Ok(())
    }

    /// Unregisters one user, closing the session when the last one leaves.
    ///
    /// Releasing a slot nobody holds does nothing.
    pub fn release<T: Transport + ?Sized>(&self, transport: &T) {
        let prev = self
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));

        match prev {
            Err(_) => log::warn!("release of {} without a matching acquire", self.name),
            Ok(1) => {
                let raw = self.session.swap(INVALID_HANDLE, Ordering::AcqRel);
                if raw != INVALID_HANDLE {
                    log::debug!("closing {} (session {raw:#x})", self.name);
                    // SAFETY: `raw` was published by `acquire` from a handle the
                    // connector returned, and the swap gave us sole ownership.
                    transport.close_session(unsafe { SessionHandle::from_raw(raw) });
                }
            }
            Ok(_) => {}
        }
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<SessionHandle> {
        match self.session.load(Ordering::Acquire) {
            INVALID_HANDLE => None,
            // SAFETY: Non-zero values are only ever stored by `acquire`,
            // from a handle the connector returned.
            raw => Some(unsafe { SessionHandle::from_raw(raw) }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.load(Ordering::Acquire) != INVALID_HANDLE
    }

    pub fn refcount(&self) -> u64 {
        self.refcount.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockTransport};

    const NAME: ServiceName = ServiceName::from_static("spl:mig");

    #[test]
    fn test_acquire_twice_opens_once() {
        let connector = MockConnector::new();
        let transport = MockTransport::new();
        let slot = ServiceSlot::new(NAME);

        slot.acquire(&connector, &transport).expect("opens");
        slot.acquire(&connector, &transport).expect("already open");
        assert_eq!(slot.refcount(), 2);
        assert_eq!(connector.opened(), std::vec![NAME]);

        slot.release(&transport);
        assert!(slot.is_active());
        assert!(transport.closed().is_empty());

        slot.release(&transport);
        assert!(!slot.is_active());
        assert_eq!(transport.closed().len(), 1);
    }

    #[test]
    fn test_failed_open_rolls_back_refcount() {
        let connector = MockConnector::new();
        connector.fail(NAME, 0x1015);
        let transport = MockTransport::new();
        let slot = ServiceSlot::new(NAME);

        let err = slot.acquire(&connector, &transport).expect_err("sm refuses");
        assert_eq!(err, GetServiceError::Service(0x1015));
        assert_eq!(slot.refcount(), 0);
        assert!(slot.session().is_none());
    }

    #[test]
    fn test_release_without_acquire_is_noop() {
        let transport = MockTransport::new();
        let slot = ServiceSlot::new(NAME);

        slot.release(&transport);
        assert_eq!(slot.refcount(), 0);
        assert!(transport.closed().is_empty());
    }

    #[test]
    fn test_reacquire_after_close_opens_new_session() {
        let connector = MockConnector::new();
        let transport = MockTransport::new();
        let slot = ServiceSlot::new(NAME);

        slot.acquire(&connector, &transport).expect("opens");
        let first = slot.session().expect("active");
        slot.release(&transport);
        slot.acquire(&connector, &transport).expect("reopens");
        let second = slot.session().expect("active");

        assert_ne!(first, second);
        assert_eq!(transport.closed(), std::vec![first]);
    }
}
