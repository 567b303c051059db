//! Service Manager Protocol Implementation.
//!
//! This crate provides the client side of the `sm:` service. All operations
//! are methods on [`SmService`], which pairs an SM session handle with the
//! [`Transport`] used to reach it.
//!
//! [`SmService`] implements [`ServiceConnector`], so it can be handed to any
//! service slot that needs to open sessions by name.

#![cfg_attr(not(test), no_std)]

pub use nx_sf::ServiceName;
use nx_sf::{GetServiceError, ServiceConnector, SessionHandle, Transport};

mod cmif;
mod proto;

pub use self::{
    cmif::RegisterClientError,
    proto::{ALL_RECORDS, SM_PORT_NAME},
};

/// Service Manager session wrapper.
#[derive(Debug)]
pub struct SmService<T> {
    session: SessionHandle,
    transport: T,
}

impl<T: Transport> SmService<T> {
    /// Wraps an already connected `sm:` session.
    pub fn new(session: SessionHandle, transport: T) -> Self {
        Self { session, transport }
    }

    /// Returns the underlying session handle.
    #[inline]
    pub fn session(&self) -> SessionHandle {
        self.session
    }

    /// Registers this process as an SM client.
    #[inline]
    pub fn register_client(&self) -> Result<(), RegisterClientError> {
        cmif::register_client(&self.transport, self.session)
    }

    /// Gets a service handle by name.
    #[inline]
    pub fn get_service_handle(&self, name: ServiceName) -> Result<SessionHandle, GetServiceError> {
        cmif::get_service_handle(&self.transport, self.session, name)
    }

    /// Consumes and closes the SM session.
    pub fn close(self) {
        self.transport.close_session(self.session);
    }
}

impl<T: Transport> ServiceConnector for SmService<T> {
    fn get_service_handle(&self, name: ServiceName) -> Result<SessionHandle, GetServiceError> {
        SmService::get_service_handle(self, name)
    }
}

/// Connects to the _Service Manager_.
///
/// Connects to the "sm:" named port and registers as a client. A port that
/// is not registered yet is reported as an error, not retried.
#[cfg(target_os = "horizon")]
pub fn connect() -> Result<SmService<nx_sf::KernelTransport>, ConnectError> {
    let handle =
        nx_svc::ipc::connect_to_named_port(SM_PORT_NAME).map_err(ConnectError::Connect)?;

    let sm = SmService::new(handle, nx_sf::KernelTransport);
    if let Err(err) = sm.register_client() {
        sm.close();
        return Err(ConnectError::RegisterClient(err));
    }

    log::debug!("connected to sm: (session {:#x})", handle.to_raw());
    Ok(sm)
}

/// Error returned by [`connect`].
#[cfg(target_os = "horizon")]
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Failed to connect to the "sm:" named port.
    #[error("failed to connect to sm:")]
    Connect(#[source] nx_svc::ipc::ConnectError),
    /// Failed to register client with SM.
    #[error("failed to register client")]
    RegisterClient(#[source] RegisterClientError),
}

#[cfg(test)]
mod tests {
    use nx_sf::{
        cmif::ParseResponseError,
        mock::{MockTransport, Reply},
    };
    use nx_svc::error::ToRawResultCode;

    use super::*;

    fn sm(transport: &MockTransport) -> SmService<&MockTransport> {
        // SAFETY: test-only handle value.
        SmService::new(unsafe { SessionHandle::from_raw(0x10) }, transport)
    }

    #[test]
    fn test_records_are_well_formed() {
        for record in ALL_RECORDS {
            assert_eq!(record.validate(), Ok(()), "{}", record.name);
        }
    }

    #[test]
    fn test_get_service_handle_sends_packed_name() {
        let transport = MockTransport::new();
        transport.push_reply(Reply::ok().with_move_handle(0x1234));

        let name = ServiceName::from_static("pm:shell");
        let handle = sm(&transport).get_service_handle(name).expect("sm answers");
        assert_eq!(handle, 0x1234);

        let req = transport.last_request().expect("sent");
        assert_eq!(req.session, 0x10);
        assert_eq!(req.command_id, 1);
        assert_eq!(req.u64_at(0), name.to_u64());
        assert!(!req.send_pid);
    }

    #[test]
    fn test_get_service_handle_returns_sm_status_verbatim() {
        let transport = MockTransport::new();
        transport.push_reply(Reply::error(0xE15));

        let err = sm(&transport)
            .get_service_handle(ServiceName::from_static("spl:"))
            .expect_err("not registered");
        assert_eq!(err, GetServiceError::Service(0xE15));
        assert_eq!(err.to_rc(), 0xE15);
    }

    #[test]
    fn test_get_service_handle_without_handle_fails() {
        let transport = MockTransport::new();
        transport.push_reply(Reply::ok());

        let err = sm(&transport)
            .get_service_handle(ServiceName::from_static("csrng"))
            .expect_err("no handle");
        assert_eq!(err, GetServiceError::MissingHandle);
    }

    #[test]
    fn test_register_client_sends_pid() {
        let transport = MockTransport::new();
        transport.push_reply(Reply::ok());

        sm(&transport).register_client().expect("registered");

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 0);
        assert!(req.send_pid);
        assert_eq!(req.u64_at(0), 0);
    }

    #[test]
    fn test_register_client_propagates_failure() {
        let transport = MockTransport::new();
        transport.push_reply(Reply::error(0x415));

        let err = sm(&transport).register_client().expect_err("rejected");
        assert_eq!(
            err,
            RegisterClientError::ParseResponse(ParseResponseError::ServiceError(0x415))
        );
        assert_eq!(err.to_rc(), 0x415);
    }

    #[test]
    fn test_close_closes_sm_session() {
        let transport = MockTransport::new();
        sm(&transport).close();
        assert_eq!(transport.closed().len(), 1);
        assert_eq!(transport.closed()[0], 0x10);
    }
}
