//! The `csrng` random number service.

use nx_sf::{
    GetServiceError, ServiceConnector, ServiceSlot, SessionHandle, Transport, hipc::BufferMode,
};

use crate::{
    cmif::{self, Command},
    error::CommandError,
    proto::{self, CSRNG_SERVICE_NAME},
};

/// Client for `csrng`.
#[derive(Debug)]
pub struct CsrngClient<T, C> {
    slot: ServiceSlot,
    transport: T,
    connector: C,
}

impl<T: Transport, C: ServiceConnector> CsrngClient<T, C> {
    pub fn new(transport: T, connector: C) -> Self {
        Self {
            slot: ServiceSlot::new(CSRNG_SERVICE_NAME),
            transport,
            connector,
        }
    }

    pub fn initialize(&self) -> Result<(), GetServiceError> {
        self.slot.acquire(&self.connector, &self.transport)
    }

    pub fn exit(&self) {
        self.slot.release(&self.transport)
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.slot.session()
    }

    /// Fills `out` with random bytes.
    ///
    /// `out` is mapped into the service, which writes it in place.
    pub fn get_random_bytes(&self, out: &mut [u8]) -> Result<(), CommandError> {
        let session = self
            .slot
            .session()
            .ok_or(CommandError::NotInitialized(CSRNG_SERVICE_NAME))?;
        let cmd =
            Command::new(proto::CMD_CSRNG_GET_RANDOM_BYTES).out_buffer(out, BufferMode::Normal);
        cmif::dispatch(&self.transport, CSRNG_SERVICE_NAME, session, cmd, cmif::no_output)
    }
}

#[cfg(test)]
mod tests {
    use nx_sf::mock::{MockConnector, MockTransport, Reply};

    use super::*;

    #[test]
    fn test_get_random_bytes_uses_mapped_buffer() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let csrng = CsrngClient::new(&transport, &connector);
        csrng.initialize().expect("opens");

        transport.push_reply(Reply::ok().with_buffer(0, &[0x3C; 0x40]));
        let mut out = [0u8; 0x40];
        csrng.get_random_bytes(&mut out).expect("random");
        assert_eq!(out, [0x3C; 0x40]);

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 0);
        assert!(req.recv_list.is_empty());
        assert_eq!(req.recv_buffers.len(), 1);
        assert_eq!(req.recv_buffers[0].mode(), BufferMode::Normal);
        assert_eq!(req.recv_buffers[0].size(), 0x40);
    }

    #[test]
    fn test_requires_initialize() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let csrng = CsrngClient::new(&transport, &connector);

        assert_eq!(
            csrng.get_random_bytes(&mut [0; 8]),
            Err(CommandError::NotInitialized(CSRNG_SERVICE_NAME))
        );

        csrng.initialize().expect("opens");
        csrng.exit();
        assert!(csrng.session().is_none());
        assert_eq!(transport.closed().len(), 1);
        assert!(transport.requests().is_empty());
    }
}
