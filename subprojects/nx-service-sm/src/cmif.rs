//! CMIF protocol operations for Service Manager.

use nx_sf::{
    GetServiceError, MessageBuffer, ServiceName, SessionHandle, Transport, cmif,
    hipc::MessageTooLarge, wire::Value,
};
use nx_svc::{error::ToRawResultCode, ipc::SendSyncError, result::ResultCode};

use crate::proto;

/// Gets a service handle by name.
///
/// The service manager answers with the new session as a move handle.
pub fn get_service_handle<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    name: ServiceName,
) -> Result<SessionHandle, GetServiceError> {
    let mut msg = MessageBuffer::new();

    let fmt = cmif::RequestFormatBuilder::new(proto::GET_SERVICE_HANDLE)
        .data_size(proto::GET_SERVICE_HANDLE_IN.size)
        .build();
    let mut req = cmif::make_request(&mut msg, fmt).map_err(GetServiceError::BuildRequest)?;
    proto::GET_SERVICE_HANDLE_IN
        .encode(req.data_mut(), &[Value::U64(name.to_u64())])
        .map_err(GetServiceError::Encode)?;

    log::trace!("sm: GetServiceHandle({name})");
    transport
        .send_sync_request(session, &mut msg)
        .map_err(GetServiceError::SendRequest)?;

    let resp = cmif::parse_response(&msg, 0)?;
    let raw = resp.move_handle(0).ok_or(GetServiceError::MissingHandle)?;

    // SAFETY: The kernel moved a freshly created session handle to us.
    Ok(unsafe { SessionHandle::from_raw(raw) })
}

/// Registers the client with the Service Manager.
///
/// Sends the RegisterClient command (cmd 0) with PID.
pub fn register_client<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
) -> Result<(), RegisterClientError> {
    let mut msg = MessageBuffer::new();

    let fmt = cmif::RequestFormatBuilder::new(proto::REGISTER_CLIENT)
        .data_size(proto::REGISTER_CLIENT_IN.size)
        .send_pid()
        .build();
    // A zeroed payload is the reserved u64.
    cmif::make_request(&mut msg, fmt).map_err(RegisterClientError::BuildRequest)?;

    log::trace!("sm: RegisterClient");
    transport
        .send_sync_request(session, &mut msg)
        .map_err(RegisterClientError::SendRequest)?;

    cmif::parse_response(&msg, 0).map_err(RegisterClientError::ParseResponse)?;

    Ok(())
}

/// Error returned by [`register_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterClientError {
    /// The request did not fit in the message buffer.
    #[error("failed to build request")]
    BuildRequest(#[source] MessageTooLarge),
    /// Failed to send the IPC request.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// Failed to parse the CMIF response.
    #[error("failed to parse response")]
    ParseResponse(#[source] cmif::ParseResponseError),
}

impl ToRawResultCode for RegisterClientError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::BuildRequest(err) => err.to_rc(),
            Self::SendRequest(err) => err.to_rc(),
            Self::ParseResponse(err) => err.to_rc(),
        }
    }
}
