//! CMIF protocol operations for the pm services.
//!
//! Every pm command carries only raw data in, and raw data or a copy handle
//! out, so they all go through [`dispatch`].

use nx_sf::{
    MessageBuffer, ServiceName, SessionHandle, Transport,
    cmif::{self, ParseResponseError, RESULT_INVALID_OUT_RAW_SIZE},
    hipc::MessageTooLarge,
    wire::{self, DecodeError, EncodeError, Record, Value},
};
use nx_svc::{
    error::{ClientError, ToRawResultCode},
    ipc::{EventHandle, SendSyncError},
    result::ResultCode,
};

use crate::proto::{self, DmntCommand, LaunchFlags, StorageId};

/// Sends one command and parses its reply.
///
/// On success the returned response holds exactly `output.size` bytes of
/// payload.
#[allow(clippy::too_many_arguments)]
fn dispatch<'m, T: Transport + ?Sized>(
    transport: &T,
    service: ServiceName,
    session: SessionHandle,
    msg: &'m mut MessageBuffer,
    command_id: u32,
    input: &Record,
    values: &[Value<'_>],
    output: &Record,
) -> Result<cmif::Response<'m>, CommandError> {
    let fmt = cmif::RequestFormatBuilder::new(command_id)
        .data_size(input.size)
        .build();
    let mut req = cmif::make_request(msg, fmt).map_err(CommandError::BuildRequest)?;
    input
        .encode(req.data_mut(), values)
        .map_err(CommandError::Encode)?;

    log::trace!("{service}: command {command_id}");
    transport
        .send_sync_request(session, msg)
        .map_err(CommandError::SendRequest)?;

    Ok(cmif::parse_response(&*msg, output.size)?)
}

/// Resumes a process launched suspended.
pub fn start_process<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    renumbered: bool,
    pid: u64,
) -> Result<(), CommandError> {
    let mut msg = MessageBuffer::new();
    dispatch(
        transport,
        proto::DMNT_SERVICE_NAME,
        session,
        &mut msg,
        DmntCommand::StartProcess.id(renumbered),
        &proto::PID_IN,
        &[Value::U64(pid)],
        &wire::EMPTY,
    )?;
    Ok(())
}

/// Looks up the process id of a running title.
pub fn get_title_pid<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    renumbered: bool,
    title_id: u64,
) -> Result<u64, CommandError> {
    let mut msg = MessageBuffer::new();
    let resp = dispatch(
        transport,
        proto::DMNT_SERVICE_NAME,
        session,
        &mut msg,
        DmntCommand::GetTitlePid.id(renumbered),
        &proto::TITLE_ID_IN,
        &[Value::U64(title_id)],
        &proto::PID_OUT,
    )?;
    read_pid(resp.data)
}

/// Asks pm to signal the returned event when `title_id` is launched.
pub fn enable_debug_for_title_id<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    renumbered: bool,
    title_id: u64,
) -> Result<EventHandle, CommandError> {
    let mut msg = MessageBuffer::new();
    let resp = dispatch(
        transport,
        proto::DMNT_SERVICE_NAME,
        session,
        &mut msg,
        DmntCommand::EnableDebugForTitleId.id(renumbered),
        &proto::TITLE_ID_IN,
        &[Value::U64(title_id)],
        &wire::EMPTY,
    )?;
    event_from(&resp)
}

/// Looks up the process id of the running application.
pub fn get_application_pid<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    renumbered: bool,
) -> Result<u64, CommandError> {
    let mut msg = MessageBuffer::new();
    let resp = dispatch(
        transport,
        proto::DMNT_SERVICE_NAME,
        session,
        &mut msg,
        DmntCommand::GetApplicationPid.id(renumbered),
        &wire::EMPTY,
        &[],
        &proto::PID_OUT,
    )?;
    read_pid(resp.data)
}

/// Asks pm to signal the returned event when the next application launches.
pub fn enable_debug_for_application<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    renumbered: bool,
) -> Result<EventHandle, CommandError> {
    let mut msg = MessageBuffer::new();
    let resp = dispatch(
        transport,
        proto::DMNT_SERVICE_NAME,
        session,
        &mut msg,
        DmntCommand::EnableDebugForApplication.id(renumbered),
        &wire::EMPTY,
        &[],
        &wire::EMPTY,
    )?;
    event_from(&resp)
}

/// Launches a title and returns its process id.
pub fn launch_process<T: Transport + ?Sized>(
    transport: &T,
    session: SessionHandle,
    flags: LaunchFlags,
    title_id: u64,
    storage_id: StorageId,
) -> Result<u64, CommandError> {
    let mut msg = MessageBuffer::new();
    let resp = dispatch(
        transport,
        proto::SHELL_SERVICE_NAME,
        session,
        &mut msg,
        proto::CMD_LAUNCH_PROCESS,
        &proto::LAUNCH_PROCESS_IN,
        &[
            Value::U32(flags.bits()),
            Value::U64(title_id),
            Value::U64(storage_id.0),
        ],
        &proto::PID_OUT,
    )?;
    read_pid(resp.data)
}

fn read_pid(data: &[u8]) -> Result<u64, CommandError> {
    let out = proto::PID_OUT
        .decode(data)
        .map_err(CommandError::InvalidResponse)?;
    out.u64("pid").ok_or(CommandError::MissingField("pid"))
}

fn event_from(resp: &cmif::Response<'_>) -> Result<EventHandle, CommandError> {
    let raw = resp.copy_handle(0).ok_or(CommandError::MissingHandle)?;
    // SAFETY: The kernel copied a valid event handle into our handle table.
    Ok(unsafe { EventHandle::from_raw(raw) })
}

/// Error returned by pm commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The service session has not been opened.
    #[error("{0} is not initialized")]
    NotInitialized(ServiceName),
    /// The request did not fit in the message buffer.
    #[error("failed to build request")]
    BuildRequest(#[source] MessageTooLarge),
    /// The request payload did not match its record.
    #[error("failed to encode request")]
    Encode(#[source] EncodeError),
    /// Failed to send the IPC request.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// The service returned a non-zero result.
    #[error("service error: {0:#x}")]
    Service(ResultCode),
    /// The reply was malformed.
    #[error("failed to parse response")]
    ParseResponse(#[source] ParseResponseError),
    /// The reply payload did not match its record.
    #[error("invalid response")]
    InvalidResponse(#[source] DecodeError),
    /// A field the reply record should define was absent.
    #[error("missing field {0} in response")]
    MissingField(&'static str),
    /// The reply did not carry the expected handle.
    #[error("missing handle in response")]
    MissingHandle,
}

impl From<ParseResponseError> for CommandError {
    fn from(err: ParseResponseError) -> Self {
        match err {
            ParseResponseError::ServiceError(code) => Self::Service(code),
            err => Self::ParseResponse(err),
        }
    }
}

impl ToRawResultCode for CommandError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::NotInitialized(_) => ClientError::NotInitialized.to_rc(),
            Self::BuildRequest(err) => err.to_rc(),
            Self::Encode(err) => err.to_rc(),
            Self::SendRequest(err) => err.to_rc(),
            Self::Service(code) => code,
            Self::ParseResponse(err) => err.to_rc(),
            Self::InvalidResponse(_) | Self::MissingField(_) | Self::MissingHandle => {
                RESULT_INVALID_OUT_RAW_SIZE
            }
        }
    }
}
