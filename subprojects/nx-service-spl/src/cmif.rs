//! CMIF request assembly shared by the spl and csrng commands.

use nx_sf::{
    MessageBuffer, ServiceName, SessionHandle, Transport,
    cmif::{self, RequestFormatBuilder},
    hipc::BufferMode,
    wire::{self, Decoded, Record, Value},
};
use nx_svc::raw::Handle as RawHandle;

use crate::{error::CommandError, proto::MAX_STATIC_OUTPUT};

/// No spl command sends more than three statics.
const MAX_IN_POINTERS: usize = 3;

/// One command, described by its records and descriptors.
pub(crate) struct Command<'a> {
    id: u32,
    input: Record,
    values: &'a [Value<'a>],
    in_pointers: [&'a [u8]; MAX_IN_POINTERS],
    num_in_pointers: usize,
    in_buffer: Option<(&'a [u8], BufferMode)>,
    out_buffer: Option<(&'a mut [u8], BufferMode)>,
    out_pointer: Option<&'a mut [u8]>,
    output: Record,
}

impl<'a> Command<'a> {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            input: wire::EMPTY,
            values: &[],
            in_pointers: [&[]; MAX_IN_POINTERS],
            num_in_pointers: 0,
            in_buffer: None,
            out_buffer: None,
            out_pointer: None,
            output: wire::EMPTY,
        }
    }

    /// Sets the raw input record and its values.
    pub(crate) fn input(mut self, record: Record, values: &'a [Value<'a>]) -> Self {
        self.input = record;
        self.values = values;
        self
    }

    /// Appends a send static; the n-th call gets static index n.
    pub(crate) fn in_pointer(mut self, buf: &'a [u8]) -> Self {
        self.in_pointers[self.num_in_pointers] = buf;
        self.num_in_pointers += 1;
        self
    }

    pub(crate) fn in_buffer(mut self, buf: &'a [u8], mode: BufferMode) -> Self {
        self.in_buffer = Some((buf, mode));
        self
    }

    /// Sets a mapped output buffer. The service writes it in place, so it
    /// may change even when the command fails.
    pub(crate) fn out_buffer(mut self, buf: &'a mut [u8], mode: BufferMode) -> Self {
        self.out_buffer = Some((buf, mode));
        self
    }

    /// Sets a receive static output, copied to `buf` only on success.
    pub(crate) fn out_pointer(mut self, buf: &'a mut [u8]) -> Self {
        self.out_pointer = Some(buf);
        self
    }

    /// Sets the raw output record.
    pub(crate) fn output(mut self, record: Record) -> Self {
        self.output = record;
        self
    }
}

/// What a successful reply carried.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reply<'m> {
    pub(crate) data: Decoded<'m>,
    pub(crate) copy_handle: Option<RawHandle>,
}

impl Reply<'_> {
    pub(crate) fn u32(&self, name: &'static str) -> Result<u32, CommandError> {
        self.data.u32(name).ok_or(CommandError::MissingField(name))
    }

    pub(crate) fn u64(&self, name: &'static str) -> Result<u64, CommandError> {
        self.data.u64(name).ok_or(CommandError::MissingField(name))
    }

    pub(crate) fn u8(&self, name: &'static str) -> Result<u8, CommandError> {
        self.data.u8(name).ok_or(CommandError::MissingField(name))
    }

    pub(crate) fn array<const N: usize>(
        &self,
        name: &'static str,
    ) -> Result<[u8; N], CommandError> {
        self.data.array(name).ok_or(CommandError::MissingField(name))
    }
}

/// Sends `cmd` on `session` and hands the decoded reply to `parse`.
///
/// A receive static output is staged and copied out only when the service
/// succeeded and `parse` accepted the reply; on any error it is untouched.
pub(crate) fn dispatch<T, R, F>(
    transport: &T,
    service: ServiceName,
    session: SessionHandle,
    cmd: Command<'_>,
    parse: F,
) -> Result<R, CommandError>
where
    T: Transport + ?Sized,
    F: FnOnce(Reply<'_>) -> Result<R, CommandError>,
{
    let Command {
        id,
        input,
        values,
        in_pointers,
        num_in_pointers,
        in_buffer,
        out_buffer,
        out_pointer,
        output,
    } = cmd;

    let staged_len = match &out_pointer {
        Some(out) if out.len() > MAX_STATIC_OUTPUT => {
            return Err(CommandError::BufferTooLarge {
                size: out.len(),
                max: MAX_STATIC_OUTPUT,
            });
        }
        Some(out) => out.len(),
        None => 0,
    };
    let mut staging = [0u8; MAX_STATIC_OUTPUT];

    let mut msg = MessageBuffer::new();
    let fmt = RequestFormatBuilder::new(id)
        .data_size(input.size)
        .in_pointers(num_in_pointers as u32)
        .out_fixed_pointers(u32::from(out_pointer.is_some()))
        .in_buffers(u32::from(in_buffer.is_some()))
        .out_buffers(u32::from(out_buffer.is_some()))
        .build();

    let mut req = cmif::make_request(&mut msg, fmt).map_err(CommandError::BuildRequest)?;
    input
        .encode(req.data_mut(), values)
        .map_err(CommandError::Encode)?;
    for buf in &in_pointers[..num_in_pointers] {
        req.add_in_pointer(buf);
    }
    if let Some((buf, mode)) = in_buffer {
        req.add_in_buffer(buf, mode);
    }
    if let Some((buf, mode)) = out_buffer {
        req.add_out_buffer(buf, mode);
    }
    if out_pointer.is_some() {
        req.add_out_fixed_pointer(&mut staging[..staged_len]);
    }

    log::trace!("{service}: command {id}");
    transport
        .send_sync_request(session, &mut msg)
        .map_err(CommandError::SendRequest)?;

    let resp = cmif::parse_response(&msg, output.size)?;
    let data = output
        .decode(resp.data)
        .map_err(CommandError::InvalidResponse)?;
    let value = parse(Reply {
        data,
        copy_handle: resp.copy_handle(0),
    })?;

    if let Some(out) = out_pointer {
        out.copy_from_slice(&staging[..staged_len]);
    }

    Ok(value)
}

/// A `parse` callback for commands with no output.
pub(crate) fn no_output(_: Reply<'_>) -> Result<(), CommandError> {
    Ok(())
}
