//! CMIF (Command Message Interface Format) protocol implementation.
//!
//! CMIF is the command serialization layer built on top of HIPC. It adds
//! magic headers for validation and command IDs for method dispatch.
//!
//! # Message Format
//!
//! CMIF messages are embedded within the HIPC data words section:
//!
//! ```text
//! [HIPC Header + Descriptors]
//! [Padding to 16-byte alignment]
//! [InHeader (16 bytes): magic="SFCI", version, command_id, token]
//! [Payload data]
//! [Recv List]
//! ```
//!
//! Replies mirror this with an [`OutHeader`] (`"SFCO"`) carrying the result
//! code in place of the command ID.
//!
//! # Magic Numbers
//!
//! - `"SFCI"` (0x49434653): Service Framework Command Input
//! - `"SFCO"` (0x4F434653): Service Framework Command Output
//!
//! # References
//!
//! - [Switchbrew IPC Marshalling](https://switchbrew.org/wiki/IPC_Marshalling)
//! - libnx `sf/cmif.h` (fincs, SciresM)

use core::mem::size_of;

use nx_svc::{
    error::{Module, ToRawResultCode},
    raw::Handle as RawHandle,
    result::{Error, ResultCode},
};
use static_assertions::const_assert_eq;

use crate::{
    MessageBuffer,
    hipc::{self, BufferMode, MessageTooLarge},
    wire::EncodeError,
};

/// Magic number for CMIF input headers ("SFCI" - Service Framework Command Input).
pub const IN_HEADER_MAGIC: u32 = 0x49434653;

/// Magic number for CMIF output headers ("SFCO" - Service Framework Command Output).
pub const OUT_HEADER_MAGIC: u32 = 0x4F434653;

/// Builds a CMIF request message in `msg`.
///
/// Writes the HIPC framing and the CMIF header, and reserves
/// `fmt.data_size` zeroed payload bytes. Descriptors are filled in through
/// the returned [`Request`].
pub fn make_request(
    msg: &mut MessageBuffer,
    fmt: RequestFormat,
) -> Result<Request<'_>, MessageTooLarge> {
    // alignment padding + header + payload
    let actual_size = 16 + size_of::<InHeader>() + fmt.data_size;
    let num_data_words = actual_size.div_ceil(4);

    let recv_static_mode = if fmt.num_out_fixed_pointers > 0 {
        Some(hipc::RecvStaticMode::Explicit(fmt.num_out_fixed_pointers as u8))
    } else {
        None
    };

    let meta = hipc::Metadata {
        message_type: CommandType::Request.into(),
        num_send_statics: fmt.num_in_pointers as usize,
        num_send_buffers: fmt.num_in_buffers as usize,
        num_recv_buffers: fmt.num_out_buffers as usize,
        num_exch_buffers: 0,
        num_data_words,
        recv_static_mode,
        send_pid: fmt.send_pid,
        num_copy_handles: fmt.num_handles as usize,
        num_move_handles: 0,
    };

    let layout = hipc::make_request(msg, meta)?;
    let header_offset = aligned_data_start(layout.data_words);

    InHeader {
        magic: IN_HEADER_MAGIC,
        version: 0,
        command_id: fmt.request_id,
        token: 0,
    }
    .write_to(msg, header_offset);

    Ok(Request {
        msg,
        meta,
        layout,
        data_offset: header_offset + size_of::<InHeader>(),
        data_size: fmt.data_size,
        cur_in_ptr_id: 0,
        send_buffer_idx: 0,
        recv_buffer_idx: 0,
        send_static_idx: 0,
        recv_list_idx: 0,
        copy_handle_idx: 0,
    })
}

/// Builds a CMIF close request, which tells the server to drop the session.
pub fn make_close_request(msg: &mut MessageBuffer) {
    let meta = hipc::Metadata {
        message_type: CommandType::Close.into(),
        ..Default::default()
    };
    // An empty message always fits.
    let _ = hipc::make_request(msg, meta);
}

/// Parses a CMIF response message.
///
/// Validates the magic number and extracts the result code. On success,
/// returns a [`Response`] with `size` bytes of payload.
///
/// Error replies carry only the output header, so the result code is read
/// before the payload size is checked.
pub fn parse_response(
    msg: &MessageBuffer,
    size: usize,
) -> Result<Response<'_>, ParseResponseError> {
    let hipc_resp = hipc::parse_response(msg).map_err(|_| ParseResponseError::Truncated)?;
    let start = aligned_data_start(hipc_resp.data_offset());
    let data_offset = start + size_of::<OutHeader>();
    let words_end = hipc_resp.data_offset() + hipc_resp.num_data_words() * 4;

    if data_offset > words_end || data_offset > MessageBuffer::SIZE {
        return Err(ParseResponseError::Truncated);
    }

    let out_header = OutHeader::read_from(msg, start);

    if out_header.magic != OUT_HEADER_MAGIC {
        return Err(ParseResponseError::InvalidMagic);
    }

    if out_header.result != 0 {
        return Err(ParseResponseError::ServiceError(out_header.result));
    }

    if data_offset + size > words_end {
        return Err(ParseResponseError::Truncated);
    }

    let data = msg
        .get(data_offset, size)
        .ok_or(ParseResponseError::Truncated)?;

    Ok(Response {
        data,
        hipc: hipc_resp,
    })
}

/// Error returned by [`parse_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseResponseError {
    /// Response contains invalid CMIF magic header.
    #[error("invalid CMIF magic header")]
    InvalidMagic,
    /// Service returned a non-zero result code.
    #[error("service error: {0:#x}")]
    ServiceError(u32),
    /// The reply is shorter than the expected payload.
    #[error("response truncated")]
    Truncated,
}

/// `sf::cmif` result for a request that does not fit in the message buffer.
pub const RESULT_INVALID_HEADER_SIZE: ResultCode = Error::from_parts(Module::Sf, 202).to_raw();

impl ToRawResultCode for MessageTooLarge {
    fn to_rc(self) -> ResultCode {
        RESULT_INVALID_HEADER_SIZE
    }
}

impl ToRawResultCode for EncodeError {
    fn to_rc(self) -> ResultCode {
        RESULT_INVALID_HEADER_SIZE
    }
}

/// `sf::cmif` result for a reply whose output header is not `"SFCO"`.
pub const RESULT_INVALID_OUT_HEADER: ResultCode = Error::from_parts(Module::Sf, 212).to_raw();

/// `sf::cmif` result for a reply shorter than the expected output.
pub const RESULT_INVALID_OUT_RAW_SIZE: ResultCode = Error::from_parts(Module::Sf, 232).to_raw();

impl ToRawResultCode for ParseResponseError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidMagic => RESULT_INVALID_OUT_HEADER,
            Self::ServiceError(code) => code,
            Self::Truncated => RESULT_INVALID_OUT_RAW_SIZE,
        }
    }
}

/// Parses an incoming CMIF request (server side).
pub fn parse_request(msg: &MessageBuffer) -> Result<ParsedRequest<'_>, ParseRequestError> {
    let hipc = hipc::parse_request(msg).map_err(|_| ParseRequestError::Truncated)?;
    let start = aligned_data_start(hipc.layout.data_words);
    let data_offset = start + size_of::<InHeader>();
    let data_end = hipc.layout.data_words + hipc.meta.num_data_words * 4;
    if data_offset > data_end {
        return Err(ParseRequestError::Truncated);
    }

    let header = InHeader::read_from(msg, start);
    if header.magic != IN_HEADER_MAGIC {
        return Err(ParseRequestError::InvalidMagic);
    }

    Ok(ParsedRequest {
        command_type: hipc.meta.message_type.to_raw(),
        command_id: header.command_id,
        data: msg.get(data_offset, data_end - data_offset).unwrap_or(&[]),
        hipc,
    })
}

/// Error returned by [`parse_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseRequestError {
    /// Request contains invalid CMIF magic header.
    #[error("invalid CMIF magic header")]
    InvalidMagic,
    /// The header announces more data than the buffer holds.
    #[error("request truncated")]
    Truncated,
}

/// Rounds a data-words offset up to the 16-byte aligned CMIF header start.
#[inline]
pub const fn aligned_data_start(data_words_offset: usize) -> usize {
    (data_words_offset + 0xF) & !0xF
}

/// CMIF command type (stored in HIPC message type field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CommandType {
    /// Invalid command.
    Invalid = 0,
    /// Legacy request (pre-5.0.0).
    LegacyRequest = 1,
    /// Close session.
    Close = 2,
    /// Legacy control request.
    LegacyControl = 3,
    /// Standard request.
    Request = 4,
    /// Control request (domain conversion, cloning, etc.).
    Control = 5,
}

impl From<CommandType> for hipc::MessageType {
    fn from(cmd: CommandType) -> Self {
        hipc::MessageType::from_raw(cmd as u16)
    }
}

/// CMIF input header (16 bytes).
///
/// Present at the start of every CMIF request payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InHeader {
    /// Magic number (`"SFCI"` = 0x49434653).
    pub magic: u32,
    /// Protocol version.
    pub version: u32,
    /// Command/method ID to invoke.
    pub command_id: u32,
    /// Context token.
    pub token: u32,
}

const_assert_eq!(size_of::<InHeader>(), 16);

impl InHeader {
    fn write_to(&self, msg: &mut MessageBuffer, offset: usize) {
        msg.write_u32(offset, self.magic);
        msg.write_u32(offset + 4, self.version);
        msg.write_u32(offset + 8, self.command_id);
        msg.write_u32(offset + 12, self.token);
    }

    fn read_from(msg: &MessageBuffer, offset: usize) -> Self {
        Self {
            magic: msg.read_u32(offset),
            version: msg.read_u32(offset + 4),
            command_id: msg.read_u32(offset + 8),
            token: msg.read_u32(offset + 12),
        }
    }
}

/// CMIF output header (16 bytes).
///
/// Present at the start of every CMIF response payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct OutHeader {
    /// Magic number (`"SFCO"` = 0x4F434653).
    pub magic: u32,
    /// Protocol version.
    pub version: u32,
    /// Result code (0 = success).
    pub result: u32,
    /// Echo of request token.
    pub token: u32,
}

const_assert_eq!(size_of::<OutHeader>(), 16);

impl OutHeader {
    /// Writes the header at `offset`.
    pub fn write_to(&self, msg: &mut MessageBuffer, offset: usize) {
        msg.write_u32(offset, self.magic);
        msg.write_u32(offset + 4, self.version);
        msg.write_u32(offset + 8, self.result);
        msg.write_u32(offset + 12, self.token);
    }

    fn read_from(msg: &MessageBuffer, offset: usize) -> Self {
        Self {
            magic: msg.read_u32(offset),
            version: msg.read_u32(offset + 4),
            result: msg.read_u32(offset + 8),
            token: msg.read_u32(offset + 12),
        }
    }
}

/// Request format descriptor.
///
/// Describes the layout of a CMIF request to be built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFormat {
    /// Command/method ID.
    pub request_id: u32,
    /// Size of payload data in bytes.
    pub data_size: usize,
    /// Number of mapped input buffers.
    pub num_in_buffers: u32,
    /// Number of mapped output buffers.
    pub num_out_buffers: u32,
    /// Number of input pointer descriptors.
    pub num_in_pointers: u32,
    /// Number of fixed-size output pointers.
    pub num_out_fixed_pointers: u32,
    /// Number of handles to copy.
    pub num_handles: u32,
    /// Whether to include process ID.
    pub send_pid: bool,
}

/// Builder for constructing [`RequestFormat`].
#[derive(Debug, Clone, Default)]
pub struct RequestFormatBuilder {
    inner: RequestFormat,
}

impl RequestFormatBuilder {
    /// Creates a new builder with the given command ID.
    pub fn new(request_id: u32) -> Self {
        Self {
            inner: RequestFormat {
                request_id,
                ..Default::default()
            },
        }
    }

    /// Sets the payload data size in bytes.
    pub fn data_size(mut self, size: usize) -> Self {
        self.inner.data_size = size;
        self
    }

    /// Sets the number of mapped input buffers.
    pub fn in_buffers(mut self, count: u32) -> Self {
        self.inner.num_in_buffers = count;
        self
    }

    /// Sets the number of mapped output buffers.
    pub fn out_buffers(mut self, count: u32) -> Self {
        self.inner.num_out_buffers = count;
        self
    }

    /// Sets the number of input pointer descriptors.
    pub fn in_pointers(mut self, count: u32) -> Self {
        self.inner.num_in_pointers = count;
        self
    }

    /// Sets the number of fixed-size output pointers.
    pub fn out_fixed_pointers(mut self, count: u32) -> Self {
        self.inner.num_out_fixed_pointers = count;
        self
    }

    /// Sets the number of handles to copy.
    pub fn handles(mut self, count: u32) -> Self {
        self.inner.num_handles = count;
        self
    }

    /// Enables sending the process ID.
    pub fn send_pid(mut self) -> Self {
        self.inner.send_pid = true;
        self
    }

    /// Builds the [`RequestFormat`].
    pub fn build(self) -> RequestFormat {
        self.inner
    }
}

/// Active CMIF request being built.
///
/// Use the `add_*` methods to fill in descriptors in the order the command
/// expects them. Descriptors record buffer addresses only; the buffers must
/// stay alive and unmoved until the request has been sent.
///
/// # Panics
///
/// The `add_*` methods panic when called more times than the
/// [`RequestFormat`] reserved slots for.
#[derive(Debug)]
pub struct Request<'a> {
    msg: &'a mut MessageBuffer,
    meta: hipc::Metadata,
    layout: hipc::Layout,
    data_offset: usize,
    data_size: usize,
    cur_in_ptr_id: u8,
    send_buffer_idx: usize,
    recv_buffer_idx: usize,
    send_static_idx: usize,
    recv_list_idx: usize,
    copy_handle_idx: usize,
}

impl Request<'_> {
    /// The payload area following the CMIF header.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let (offset, size) = (self.data_offset, self.data_size);
        &mut self.msg.as_bytes_mut()[offset..offset + size]
    }

    /// Byte offset of the payload area within the message.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Adds a mapped input buffer (Type A / Send Buffer).
    pub fn add_in_buffer(&mut self, buffer: &[u8], mode: BufferMode) {
        let idx = self.send_buffer_idx;
        assert!(idx < self.meta.num_send_buffers, "send buffer slots exhausted");
        let desc = hipc::BufferDescriptor::new_buffer(buffer.as_ptr(), buffer.len(), mode);
        self.msg
            .write_bytes(self.layout.send_buffers + idx * 12, &desc.into_bytes());
        self.send_buffer_idx += 1;
    }

    /// Adds a mapped output buffer (Type B / Recv Buffer).
    pub fn add_out_buffer(&mut self, buffer: &mut [u8], mode: BufferMode) {
        let idx = self.recv_buffer_idx;
        assert!(idx < self.meta.num_recv_buffers, "recv buffer slots exhausted");
        let desc = hipc::BufferDescriptor::new_buffer(buffer.as_mut_ptr(), buffer.len(), mode);
        self.msg
            .write_bytes(self.layout.recv_buffers + idx * 12, &desc.into_bytes());
        self.recv_buffer_idx += 1;
    }

    /// Adds an input pointer descriptor (Type X / Send Static).
    ///
    /// Static indices are assigned in call order, starting at 0.
    pub fn add_in_pointer(&mut self, buffer: &[u8]) {
        let idx = self.send_static_idx;
        assert!(idx < self.meta.num_send_statics, "send static slots exhausted");
        let desc =
            hipc::StaticDescriptor::new_send(buffer.as_ptr(), buffer.len(), self.cur_in_ptr_id);
        self.msg
            .write_bytes(self.layout.send_statics + idx * 8, &desc.into_bytes());
        self.send_static_idx += 1;
        self.cur_in_ptr_id += 1;
    }

    /// Adds a fixed-size output pointer (Type C / Recv List).
    pub fn add_out_fixed_pointer(&mut self, buffer: &mut [u8]) {
        let idx = self.recv_list_idx;
        let count = self
            .meta
            .recv_static_mode
            .map_or(0, hipc::RecvStaticMode::as_count);
        assert!(idx < count, "recv list slots exhausted");
        let entry = hipc::RecvListEntry::new_recv(buffer.as_mut_ptr(), buffer.len());
        self.msg
            .write_bytes(self.layout.recv_list + idx * 8, &entry.into_bytes());
        self.recv_list_idx += 1;
    }

    /// Adds a copy handle to the request.
    pub fn add_handle(&mut self, handle: RawHandle) {
        let idx = self.copy_handle_idx;
        assert!(idx < self.meta.num_copy_handles, "copy handle slots exhausted");
        self.msg.write_u32(self.layout.copy_handles + idx * 4, handle);
        self.copy_handle_idx += 1;
    }
}

/// Parsed CMIF response.
#[derive(Debug)]
pub struct Response<'a> {
    /// Response payload data.
    pub data: &'a [u8],
    /// HIPC view of the reply, for handles.
    pub hipc: hipc::Response<'a>,
}

impl Response<'_> {
    /// Returns the `index`-th copy handle.
    pub fn copy_handle(&self, index: usize) -> Option<RawHandle> {
        self.hipc.copy_handle(index)
    }

    /// Returns the `index`-th move handle.
    pub fn move_handle(&self, index: usize) -> Option<RawHandle> {
        self.hipc.move_handle(index)
    }
}

/// Parsed incoming CMIF request (server side).
#[derive(Debug)]
pub struct ParsedRequest<'a> {
    /// Raw HIPC message type ([`CommandType`]).
    pub command_type: u16,
    /// Command/method ID from the CMIF header.
    pub command_id: u32,
    /// Payload following the CMIF header, up to the end of the data words.
    pub data: &'a [u8],
    /// HIPC view of the request, for descriptors and handles.
    pub hipc: hipc::ParsedRequest<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_request_places_header_at_aligned_offset() {
        let mut msg = MessageBuffer::new();
        let fmt = RequestFormatBuilder::new(7).data_size(8).build();
        let mut req = make_request(&mut msg, fmt).expect("fits");
        req.data_mut().copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(req.data_offset(), 0x20);

        // header (8) + data words, header aligned up to 0x10
        assert_eq!(msg.read_u32(0x10), IN_HEADER_MAGIC);
        assert_eq!(msg.read_u32(0x18), 7);
        assert_eq!(msg.read_u64(0x20), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_make_request_records_descriptors_in_order() {
        let mut msg = MessageBuffer::new();
        let input = [1u8; 0x10];
        let exp = [2u8; 0x20];
        let mut out = [0u8; 0x30];

        let fmt = RequestFormatBuilder::new(1)
            .in_pointers(2)
            .out_fixed_pointers(1)
            .build();
        let mut req = make_request(&mut msg, fmt).expect("fits");
        req.add_in_pointer(&input);
        req.add_in_pointer(&exp);
        req.add_out_fixed_pointer(&mut out);

        let parsed = parse_request(&msg).expect("well formed");
        assert_eq!(parsed.command_id, 1);
        assert_eq!(parsed.command_type, CommandType::Request as u16);

        let first = parsed.hipc.send_static(0).expect("static 0");
        let second = parsed.hipc.send_static(1).expect("static 1");
        assert_eq!((first.index(), first.size()), (0, 0x10));
        assert_eq!((second.index(), second.size()), (1, 0x20));
        assert_eq!(second.address(), exp.as_ptr() as usize & 0x3FF_FFFF_FFFF);

        let recv = parsed.hipc.recv_list_entry(0).expect("recv entry");
        assert_eq!(recv.size(), 0x30);
        assert!(parsed.hipc.recv_list_entry(1).is_none());
    }

    #[test]
    fn test_parse_response_reports_service_error() {
        let mut msg = MessageBuffer::new();
        let meta = hipc::Metadata {
            num_data_words: 8,
            ..Default::default()
        };
        let layout = hipc::make_request(&mut msg, meta).expect("fits");
        OutHeader {
            magic: OUT_HEADER_MAGIC,
            result: 0xCAFE,
            ..Default::default()
        }
        .write_to(&mut msg, aligned_data_start(layout.data_words));

        let err = parse_response(&msg, 0).expect_err("non-zero result");
        assert_eq!(err, ParseResponseError::ServiceError(0xCAFE));
    }

    #[test]
    fn test_parse_response_rejects_bad_magic_and_short_reply() {
        let mut msg = MessageBuffer::new();
        let meta = hipc::Metadata {
            num_data_words: 8,
            ..Default::default()
        };
        let layout = hipc::make_request(&mut msg, meta).expect("fits");
        assert_eq!(
            parse_response(&msg, 0).expect_err("zero magic"),
            ParseResponseError::InvalidMagic
        );

        OutHeader {
            magic: OUT_HEADER_MAGIC,
            ..Default::default()
        }
        .write_to(&mut msg, aligned_data_start(layout.data_words));
        assert_eq!(
            parse_response(&msg, 0x40).expect_err("payload past data words"),
            ParseResponseError::Truncated
        );
    }

    #[test]
    fn test_parse_response_reads_result_before_payload_size() {
        let mut msg = MessageBuffer::new();
        let meta = hipc::Metadata {
            num_data_words: 8,
            ..Default::default()
        };
        let layout = hipc::make_request(&mut msg, meta).expect("fits");
        OutHeader {
            magic: OUT_HEADER_MAGIC,
            result: 0xD21A,
            ..Default::default()
        }
        .write_to(&mut msg, aligned_data_start(layout.data_words));

        assert_eq!(
            parse_response(&msg, 0x10).expect_err("header-only error reply"),
            ParseResponseError::ServiceError(0xD21A)
        );
    }

    #[test]
    fn test_close_request_is_bare_header() {
        let mut msg = MessageBuffer::new();
        msg.write_u32(0x40, 0xFFFF_FFFF);
        make_close_request(&mut msg);
        assert_eq!(msg.read_u64(0), CommandType::Close as u64);
        assert_eq!(msg.read_u32(0x40), 0);
    }
}
