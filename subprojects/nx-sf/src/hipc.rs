//! HIPC (Horizon Inter-Process Communication) message framing.
//!
//! HIPC is the low-level message serialization protocol for IPC on Horizon OS.
//! It defines the wire format for passing data, handles, and buffer
//! descriptors between processes via kernel supervisor calls.
//!
//! # Message Layout
//!
//! ```text
//! Offset  Size   Field
//! ──────────────────────────────────────────────────────────────
//! 0x00    0x08   Header (message type, descriptor counts)
//! 0x08    0x04   SpecialHeader (optional: PID flag, handle counts)
//! 0x0C    0x08   ProcessId (optional: if send_pid is set)
//!         var    Copy Handles (4 bytes × num_copy_handles)
//!         var    Move Handles (4 bytes × num_move_handles)
//!         var    Send Statics / Type X (8 bytes each)
//!         var    Send Buffers / Type A (12 bytes each)
//!         var    Recv Buffers / Type B (12 bytes each)
//!         var    Exch Buffers / Type W (12 bytes each)
//!         var    Data Words (raw payload, 4 bytes each)
//!         var    Recv List / Type C (8 bytes each)
//! ──────────────────────────────────────────────────────────────
//! ```
//!
//! # Descriptor Types (Switchbrew Naming)
//!
//! | Type | Name          | Direction      | Mechanism        | Size Limit |
//! |------|---------------|----------------|------------------|------------|
//! | X    | Send Static   | Client→Server  | Pointer (copy)   | 64 KB      |
//! | A    | Send Buffer   | Client→Server  | Memory mapping   | 4 GB       |
//! | B    | Recv Buffer   | Server→Client  | Memory mapping   | 4 GB       |
//! | W    | Exch Buffer   | Bidirectional  | Memory mapping   | 4 GB       |
//! | C    | Recv List     | Server→Client  | Pointer (copy)   | 64 KB      |
//!
//! The `recv_static_mode` header field controls the receive list:
//! mode 0 means none, mode 2 auto-sizes it, and mode `2 + n` announces
//! exactly `n` entries.
//!
//! Messages are built in, and parsed from, a [`MessageBuffer`]. All offsets
//! are byte offsets from the start of the message; no raw pointer into the
//! buffer ever leaves this module.
//!
//! # References
//!
//! - [Switchbrew IPC Marshalling](https://switchbrew.org/wiki/IPC_Marshalling)
//! - libnx `sf/hipc.h` (fincs, SciresM)

use core::mem::size_of;

use modular_bitfield::prelude::*;
use nx_svc::raw::Handle as RawHandle;
use static_assertions::const_assert_eq;

use crate::MessageBuffer;

/// Sentinel value indicating no PID in the response.
pub const RESPONSE_NO_PID: u64 = u32::MAX as u64;

/// Byte offsets of every section of a message, derived from its [`Metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Offset of the process ID slot, if one is present.
    pub pid: Option<usize>,
    pub copy_handles: usize,
    pub move_handles: usize,
    pub send_statics: usize,
    pub send_buffers: usize,
    pub recv_buffers: usize,
    pub exch_buffers: usize,
    pub data_words: usize,
    pub recv_list: usize,
    /// One past the last byte of the message.
    pub end: usize,
}

/// Computes the section offsets for a message with the given metadata.
///
/// Fails if the message would not fit in a [`MessageBuffer`].
pub fn calc_layout(meta: &Metadata) -> Result<Layout, MessageTooLarge> {
    let mut cursor = size_of::<Header>();
    let mut pid = None;

    if meta.has_special_header() {
        cursor += size_of::<SpecialHeader>();
        if meta.send_pid {
            pid = Some(cursor);
            cursor += size_of::<u64>();
        }
    }

    let copy_handles = cursor;
    cursor += meta.num_copy_handles * size_of::<RawHandle>();
    let move_handles = cursor;
    cursor += meta.num_move_handles * size_of::<RawHandle>();
    let send_statics = cursor;
    cursor += meta.num_send_statics * size_of::<StaticDescriptor>();
    let send_buffers = cursor;
    cursor += meta.num_send_buffers * size_of::<BufferDescriptor>();
    let recv_buffers = cursor;
    cursor += meta.num_recv_buffers * size_of::<BufferDescriptor>();
    let exch_buffers = cursor;
    cursor += meta.num_exch_buffers * size_of::<BufferDescriptor>();
    let data_words = cursor;
    cursor += meta.num_data_words * size_of::<u32>();
    let recv_list = cursor;
    if let Some(mode) = meta.recv_static_mode {
        cursor += mode.as_count() * size_of::<RecvListEntry>();
    }

    if cursor > MessageBuffer::SIZE {
        return Err(MessageTooLarge { size: cursor });
    }

    Ok(Layout {
        pid,
        copy_handles,
        move_handles,
        send_statics,
        send_buffers,
        recv_buffers,
        exch_buffers,
        data_words,
        recv_list,
        end: cursor,
    })
}

/// Writes the HIPC headers for a message and returns its section layout.
///
/// The rest of the buffer is zeroed, so unused descriptor slots and padding
/// are always zero on the wire.
pub fn make_request(msg: &mut MessageBuffer, meta: Metadata) -> Result<Layout, MessageTooLarge> {
    if meta.num_send_statics > 0xF
        || meta.num_send_buffers > 0xF
        || meta.num_recv_buffers > 0xF
        || meta.num_exch_buffers > 0xF
        || meta.num_copy_handles > 0xF
        || meta.num_move_handles > 0xF
        || meta.num_data_words > 0x3FF
    {
        return Err(MessageTooLarge { size: usize::MAX });
    }

    let layout = calc_layout(&meta)?;
    msg.clear();

    let has_special_header = meta.has_special_header();
    let recv_static_mode = meta.recv_static_mode.map_or(0, RecvStaticMode::to_raw);
    let header = Header::new()
        .with_message_type(meta.message_type.to_raw())
        .with_num_send_statics(meta.num_send_statics as u8)
        .with_num_send_buffers(meta.num_send_buffers as u8)
        .with_num_recv_buffers(meta.num_recv_buffers as u8)
        .with_num_exch_buffers(meta.num_exch_buffers as u8)
        .with_num_data_words(meta.num_data_words as u16)
        .with_recv_static_mode(recv_static_mode)
        .with_recv_list_offset(0)
        .with_has_special_header(has_special_header);
    msg.write_bytes(0, &header.into_bytes());

    if has_special_header {
        let special = SpecialHeader::new()
            .with_send_pid(meta.send_pid)
            .with_num_copy_handles(meta.num_copy_handles as u8)
            .with_num_move_handles(meta.num_move_handles as u8);
        msg.write_bytes(size_of::<Header>(), &special.into_bytes());
    }

    Ok(layout)
}

/// Error returned when a message does not fit in the IPC buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message of {size} bytes exceeds the IPC buffer")]
pub struct MessageTooLarge {
    /// Size the message would have needed.
    pub size: usize,
}

/// Error returned when a received message is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The header announces more data than the buffer holds.
    #[error("message truncated: needs {size} bytes")]
    Truncated {
        /// Size the header claims the message has.
        size: usize,
    },
}

/// Reads the HIPC header of `msg` and reconstructs its metadata.
fn parse_metadata(msg: &MessageBuffer) -> (Metadata, Option<u64>) {
    let header = Header::from_bytes(msg.read_array::<8>(0));

    let mut num_copy_handles = 0usize;
    let mut num_move_handles = 0usize;
    let mut send_pid = false;

    if header.has_special_header() {
        let special = SpecialHeader::from_bytes(msg.read_array::<4>(size_of::<Header>()));
        send_pid = special.send_pid();
        num_copy_handles = special.num_copy_handles() as usize;
        num_move_handles = special.num_move_handles() as usize;
    }

    let meta = Metadata {
        message_type: MessageType::from_raw(header.message_type()),
        num_send_statics: header.num_send_statics() as usize,
        num_send_buffers: header.num_send_buffers() as usize,
        num_recv_buffers: header.num_recv_buffers() as usize,
        num_exch_buffers: header.num_exch_buffers() as usize,
        num_data_words: header.num_data_words() as usize,
        recv_static_mode: RecvStaticMode::from_raw(header.recv_static_mode()),
        send_pid,
        num_copy_handles,
        num_move_handles,
    };

    let pid = if send_pid {
        Some(msg.read_u64(size_of::<Header>() + size_of::<SpecialHeader>()))
    } else {
        None
    };

    (meta, pid)
}

/// Parses an incoming HIPC request (server side).
///
/// Receive lists in `Auto` mode are reported with no entries, since their
/// length is only known to the kernel.
pub fn parse_request(msg: &MessageBuffer) -> Result<ParsedRequest<'_>, ParseError> {
    let (mut meta, pid) = parse_metadata(msg);
    if meta.recv_static_mode == Some(RecvStaticMode::Auto) {
        meta.recv_static_mode = None;
    }
    let layout = calc_layout(&meta).map_err(|err| ParseError::Truncated { size: err.size })?;

    Ok(ParsedRequest {
        meta,
        layout,
        pid: pid.unwrap_or(0),
        msg,
    })
}

/// Parses an HIPC response.
pub fn parse_response(msg: &MessageBuffer) -> Result<Response<'_>, ParseError> {
    let (mut meta, pid) = parse_metadata(msg);
    // Replies never carry a receive list or mapped buffers.
    meta.recv_static_mode = None;
    meta.num_send_buffers = 0;
    meta.num_recv_buffers = 0;
    meta.num_exch_buffers = 0;
    let layout = calc_layout(&meta).map_err(|err| ParseError::Truncated { size: err.size })?;

    Ok(Response {
        pid: pid.unwrap_or(RESPONSE_NO_PID),
        meta,
        layout,
        msg,
    })
}

/// Buffer transfer mode for HIPC buffer descriptors.
///
/// Controls how the kernel maps the buffer between processes.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[bits = 2]
pub enum BufferMode {
    /// Normal buffer mapping.
    Normal = 0,
    /// Non-secure memory area.
    NonSecure = 1,
    /// Invalid/device memory (cannot be mapped).
    Invalid = 2,
    /// Non-device memory area.
    NonDevice = 3,
}

/// HIPC message header (8 bytes).
///
/// This is the first structure in every HIPC message and describes
/// the message type and the counts of various descriptors that follow.
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Header {
    /// Message type. Command type for CMIF.
    pub message_type: B16,
    /// Number of send static descriptors.
    pub num_send_statics: B4,
    /// Number of send buffer descriptors.
    pub num_send_buffers: B4,
    /// Number of receive buffer descriptors.
    pub num_recv_buffers: B4,
    /// Number of exchange buffer descriptors.
    pub num_exch_buffers: B4,
    /// Number of data words in the message.
    pub num_data_words: B10,
    /// Receive static mode (0 = none, 2 = auto, 2+n = n entries).
    pub recv_static_mode: B4,
    #[skip]
    __padding: B6,
    /// Offset to receive list (unused).
    pub recv_list_offset: B11,
    /// Whether a special header follows.
    pub has_special_header: bool,
}

const_assert_eq!(size_of::<Header>(), 8);

/// HIPC special header (4 bytes).
///
/// Present when the message includes PID or handles.
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SpecialHeader {
    /// Whether to send the process ID.
    pub send_pid: bool,
    /// Number of copy handles.
    pub num_copy_handles: B4,
    /// Number of move handles.
    pub num_move_handles: B4,
    #[skip]
    __padding: B23,
}

const_assert_eq!(size_of::<SpecialHeader>(), 4);

/// Static descriptor for send statics (8 bytes).
///
/// The address is split across multiple fields for encoding.
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct StaticDescriptor {
    /// Index for matching send/receive pairs.
    pub index: B6,
    /// Address bits 36-41.
    pub address_high: B6,
    /// Address bits 32-35.
    pub address_mid: B4,
    /// Size of the buffer.
    pub size: B16,
    /// Address bits 0-31.
    pub address_low: B32,
}

const_assert_eq!(size_of::<StaticDescriptor>(), 8);

impl StaticDescriptor {
    /// Creates a static descriptor for sending data.
    pub fn new_send(buffer: *const u8, size: usize, index: u8) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_index(index & 0x3F)
            .with_address_low(addr as u32)
            .with_address_mid(((addr >> 32) & 0xF) as u8)
            .with_address_high(((addr >> 36) & 0x3F) as u8)
            .with_size(size as u16)
    }

    /// Reconstructs the full address from the split fields.
    pub fn address(&self) -> usize {
        self.address_low() as usize
            | ((self.address_mid() as usize) << 32)
            | ((self.address_high() as usize) << 36)
    }
}

/// Buffer descriptor for send/receive/exchange buffers (12 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct BufferDescriptor {
    /// Size bits 0-31.
    pub size_low: B32,
    /// Address bits 0-31.
    pub address_low: B32,
    /// Buffer mode (Normal, NonSecure, etc.).
    pub mode: BufferMode,
    /// Address bits 36-57.
    pub address_high: B22,
    /// Size bits 32-35.
    pub size_high: B4,
    /// Address bits 32-35.
    pub address_mid: B4,
}

const_assert_eq!(size_of::<BufferDescriptor>(), 12);

impl BufferDescriptor {
    /// Creates a buffer descriptor with the given mode.
    pub fn new_buffer(buffer: *const u8, size: usize, mode: BufferMode) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_mode(mode)
            .with_address_low(addr as u32)
            .with_address_mid(((addr >> 32) & 0xF) as u8)
            .with_address_high(((addr >> 36) & 0x3FFFFF) as u32)
            .with_size_low(size as u32)
            .with_size_high(((size >> 32) & 0xF) as u8)
    }

    /// Reconstructs the full address from the split fields.
    pub fn address(&self) -> usize {
        self.address_low() as usize
            | ((self.address_mid() as usize) << 32)
            | ((self.address_high() as usize) << 36)
    }

    /// Reconstructs the full size from the split fields.
    pub fn size(&self) -> usize {
        self.size_low() as usize | ((self.size_high() as usize) << 32)
    }
}

/// Receive list entry for static receive buffers (8 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct RecvListEntry {
    /// Address bits 0-31.
    pub address_low: B32,
    /// Address bits 32-47.
    pub address_high: B16,
    /// Size of the buffer.
    pub size: B16,
}

const_assert_eq!(size_of::<RecvListEntry>(), 8);

impl RecvListEntry {
    /// Creates a _receive list entry_.
    pub fn new_recv(buffer: *mut u8, size: usize) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_address_low(addr as u32)
            .with_address_high(((addr >> 32) & 0xFFFF) as u16)
            .with_size(size as u16)
    }

    /// Reconstructs the full address from the split fields.
    pub fn address(&self) -> usize {
        self.address_low() as usize | ((self.address_high() as usize) << 32)
    }
}

/// High-level metadata for constructing a request.
///
/// Describes the layout of an HIPC message without containing the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Message type (protocol-specific command type).
    pub message_type: MessageType,
    pub num_send_statics: usize,
    pub num_send_buffers: usize,
    pub num_recv_buffers: usize,
    pub num_exch_buffers: usize,
    pub num_data_words: usize,
    /// Receive static mode (`None` means no receive list).
    pub recv_static_mode: Option<RecvStaticMode>,
    /// Whether to send the process ID.
    pub send_pid: bool,
    pub num_copy_handles: usize,
    pub num_move_handles: usize,
}

impl Metadata {
    /// Returns whether this metadata requires a special header.
    ///
    /// A special header is needed when sending a PID or any handles.
    #[inline]
    pub const fn has_special_header(&self) -> bool {
        self.send_pid || self.num_copy_handles > 0 || self.num_move_handles > 0
    }
}

/// Message type for HIPC requests.
///
/// Newtype around the raw 16-bit message type field. Protocol-specific
/// command types implement `From` to convert to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct MessageType(u16);

impl MessageType {
    /// Creates a message type from a raw value.
    #[inline]
    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    /// Returns the raw u16 value.
    #[inline]
    pub const fn to_raw(self) -> u16 {
        self.0
    }
}

/// Controls how the receive list (Type C descriptors) is handled in the message.
///
/// Use `Option<RecvStaticMode>` where `None` means no receive list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStaticMode {
    /// Auto-calculate count from send statics (mode 2).
    Auto,
    /// Explicit count of receive list entries (mode 2+n, where n >= 1).
    Explicit(u8),
}

impl RecvStaticMode {
    /// Parses the _receive static_ mode from the raw header value.
    ///
    /// Returns `None` for mode 0/1 (no receive list).
    #[inline]
    pub const fn from_raw(mode: u8) -> Option<Self> {
        match mode {
            0 | 1 => None,
            2 => Some(Self::Auto),
            n => Some(Self::Explicit(n - 2)),
        }
    }

    /// Returns the raw header value (`2` or `2 + n`).
    #[inline]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Auto => 2,
            Self::Explicit(n) => 2 + n,
        }
    }

    /// Returns the number of receive list entries in the message.
    ///
    /// `Auto` lists occupy a single entry.
    #[inline]
    pub const fn as_count(self) -> usize {
        match self {
            Self::Auto => 1,
            Self::Explicit(n) => n as usize,
        }
    }
}

/// A parsed HIPC response from the server.
#[derive(Debug)]
pub struct Response<'a> {
    /// Process ID from the response (or [`RESPONSE_NO_PID`]).
    pub pid: u64,
    meta: Metadata,
    layout: Layout,
    msg: &'a MessageBuffer,
}

impl<'a> Response<'a> {
    /// Byte offset of the first data word.
    pub fn data_offset(&self) -> usize {
        self.layout.data_words
    }

    /// Number of data words in the response.
    pub fn num_data_words(&self) -> usize {
        self.meta.num_data_words
    }

    /// The whole message buffer the response was parsed from.
    pub fn message(&self) -> &'a MessageBuffer {
        self.msg
    }

    /// Returns the `index`-th copy handle, if present.
    pub fn copy_handle(&self, index: usize) -> Option<RawHandle> {
        (index < self.meta.num_copy_handles)
            .then(|| self.msg.read_u32(self.layout.copy_handles + index * 4))
    }

    /// Returns the `index`-th move handle, if present.
    pub fn move_handle(&self, index: usize) -> Option<RawHandle> {
        (index < self.meta.num_move_handles)
            .then(|| self.msg.read_u32(self.layout.move_handles + index * 4))
    }

    /// Number of copy handles in the response.
    pub fn num_copy_handles(&self) -> usize {
        self.meta.num_copy_handles
    }

    /// Number of move handles in the response.
    pub fn num_move_handles(&self) -> usize {
        self.meta.num_move_handles
    }
}

/// A parsed incoming HIPC request (server side).
#[derive(Debug)]
pub struct ParsedRequest<'a> {
    /// Request metadata.
    pub meta: Metadata,
    /// Section offsets.
    pub layout: Layout,
    /// Process ID of the sender (`0` if not sent).
    pub pid: u64,
    msg: &'a MessageBuffer,
}

impl ParsedRequest<'_> {
    /// Returns the `index`-th send static descriptor.
    pub fn send_static(&self, index: usize) -> Option<StaticDescriptor> {
        (index < self.meta.num_send_statics).then(|| {
            StaticDescriptor::from_bytes(
                self.msg.read_array::<8>(self.layout.send_statics + index * 8),
            )
        })
    }

    /// Returns the `index`-th send (type A) buffer descriptor.
    pub fn send_buffer(&self, index: usize) -> Option<BufferDescriptor> {
        (index < self.meta.num_send_buffers).then(|| {
            BufferDescriptor::from_bytes(
                self.msg.read_array::<12>(self.layout.send_buffers + index * 12),
            )
        })
    }

    /// Returns the `index`-th receive (type B) buffer descriptor.
    pub fn recv_buffer(&self, index: usize) -> Option<BufferDescriptor> {
        (index < self.meta.num_recv_buffers).then(|| {
            BufferDescriptor::from_bytes(
                self.msg.read_array::<12>(self.layout.recv_buffers + index * 12),
            )
        })
    }

    /// Returns the `index`-th receive list entry.
    pub fn recv_list_entry(&self, index: usize) -> Option<RecvListEntry> {
        let count = self.meta.recv_static_mode.map_or(0, RecvStaticMode::as_count);
        (index < count).then(|| {
            RecvListEntry::from_bytes(self.msg.read_array::<8>(self.layout.recv_list + index * 8))
        })
    }

    /// Returns the `index`-th copy handle.
    pub fn copy_handle(&self, index: usize) -> Option<RawHandle> {
        (index < self.meta.num_copy_handles)
            .then(|| self.msg.read_u32(self.layout.copy_handles + index * 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_orders_sections() {
        let meta = Metadata {
            message_type: MessageType::from_raw(4),
            num_send_statics: 2,
            num_recv_buffers: 1,
            num_data_words: 8,
            recv_static_mode: Some(RecvStaticMode::Explicit(1)),
            send_pid: true,
            num_copy_handles: 1,
            ..Default::default()
        };
        let layout = calc_layout(&meta).expect("fits");

        assert_eq!(layout.pid, Some(0x0C));
        assert_eq!(layout.copy_handles, 0x14);
        assert_eq!(layout.send_statics, 0x18);
        assert_eq!(layout.recv_buffers, 0x28);
        assert_eq!(layout.data_words, 0x34);
        assert_eq!(layout.recv_list, 0x54);
        assert_eq!(layout.end, 0x5C);
    }

    #[test]
    fn test_make_request_writes_header_bits() {
        let mut msg = MessageBuffer::new();
        let meta = Metadata {
            message_type: MessageType::from_raw(4),
            num_send_statics: 1,
            num_data_words: 9,
            recv_static_mode: Some(RecvStaticMode::Explicit(1)),
            ..Default::default()
        };
        make_request(&mut msg, meta).expect("fits");

        let header = Header::from_bytes(msg.read_array::<8>(0));
        assert_eq!(header.message_type(), 4);
        assert_eq!(header.num_send_statics(), 1);
        assert_eq!(header.num_data_words(), 9);
        assert_eq!(header.recv_static_mode(), 3);
        assert!(!header.has_special_header());
    }

    #[test]
    fn test_make_request_rejects_oversized_message() {
        let mut msg = MessageBuffer::new();
        let meta = Metadata {
            num_data_words: 0x3F0,
            ..Default::default()
        };
        assert!(make_request(&mut msg, meta).is_err());
    }

    #[test]
    fn test_descriptor_address_split() {
        let addr = 0x0000_0123_4567_89A0usize as *const u8;
        let desc = StaticDescriptor::new_send(addr, 0x100, 2);
        assert_eq!(desc.address(), 0x0000_0123_4567_89A0);
        assert_eq!(desc.size(), 0x100);
        assert_eq!(desc.index(), 2);

        let buf = BufferDescriptor::new_buffer(addr, 0x1_0000_0010, BufferMode::NonSecure);
        assert_eq!(buf.address(), 0x0000_0123_4567_89A0);
        assert_eq!(buf.size(), 0x1_0000_0010);
        assert_eq!(buf.mode(), BufferMode::NonSecure);
    }

    #[test]
    fn test_parse_response_reads_copy_handle() {
        let mut msg = MessageBuffer::new();
        let meta = Metadata {
            num_data_words: 8,
            num_copy_handles: 1,
            ..Default::default()
        };
        let layout = make_request(&mut msg, meta).expect("fits");
        msg.write_u32(layout.copy_handles, 0xABCD);

        let resp = parse_response(&msg).expect("well formed");
        assert_eq!(resp.copy_handle(0), Some(0xABCD));
        assert_eq!(resp.copy_handle(1), None);
        assert_eq!(resp.data_offset(), 0x10);
        assert_eq!(resp.pid, RESPONSE_NO_PID);
    }
}
