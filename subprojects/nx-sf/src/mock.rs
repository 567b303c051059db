//! Scripted IPC doubles for host-side tests.
//!
//! [`MockTransport`] plays the part of the kernel plus the remote service:
//! it records every request it is given, answers with a scripted [`Reply`]
//! (or a handler closure), writes reply statics into the request's receive
//! list and mapped receive buffers the way the kernel would, and frames a
//! valid HIPC/CMIF reply in the message buffer. [`MockConnector`] hands out
//! fresh session handles and records every open.
//!
//! The transport writes through the addresses found in receive descriptors,
//! exactly as the kernel does. Only feed it requests built by this
//! workspace's clients, whose buffers outlive the synchronous call.

use std::{boxed::Box, collections::VecDeque, sync::Mutex, vec::Vec};

use nx_svc::{ipc::SendSyncError, raw::Handle as RawHandle, result::ResultCode};

use crate::{
    MessageBuffer, ServiceName,
    cmif::{self, OUT_HEADER_MAGIC, OutHeader},
    hipc::{self, BufferDescriptor, RecvListEntry, StaticDescriptor},
    service::{GetServiceError, ServiceConnector},
    transport::{SessionHandle, Transport},
};

/// First handle value handed out by [`MockConnector`].
pub const FIRST_MOCK_HANDLE: RawHandle = 0x100;

/// A scripted service reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    result: ResultCode,
    data: Vec<u8>,
    copy_handles: Vec<RawHandle>,
    move_handles: Vec<RawHandle>,
    statics: Vec<(usize, Vec<u8>)>,
    buffers: Vec<(usize, Vec<u8>)>,
}

impl Reply {
    /// A successful reply with no payload.
    pub fn ok() -> Self {
        Self::default()
    }

    /// A reply carrying a non-zero service result.
    pub fn error(code: ResultCode) -> Self {
        Self {
            result: code,
            ..Self::default()
        }
    }

    /// Appends raw bytes to the reply payload.
    pub fn with_data(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn with_u32(self, value: u32) -> Self {
        self.with_data(&value.to_le_bytes())
    }

    pub fn with_u64(self, value: u64) -> Self {
        self.with_data(&value.to_le_bytes())
    }

    /// Adds a copy handle to the reply.
    pub fn with_copy_handle(mut self, handle: RawHandle) -> Self {
        self.copy_handles.push(handle);
        self
    }

    /// Adds a move handle to the reply.
    pub fn with_move_handle(mut self, handle: RawHandle) -> Self {
        self.move_handles.push(handle);
        self
    }

    /// Delivers `bytes` into the request's `index`-th receive list entry.
    pub fn with_static(mut self, index: usize, bytes: &[u8]) -> Self {
        self.statics.push((index, bytes.to_vec()));
        self
    }

    /// Writes `bytes` into the request's `index`-th mapped receive buffer.
    pub fn with_buffer(mut self, index: usize, bytes: &[u8]) -> Self {
        self.buffers.push((index, bytes.to_vec()));
        self
    }
}

/// A request as seen by the mock service.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub session: RawHandle,
    pub command_type: u16,
    pub command_id: u32,
    /// Payload following the CMIF header, up to the end of the data words.
    pub data: Vec<u8>,
    pub send_pid: bool,
    pub copy_handles: Vec<RawHandle>,
    pub send_statics: Vec<StaticDescriptor>,
    pub send_buffers: Vec<BufferDescriptor>,
    pub recv_buffers: Vec<BufferDescriptor>,
    pub recv_list: Vec<RecvListEntry>,
    /// The raw request message.
    pub message: MessageBuffer,
}

impl RecordedRequest {
    /// Reads a little-endian `u32` from the payload at `offset`.
    pub fn u32_at(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(raw)
    }

    /// Reads a little-endian `u64` from the payload at `offset`.
    pub fn u64_at(&self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_le_bytes(raw)
    }
}

type Handler = Box<dyn FnMut(&RecordedRequest) -> Result<Reply, SendSyncError> + Send>;

#[derive(Default)]
struct TransportState {
    replies: VecDeque<Result<Reply, SendSyncError>>,
    handler: Option<Handler>,
    requests: Vec<RecordedRequest>,
    closed: Vec<SessionHandle>,
}

/// A [`Transport`] answering from a script.
///
/// Queued replies are used first; once the queue is empty the handler (if
/// any) answers. A request with nothing to answer it panics.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that answers every request with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: FnMut(&RecordedRequest) -> Result<Reply, SendSyncError> + Send + 'static,
    {
        let transport = Self::new();
        transport.lock().handler = Some(Box::new(handler));
        transport
    }

    /// Queues a reply for the next request.
    pub fn push_reply(&self, reply: Reply) {
        self.lock().replies.push_back(Ok(reply));
    }

    /// Makes the next request fail at the kernel level.
    pub fn push_error(&self, err: SendSyncError) {
        self.lock().replies.push_back(Err(err));
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    /// Every session closed so far, oldest first.
    pub fn closed(&self) -> Vec<SessionHandle> {
        self.lock().closed.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl core::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("queued", &state.replies.len())
            .field("requests", &state.requests.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Transport for MockTransport {
    fn send_sync_request(
        &self,
        session: SessionHandle,
        msg: &mut MessageBuffer,
    ) -> Result<(), SendSyncError> {
        let request = record(session, msg);
        let mut state = self.lock();
        state.requests.push(request.clone());

        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => match state.handler.as_mut() {
                Some(handler) => handler(&request),
                None => panic!("no scripted reply for command {}", request.command_id),
            },
        };
        drop(state);

        let reply = reply?;
        deliver_statics(&request, &reply);
        write_reply(msg, &reply);
        Ok(())
    }

    fn close_session(&self, session: SessionHandle) {
        self.lock().closed.push(session);
    }
}

fn record(session: SessionHandle, msg: &MessageBuffer) -> RecordedRequest {
    let parsed = cmif::parse_request(msg).expect("malformed CMIF request");
    let hipc = &parsed.hipc;
    let meta = &hipc.meta;
    let recv_count = meta
        .recv_static_mode
        .map_or(0, hipc::RecvStaticMode::as_count);

    RecordedRequest {
        session: session.to_raw(),
        command_type: parsed.command_type,
        command_id: parsed.command_id,
        data: parsed.data.to_vec(),
        send_pid: meta.send_pid,
        copy_handles: (0..meta.num_copy_handles)
            .filter_map(|i| hipc.copy_handle(i))
            .collect(),
        send_statics: (0..meta.num_send_statics)
            .filter_map(|i| hipc.send_static(i))
            .collect(),
        send_buffers: (0..meta.num_send_buffers)
            .filter_map(|i| hipc.send_buffer(i))
            .collect(),
        recv_buffers: (0..meta.num_recv_buffers)
            .filter_map(|i| hipc.recv_buffer(i))
            .collect(),
        recv_list: (0..recv_count)
            .filter_map(|i| hipc.recv_list_entry(i))
            .collect(),
        message: msg.clone(),
    }
}

/// Copies reply statics and mapped-buffer contents into the client's memory.
fn deliver_statics(request: &RecordedRequest, reply: &Reply) {
    for (index, bytes) in &reply.statics {
        let entry = request.recv_list[*index];
        assert!(
            bytes.len() <= entry.size() as usize,
            "static of {} bytes overflows receive entry of {}",
            bytes.len(),
            entry.size()
        );
        // SAFETY: The entry was built by a client in this process from a live
        // `&mut [u8]` of at least `entry.size()` bytes that outlives the call.
        unsafe { write_to_address(entry.address(), bytes) };
    }

    for (index, bytes) in &reply.buffers {
        let desc = request.recv_buffers[*index];
        assert!(
            bytes.len() <= desc.size(),
            "buffer write of {} bytes overflows mapping of {}",
            bytes.len(),
            desc.size()
        );
        // SAFETY: As above, for a mapped receive buffer.
        unsafe { write_to_address(desc.address(), bytes) };
    }
}

/// # Safety
///
/// `address` must be valid for writes of `bytes.len()` bytes.
unsafe fn write_to_address(address: usize, bytes: &[u8]) {
    // SAFETY: Upheld by the caller.
    unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len()) };
}

/// Frames `reply` as an HIPC/CMIF response in `msg`.
pub fn write_reply(msg: &mut MessageBuffer, reply: &Reply) {
    let meta = hipc::Metadata {
        num_data_words: (16 + size_of::<OutHeader>() + reply.data.len()).div_ceil(4),
        num_copy_handles: reply.copy_handles.len(),
        num_move_handles: reply.move_handles.len(),
        ..Default::default()
    };
    let layout = hipc::make_request(msg, meta).expect("reply fits in the IPC buffer");

    for (i, handle) in reply.copy_handles.iter().enumerate() {
        msg.write_u32(layout.copy_handles + i * 4, *handle);
    }
    for (i, handle) in reply.move_handles.iter().enumerate() {
        msg.write_u32(layout.move_handles + i * 4, *handle);
    }

    let start = cmif::aligned_data_start(layout.data_words);
    OutHeader {
        magic: OUT_HEADER_MAGIC,
        version: 0,
        result: reply.result,
        token: 0,
    }
    .write_to(msg, start);
    msg.write_bytes(start + size_of::<OutHeader>(), &reply.data);
}

#[derive(Debug)]
struct ConnectorState {
    next_handle: RawHandle,
    opened: Vec<(ServiceName, RawHandle)>,
    failures: Vec<(ServiceName, ResultCode)>,
}

/// A [`ServiceConnector`] handing out sequential session handles.
#[derive(Debug)]
pub struct MockConnector {
    state: Mutex<ConnectorState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectorState {
                next_handle: FIRST_MOCK_HANDLE,
                opened: Vec::new(),
                failures: Vec::new(),
            }),
        }
    }

    /// Makes every lookup of `name` fail with `code`.
    pub fn fail(&self, name: ServiceName, code: ResultCode) {
        self.lock().failures.push((name, code));
    }

    /// Every service opened so far, oldest first.
    pub fn opened(&self) -> Vec<ServiceName> {
        self.lock().opened.iter().map(|(name, _)| *name).collect()
    }

    /// The handle most recently handed out for `name`.
    pub fn handle_of(&self, name: ServiceName) -> Option<RawHandle> {
        self.lock()
            .opened
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, handle)| *handle)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceConnector for MockConnector {
    fn get_service_handle(&self, name: ServiceName) -> Result<SessionHandle, GetServiceError> {
        let mut state = self.lock();
        if let Some((_, code)) = state.failures.iter().find(|(n, _)| *n == name) {
            return Err(GetServiceError::Service(*code));
        }

        let raw = state.next_handle;
        state.next_handle += 1;
        state.opened.push((name, raw));
        // SAFETY: Mock handles are never given to the kernel.
        Ok(unsafe { SessionHandle::from_raw(raw) })
    }
}
