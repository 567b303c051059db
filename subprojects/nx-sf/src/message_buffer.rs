//! The IPC message buffer.

/// A 0x100-byte, 16-byte aligned IPC message.
///
/// Mirrors the IPC region at the start of a thread's TLS block. Requests are
/// built here and replies parsed from here; the kernel transport copies it
/// in and out of the TLS region around each `svcSendSyncRequest`.
///
/// All accessors take byte offsets from the start of the message and are
/// little-endian.
#[derive(Clone)]
#[repr(C, align(16))]
pub struct MessageBuffer([u8; MessageBuffer::SIZE]);

impl MessageBuffer {
    /// Size of the IPC message region.
    pub const SIZE: usize = 0x100;

    /// Creates a zeroed message buffer.
    pub const fn new() -> Self {
        Self([0; Self::SIZE])
    }

    /// Zeroes the whole buffer.
    pub fn clear(&mut self) {
        self.0.fill(0);
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; Self::SIZE] {
        &mut self.0
    }

    /// Copies `bytes` into the buffer at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write would run past the end of the buffer.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Returns `len` bytes starting at `offset`, or `None` if out of range.
    pub fn get(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.0.get(offset..offset.checked_add(len)?)
    }

    /// Returns a mutable view of `len` bytes starting at `offset`, or `None` if out of range.
    pub fn get_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        self.0.get_mut(offset..offset.checked_add(len)?)
    }

    /// Reads a fixed-size array at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the read would run past the end of the buffer.
    pub fn read_array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.0[offset..offset + N]);
        out
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.read_array(offset))
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.read_array(offset))
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.write_bytes(offset, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.write_bytes(offset, &value.to_le_bytes());
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("header", &format_args!("{:02x?}", &self.0[..8]))
            .finish_non_exhaustive()
    }
}
