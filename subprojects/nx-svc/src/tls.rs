//! Thread-local IPC buffer access.
//!
//! The first 0x100 bytes of every thread's 0x200-byte Thread-Local Storage
//! block are the IPC message buffer that `svcSendSyncRequest` reads the
//! request from and writes the reply to. The TLS base is held in the
//! read-only thread ID register `TPIDRRO_EL0`, initialized by the kernel.
//!
//! # References
//!
//! - [Switchbrew Wiki: Thread Local Region](https://switchbrew.org/wiki/Thread_Local_Region)
//! - [ARM TPIDRRO_EL0 Register](https://developer.arm.com/documentation/ddi0601/2024-12/AArch64-Registers/TPIDRRO-EL0--EL0-Read-Only-Software-Thread-ID-Register)

use core::arch::naked_asm;

/// Size of the IPC message buffer at the start of the TLS block.
pub const IPC_BUFFER_SIZE: usize = 0x100;

/// Read the `tpidrro_el0` system register.
///
/// # Safety
///
/// The body only moves `tpidrro_el0` into `x0` and returns, per the AArch64
/// procedure call standard.
#[unsafe(naked)]
unsafe extern "C" fn tpidrro_el0() -> usize {
    naked_asm!(
        "mrs x0, tpidrro_el0", // Move the value of `tpidrro_el0` into the return register `x0`
        "ret",
    );
}

/// Returns a pointer to the calling thread's IPC message buffer.
///
/// Obtaining the pointer is safe; dereferencing it is only valid for
/// [`IPC_BUFFER_SIZE`] bytes and only on the calling thread.
#[inline]
pub fn ipc_buffer_ptr() -> *mut u8 {
    // SAFETY: Reading TPIDRRO_EL0 has no side effects and is permitted in user mode.
    unsafe { tpidrro_el0() as *mut u8 }
}
