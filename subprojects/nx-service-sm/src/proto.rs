//! SM protocol constants.

use core::ffi::CStr;

use nx_sf::wire::{Field, Record};

/// SM named port.
pub const SM_PORT_NAME: &CStr = c"sm:";

/// Register client (sends PID).
pub const REGISTER_CLIENT: u32 = 0;

/// Get service handle by name.
pub const GET_SERVICE_HANDLE: u32 = 1;

/// `RegisterClient` input: the PID travels in the special header, the
/// payload only reserves the slot.
pub const REGISTER_CLIENT_IN: Record =
    Record::new("RegisterClientIn", 8, &[Field::u64("reserved", 0)]);

/// `GetServiceHandle` input: the service name packed into a `u64`.
pub const GET_SERVICE_HANDLE_IN: Record =
    Record::new("GetServiceHandleIn", 8, &[Field::u64("name", 0)]);

/// Every record this crate puts on the wire.
pub const ALL_RECORDS: &[Record] = &[REGISTER_CLIENT_IN, GET_SERVICE_HANDLE_IN];
