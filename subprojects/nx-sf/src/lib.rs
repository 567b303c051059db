//! Service Framework (SF) for Nintendo Switch
//!
//! This crate implements the **Service Framework** - the IPC serialization layer
//! used by Horizon OS services. The name "SF" comes from the CMIF protocol's
//! magic headers: `"SFCI"` (Service Framework Command Input) and `"SFCO"`
//! (Service Framework Command Output).
//!
//! # Architecture
//!
//! The IPC stack on Horizon OS is layered:
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Service APIs (sm, pm, spl) │  Application layer
//! ├─────────────────────────────┤
//! │  CMIF                       │  Command serialization (SF layer)
//! ├─────────────────────────────┤
//! │  HIPC                       │  Message framing & descriptors
//! ├─────────────────────────────┤
//! │  Transport                  │  SendSyncRequest through TLS, or a mock
//! └─────────────────────────────┘
//! ```
//!
//! Messages are assembled in an owned [`MessageBuffer`] and handed to a
//! [`Transport`]. Sessions to named services are shared process-wide through
//! reference-counted [`ServiceSlot`]s, opened through a [`ServiceConnector`].
//!
//! # Protocols
//!
//! - **HIPC**: Low-level message format handling buffer descriptors, handles,
//!   and raw data layout. See the [`hipc`] module for details.
//! - **CMIF**: Command interface with `"SFCI"`/`"SFCO"` magic headers. See the
//!   [`cmif`] module for details.
//!
//! Command payloads are described by [`wire::Record`] tables, which can be
//! validated and encoded without touching a live session.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "mock", not(test)))]
extern crate std;

pub mod cmif;
pub mod hipc;
pub mod service;
pub mod transport;
pub mod wire;

mod hos_version;
mod message_buffer;
mod service_name;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use hos_version::HosVersion;
pub use message_buffer::MessageBuffer;
pub use service::{GetServiceError, ServiceConnector, ServiceSlot};
pub use service_name::ServiceName;
#[cfg(target_os = "horizon")]
pub use transport::KernelTransport;
pub use transport::{SessionHandle, Transport};
