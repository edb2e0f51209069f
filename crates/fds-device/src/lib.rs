//! ---
//! fds_section: "03-device-runtime"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Device simulation runtime and transport boundary."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
//! Simulated pump device runtime.
//!
//! A [`device::PumpDevice`] owns one pump's identity, power state, telemetry
//! sequence, and per-run cancellation scope. Cloud connectivity is reduced to
//! the [`transport`] traits; [`loopback`] provides the in-memory
//! implementation used by tests and local runs.

pub mod device;
pub mod loopback;
pub mod transport;

pub use device::{
    Location, PowerStateChanged, PumpDevice, PumpDeviceSpec, PumpPowerState,
};
pub use loopback::LoopbackTransport;
pub use transport::{
    CommandHandler, CommandRequest, CommandResponse, DeviceConnection, ProvisioningTransport,
    RegistrationRequest, TransportError, TOGGLE_POWER_COMMAND,
};
