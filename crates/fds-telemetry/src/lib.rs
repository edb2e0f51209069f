//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Telemetry synthesis engines for simulated pump devices."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
//! Telemetry synthesis for the pump fleet simulator.
//!
//! The live device runtime and the offline training-data exporter both consume
//! [`synthesis::generate_pump_telemetry`], so simulated and exported datasets
//! share identical numeric semantics.

pub mod export;
pub mod profiles;
pub mod record;
pub mod synthesis;
pub mod waveform;

pub use export::{write_training_data, TrainingScenario};
pub use profiles::{ChannelProfile, PumpStateProfile, FAILED_STATE, NORMAL_STATE, SAMPLING_RATE};
pub use record::PumpTelemetryRecord;
pub use synthesis::{generate_pump_telemetry, PumpChannels};
pub use waveform::periodic;
