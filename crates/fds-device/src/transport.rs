//! ---
//! fds_section: "03-device-runtime"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Transport and provisioning interface boundary."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
//! Interface boundary to the external transport/provisioning service.
//!
//! The core treats connectivity purely as these traits; the wire protocol is
//! owned by the collaborator behind them.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

/// Remote command name toggling a pump's motor power.
pub const TOGGLE_POWER_COMMAND: &str = "ToggleMotorPower";

/// Errors surfaced by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Provisioning rejected or could not reach the registration endpoint.
    #[error("registration rejected for {device_id}: {reason}")]
    RegistrationRejected { device_id: String, reason: String },
    /// An operation was attempted against a device with no live connection.
    #[error("device {device_id} is not connected")]
    NotConnected { device_id: String },
    /// A telemetry or property send was rejected mid-flight.
    #[error("send failed for {device_id}: {reason}")]
    SendFailed { device_id: String, reason: String },
    /// A command was delivered for which no handler is registered.
    #[error("no handler registered for command {command} on {device_id}")]
    NoHandler { device_id: String, command: String },
}

/// Parameters for provisioning one device.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub device_id: String,
    pub device_key: String,
    pub id_scope: String,
    pub endpoint: String,
}

/// A remote command delivered asynchronously by the transport.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub payload: Value,
}

/// Acknowledgment returned by a command handler.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub status: u16,
    pub payload: Value,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            status: 200,
            payload: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Handler invoked by the transport when a remote command arrives.
pub type CommandHandler =
    Arc<dyn Fn(CommandRequest) -> BoxFuture<'static, CommandResponse> + Send + Sync>;

/// Device provisioning: registration plus connection establishment.
#[async_trait]
pub trait ProvisioningTransport: Send + Sync {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<Arc<dyn DeviceConnection>, TransportError>;
}

/// A live device connection handle.
#[async_trait]
pub trait DeviceConnection: Send + Sync {
    /// Send one telemetry-shaped event payload.
    async fn send_event(&self, payload: Value) -> Result<(), TransportError>;

    /// Publish the device's reported properties.
    async fn update_reported_properties(&self, properties: Value) -> Result<(), TransportError>;

    /// Install the handler invoked when `command` arrives from the cloud.
    fn set_command_handler(&self, command: &str, handler: CommandHandler);
}
