//! ---
//! fds_section: "03-device-runtime"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "In-memory loopback transport for tests and local runs."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::transport::{
    CommandHandler, CommandRequest, CommandResponse, DeviceConnection, ProvisioningTransport,
    RegistrationRequest, TransportError,
};

/// In-memory transport hub. Registered connections record every event and
/// reported-property payload, and remote commands can be injected and routed
/// to the handler the device installed.
#[derive(Default)]
pub struct LoopbackTransport {
    connections: Mutex<HashMap<String, Arc<LoopbackConnection>>>,
    denied: Mutex<HashSet<String>>,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make future registrations for `device_id` fail.
    pub fn deny_registration(&self, device_id: &str) {
        self.denied.lock().insert(device_id.to_owned());
    }

    /// Access the connection state for a registered device.
    pub fn connection(&self, device_id: &str) -> Option<Arc<LoopbackConnection>> {
        self.connections.lock().get(device_id).cloned()
    }

    /// Deliver a remote command to the handler the device registered,
    /// mirroring an asynchronous cloud-to-device method invocation.
    pub async fn invoke_command(
        &self,
        device_id: &str,
        command: &str,
        payload: Value,
    ) -> Result<CommandResponse, TransportError> {
        let connection =
            self.connection(device_id)
                .ok_or_else(|| TransportError::NotConnected {
                    device_id: device_id.to_owned(),
                })?;
        let handler =
            connection
                .handler(command)
                .ok_or_else(|| TransportError::NoHandler {
                    device_id: device_id.to_owned(),
                    command: command.to_owned(),
                })?;
        let request = CommandRequest {
            name: command.to_owned(),
            payload,
        };
        Ok(handler(request).await)
    }
}

#[async_trait]
impl ProvisioningTransport for LoopbackTransport {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<Arc<dyn DeviceConnection>, TransportError> {
        if self.denied.lock().contains(&request.device_id) {
            return Err(TransportError::RegistrationRejected {
                device_id: request.device_id,
                reason: "registration denied by loopback policy".to_owned(),
            });
        }
        debug!(device = %request.device_id, id_scope = %request.id_scope, endpoint = %request.endpoint, "loopback registration");
        let connection = Arc::new(LoopbackConnection::new(request.device_id.clone()));
        self.connections
            .lock()
            .insert(request.device_id, connection.clone());
        Ok(connection)
    }
}

/// Connection state captured by the loopback hub.
pub struct LoopbackConnection {
    device_id: String,
    events: Mutex<Vec<Value>>,
    reported_properties: Mutex<Vec<Value>>,
    handlers: Mutex<HashMap<String, CommandHandler>>,
    fail_sends: AtomicBool,
}

impl LoopbackConnection {
    fn new(device_id: String) -> Self {
        Self {
            device_id,
            events: Mutex::new(Vec::new()),
            reported_properties: Mutex::new(Vec::new()),
            handlers: Mutex::new(HashMap::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// All event payloads sent over this connection, in send order.
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().clone()
    }

    /// All reported-property payloads published over this connection.
    pub fn reported_properties(&self) -> Vec<Value> {
        self.reported_properties.lock().clone()
    }

    /// Force subsequent sends to fail, for exercising mid-run send errors.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn handler(&self, command: &str) -> Option<CommandHandler> {
        self.handlers.lock().get(command).cloned()
    }
}

#[async_trait]
impl DeviceConnection for LoopbackConnection {
    async fn send_event(&self, payload: Value) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                device_id: self.device_id.clone(),
                reason: "loopback send failure injected".to_owned(),
            });
        }
        self.events.lock().push(payload);
        Ok(())
    }

    async fn update_reported_properties(&self, properties: Value) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                device_id: self.device_id.clone(),
                reason: "loopback send failure injected".to_owned(),
            });
        }
        self.reported_properties.lock().push(properties);
        Ok(())
    }

    fn set_command_handler(&self, command: &str, handler: CommandHandler) {
        self.handlers.lock().insert(command.to_owned(), handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    fn request(device_id: &str) -> RegistrationRequest {
        RegistrationRequest {
            device_id: device_id.to_owned(),
            device_key: "key".to_owned(),
            id_scope: "scope".to_owned(),
            endpoint: "loopback".to_owned(),
        }
    }

    #[tokio::test]
    async fn denied_device_cannot_register() {
        let hub = LoopbackTransport::new();
        hub.deny_registration("DEVICE009");
        let err = hub.register(request("DEVICE009")).await.err().expect("denied");
        assert!(matches!(err, TransportError::RegistrationRejected { .. }));
    }

    #[tokio::test]
    async fn commands_route_to_registered_handler() {
        let hub = LoopbackTransport::new();
        let connection = hub.register(request("DEVICE001")).await.unwrap();
        connection.set_command_handler(
            "Echo",
            Arc::new(|request: CommandRequest| {
                async move {
                    CommandResponse {
                        status: 200,
                        payload: request.payload,
                    }
                }
                .boxed()
            }),
        );
        let response = hub
            .invoke_command("DEVICE001", "Echo", json!(true))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.payload, json!(true));
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let hub = LoopbackTransport::new();
        hub.register(request("DEVICE001")).await.unwrap();
        let err = hub
            .invoke_command("DEVICE001", "Nope", Value::Null)
            .await
            .expect_err("no handler");
        assert!(matches!(err, TransportError::NoHandler { .. }));
    }

    #[tokio::test]
    async fn injected_send_failure_propagates() {
        let hub = LoopbackTransport::new();
        let connection = hub.register(request("DEVICE001")).await.unwrap();
        let state = hub.connection("DEVICE001").unwrap();
        state.set_fail_sends(true);
        let err = connection.send_event(json!({"x": 1})).await.expect_err("fails");
        assert!(matches!(err, TransportError::SendFailed { .. }));
        state.set_fail_sends(false);
        connection.send_event(json!({"x": 2})).await.unwrap();
        assert_eq!(state.events().len(), 1);
    }
}
