//! ---
//! fds_section: "03-device-runtime"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Pump device lifecycle, send loop, and power toggling."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fds_telemetry::PumpTelemetryRecord;
use futures::FutureExt;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::transport::{
    CommandRequest, CommandResponse, DeviceConnection, ProvisioningTransport, RegistrationRequest,
    TransportError, TOGGLE_POWER_COMMAND,
};

/// Every Nth successful send is reported as a progress milestone.
const PROGRESS_MILESTONE: u64 = 50;

/// Pump motor power state, tracked orthogonally to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PumpPowerState {
    On,
    Off,
}

impl fmt::Display for PumpPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpPowerState::On => write!(f, "ON"),
            PumpPowerState::Off => write!(f, "OFF"),
        }
    }
}

/// State-change message emitted to the orchestrator after an effective power
/// toggle.
#[derive(Debug, Clone)]
pub struct PowerStateChanged {
    pub device_id: String,
    pub power_state: PumpPowerState,
}

/// Geolocation reported with the device properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Static description of one simulated pump.
#[derive(Debug, Clone)]
pub struct PumpDeviceSpec {
    pub device_number: u32,
    pub device_key: String,
    pub serial_number: String,
    pub ip_address: String,
    pub location: Location,
    pub telemetry: Vec<PumpTelemetryRecord>,
}

/// One simulated pump device.
///
/// Cloning is cheap and shares the underlying device state; the orchestrator
/// keeps one clone per spawned run task.
#[derive(Clone)]
pub struct PumpDevice {
    inner: Arc<DeviceShared>,
}

struct DeviceShared {
    device_id: String,
    device_key: String,
    id_scope: String,
    dps_endpoint: String,
    serial_number: String,
    ip_address: String,
    location: Location,
    telemetry: Vec<PumpTelemetryRecord>,
    cycle_interval: Duration,
    power_state: Mutex<PumpPowerState>,
    messages_sent: AtomicU64,
    /// Next telemetry index to send; restarts resume here.
    cursor: AtomicUsize,
    /// Current run's cancellation scope; replaced with a fresh scope on
    /// power-off so a later restart gets an unsignalled one.
    run_cancel: Mutex<watch::Sender<bool>>,
    connection: OnceCell<Arc<dyn DeviceConnection>>,
    power_events: mpsc::UnboundedSender<PowerStateChanged>,
}

impl PumpDevice {
    pub fn new(
        spec: PumpDeviceSpec,
        id_scope: impl Into<String>,
        dps_endpoint: impl Into<String>,
        cycle_interval: Duration,
        power_events: mpsc::UnboundedSender<PowerStateChanged>,
    ) -> Self {
        let (run_cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(DeviceShared {
                device_id: format!("DEVICE{:03}", spec.device_number),
                device_key: spec.device_key,
                id_scope: id_scope.into(),
                dps_endpoint: dps_endpoint.into(),
                serial_number: spec.serial_number,
                ip_address: spec.ip_address,
                location: spec.location,
                telemetry: spec.telemetry,
                cycle_interval,
                power_state: Mutex::new(PumpPowerState::Off),
                messages_sent: AtomicU64::new(0),
                cursor: AtomicUsize::new(0),
                run_cancel: Mutex::new(run_cancel),
                connection: OnceCell::new(),
                power_events,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn power_state(&self) -> PumpPowerState {
        *self.inner.power_state.lock()
    }

    pub fn messages_sent(&self) -> u64 {
        self.inner.messages_sent.load(Ordering::SeqCst)
    }

    /// Index of the next record the run loop will send.
    pub fn position(&self) -> usize {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    /// Register with the provisioning service, connect, install the power
    /// toggle command handler, and report the device properties plus the
    /// initial power state.
    ///
    /// Registration failure is returned to the caller; failures while
    /// reporting properties are logged per-device and do not abort.
    pub async fn register_and_connect(
        &self,
        transport: &dyn ProvisioningTransport,
    ) -> Result<(), TransportError> {
        let request = RegistrationRequest {
            device_id: self.inner.device_id.clone(),
            device_key: self.inner.device_key.clone(),
            id_scope: self.inner.id_scope.clone(),
            endpoint: self.inner.dps_endpoint.clone(),
        };
        let connection = transport.register(request).await?;

        let shared = self.inner.clone();
        connection.set_command_handler(
            TOGGLE_POWER_COMMAND,
            Arc::new(move |request: CommandRequest| {
                let shared = shared.clone();
                async move { shared.handle_toggle_power(request).await }.boxed()
            }),
        );
        let _ = self.inner.connection.set(connection);

        *self.inner.power_state.lock() = PumpPowerState::On;
        self.inner.report_properties_and_initial_state().await;
        Ok(())
    }

    /// Consume the telemetry sequence in order, one record per cycle
    /// interval, until the sequence is exhausted or the current cancellation
    /// scope unwinds the loop.
    ///
    /// A signalled scope suppresses sending for the current tick; the cycle
    /// delay itself also observes cancellation, so the loop exits within one
    /// interval of the signal.
    pub async fn run(&self) {
        let inner = &self.inner;
        let mut cancel_rx = inner.run_cancel.lock().subscribe();
        debug!(device = %inner.device_id, position = inner.cursor.load(Ordering::SeqCst), "run loop started");

        loop {
            let index = inner.cursor.load(Ordering::SeqCst);
            let Some(record) = inner.telemetry.get(index) else {
                info!(device = %inner.device_id, "telemetry sequence exhausted");
                return;
            };

            if !*cancel_rx.borrow() {
                match inner.send_event(json!(record)).await {
                    Ok(_) => {
                        inner.cursor.store(index + 1, Ordering::SeqCst);
                    }
                    Err(err) => {
                        error!(device = %inner.device_id, error = %err, "telemetry send failed; ending run");
                        return;
                    }
                }
            }

            tokio::select! {
                _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                    info!(device = %inner.device_id, position = inner.cursor.load(Ordering::SeqCst), "run cancelled");
                    return;
                }
                _ = time::sleep(inner.cycle_interval) => {}
            }
        }
    }

    /// Signal the device's current cancellation scope. Idempotent, callable
    /// at any time.
    pub fn cancel_current_run(&self) {
        let _ = self.inner.run_cancel.lock().send_replace(true);
    }
}

impl DeviceShared {
    fn connection(&self) -> Result<&Arc<dyn DeviceConnection>, TransportError> {
        self.connection
            .get()
            .ok_or_else(|| TransportError::NotConnected {
                device_id: self.device_id.clone(),
            })
    }

    async fn report_properties_and_initial_state(&self) {
        info!(device = %self.device_id, "sending device properties");
        let properties = json!({
            "SerialNumber": self.serial_number,
            "IPAddress": self.ip_address,
            "Location": self.location,
        });
        let result = async {
            self.connection()?
                .update_reported_properties(properties)
                .await?;
            let state = *self.power_state.lock();
            self.send_event(json!({ "PowerState": state })).await
        }
        .await;
        if let Err(err) = result {
            warn!(device = %self.device_id, error = %err, "error sending device properties");
        }
    }

    async fn send_event(&self, payload: Value) -> Result<u64, TransportError> {
        self.connection()?.send_event(payload).await?;
        let count = self.messages_sent.fetch_add(1, Ordering::SeqCst) + 1;
        if count % PROGRESS_MILESTONE == 0 {
            info!(device = %self.device_id, count, "message milestone");
        }
        Ok(count)
    }

    async fn handle_toggle_power(self: Arc<Self>, request: CommandRequest) -> CommandResponse {
        let desired = if request.payload.as_bool().unwrap_or(false) {
            PumpPowerState::On
        } else {
            PumpPowerState::Off
        };

        let applied = {
            let mut power = self.power_state.lock();
            if *power == desired {
                None
            } else {
                if *power == PumpPowerState::On {
                    // Turning off: cancel the current run and arm a fresh
                    // scope for a possible future restart.
                    let (fresh, _) = watch::channel(false);
                    let previous = std::mem::replace(&mut *self.run_cancel.lock(), fresh);
                    let _ = previous.send_replace(true);
                    *power = PumpPowerState::Off;
                } else {
                    *power = PumpPowerState::On;
                }
                Some(*power)
            }
        };

        match applied {
            None => {
                info!(device = %self.device_id, state = %desired, "toggle power command: already in desired state");
            }
            Some(state) => {
                let _ = self.power_events.send(PowerStateChanged {
                    device_id: self.device_id.clone(),
                    power_state: state,
                });
                if let Err(err) = self.send_event(json!({ "PowerState": state })).await {
                    warn!(device = %self.device_id, error = %err, "failed to publish power state event");
                }
                info!(device = %self.device_id, state = %state, "toggle power command applied");
            }
        }
        CommandResponse::ok()
    }
}
