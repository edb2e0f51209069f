//! ---
//! fds_section: "04-fleet-orchestration"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Fleet orchestration kernel coordinating simulated pump devices."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Fleet orchestration for the pump device simulator.
//!
//! The orchestrator owns the set of simulated devices, launches one run task
//! per device, and keeps the [`RunTaskTable`] aligned with the devices that
//! are still meant to be sending. Power-state changes arrive as explicit
//! messages on an internal channel rather than callbacks, and the wait loop
//! always re-reads the live table after each round instead of holding a
//! stale snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fds_device::{
    PowerStateChanged, ProvisioningTransport, PumpDevice, PumpDeviceSpec, PumpPowerState,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration describing the fleet to launch.
#[derive(Debug, Clone)]
pub struct FleetSpec {
    /// Provisioning scope shared by every device.
    pub id_scope: String,
    /// Provisioning endpoint shared by every device.
    pub dps_endpoint: String,
    /// Delay between successive telemetry sends for one device.
    pub cycle_interval: Duration,
    /// Per-device specifications, telemetry sequences included.
    pub devices: Vec<PumpDeviceSpec>,
}

/// Mapping of device identifier to its currently active send-loop task.
///
/// All mutation is serialized behind one mutex; at most one entry exists per
/// device identifier, and a restart replaces the entry rather than
/// duplicating it.
#[derive(Debug, Default)]
pub struct RunTaskTable {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RunTaskTable {
    /// Record the first task for a device.
    fn insert(&self, device_id: String, handle: JoinHandle<()>) {
        debug!(device = %device_id, "run task registered");
        self.put(device_id, handle);
    }

    /// Replace a device's entry after a restart.
    fn replace(&self, device_id: String, handle: JoinHandle<()>) {
        debug!(device = %device_id, "run task replaced");
        self.put(device_id, handle);
    }

    fn put(&self, device_id: String, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.lock().insert(device_id.clone(), handle) {
            if !previous.is_finished() {
                warn!(device = %device_id, "previous run task still active; aborting it");
                previous.abort();
            }
        }
    }

    /// Remove and return a device's entry.
    pub fn remove(&self, device_id: &str) -> Option<JoinHandle<()>> {
        self.tasks.lock().remove(device_id)
    }

    /// Take ownership of every current entry, emptying the table.
    fn drain(&self) -> Vec<(String, JoinHandle<()>)> {
        self.tasks.lock().drain().collect()
    }

    /// Number of tracked tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the table holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

/// Orchestrates a fleet of simulated pump devices.
pub struct FleetOrchestrator {
    devices: Vec<PumpDevice>,
    tasks: RunTaskTable,
    events: Mutex<Option<mpsc::UnboundedReceiver<PowerStateChanged>>>,
    cancelled: AtomicBool,
}

impl FleetOrchestrator {
    /// Construct every device, register each with the transport sequentially,
    /// and launch one run task per successfully registered device.
    ///
    /// A registration failure is logged with the device identity and skips
    /// that device; it does not abort the rest of the fleet.
    pub async fn start(spec: FleetSpec, transport: Arc<dyn ProvisioningTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tasks = RunTaskTable::default();
        let mut devices = Vec::with_capacity(spec.devices.len());

        for device_spec in spec.devices {
            let device = PumpDevice::new(
                device_spec,
                spec.id_scope.clone(),
                spec.dps_endpoint.clone(),
                spec.cycle_interval,
                events_tx.clone(),
            );
            match device.register_and_connect(transport.as_ref()).await {
                Ok(()) => {
                    let runner = device.clone();
                    let handle = tokio::spawn(async move { runner.run().await });
                    tasks.insert(device.device_id().to_owned(), handle);
                }
                Err(err) => {
                    error!(device = %device.device_id(), error = %err, "registration failed; device will not run");
                }
            }
            devices.push(device);
        }

        info!(devices = devices.len(), running = tasks.len(), "fleet started");
        Self {
            devices,
            tasks,
            events: Mutex::new(Some(events_rx)),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Devices owned by the orchestrator, registered or not.
    pub fn devices(&self) -> &[PumpDevice] {
        &self.devices
    }

    /// The live run task table.
    pub fn tasks(&self) -> &RunTaskTable {
        &self.tasks
    }

    /// Sum of sent-message counters across the fleet.
    pub fn total_messages_sent(&self) -> u64 {
        self.devices.iter().map(PumpDevice::messages_sent).sum()
    }

    /// Wait until every device's run task has genuinely completed.
    ///
    /// Each round takes a fresh snapshot of the table and joins it while
    /// concurrently consuming power-state messages; a device commanded back
    /// on gets a fresh task recorded mid-round, which the next round picks
    /// up. The loop only ends when a freshly drained snapshot is empty and no
    /// restart message is pending.
    pub async fn await_completion(&self) {
        let mut events = self.events.lock().take();
        loop {
            if let Some(rx) = events.as_mut() {
                while let Ok(event) = rx.try_recv() {
                    self.apply_power_event(event);
                }
            }

            let batch = self.tasks.drain();
            if batch.is_empty() {
                // A restart racing the emptiness decision must not be
                // dropped; look at the channel once more before concluding.
                match events.as_mut().and_then(|rx| rx.try_recv().ok()) {
                    Some(event) => {
                        self.apply_power_event(event);
                        continue;
                    }
                    None => break,
                }
            }

            let joins =
                futures::future::join_all(batch.into_iter().map(|(device_id, handle)| async move {
                    if let Err(err) = handle.await {
                        warn!(device = %device_id, error = %err, "device task join error");
                    }
                }));
            tokio::pin!(joins);

            match events.as_mut() {
                Some(rx) => loop {
                    tokio::select! {
                        _ = &mut joins => break,
                        Some(event) = rx.recv() => self.apply_power_event(event),
                    }
                },
                None => {
                    joins.await;
                }
            }
        }
        debug!("no active device tasks remain");
        *self.events.lock() = events;
    }

    /// Signal every device's cancellation scope and mark the orchestrator
    /// terminal, so restart messages arriving afterwards are ignored and
    /// shutdown stays bounded.
    pub fn cancel_all(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!("cancelling all device runs");
        for device in &self.devices {
            device.cancel_current_run();
        }
    }

    fn apply_power_event(&self, event: PowerStateChanged) {
        match event.power_state {
            PumpPowerState::Off => {
                // The device's own cancellation already ended its task; the
                // entry drains out on the next round.
                debug!(device = %event.device_id, "device reported power off");
            }
            PumpPowerState::On => {
                if self.cancelled.load(Ordering::SeqCst) {
                    warn!(device = %event.device_id, "ignoring power-on after shutdown");
                    return;
                }
                let Some(device) = self
                    .devices
                    .iter()
                    .find(|device| device.device_id() == event.device_id)
                else {
                    warn!(device = %event.device_id, "power-on for unknown device");
                    return;
                };
                info!(device = %event.device_id, "restarting run loop after power on");
                let runner = device.clone();
                let handle = tokio::spawn(async move { runner.run().await });
                self.tasks.replace(event.device_id, handle);
            }
        }
    }
}
