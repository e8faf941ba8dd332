//! In-memory simulated robot.
//!
//! Useful for development and tests: no hardware, configurable latency,
//! scripted connect failures and injectable capability faults.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use vector_core::{BatteryState, Device, DeviceError, DeviceFactory, DeviceIdentity};

/// A call observed by the simulator, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Connect,
    Disconnect,
    DriveOffCharger,
    DriveOnCharger,
    DriveStraight { distance_mm: f64, speed_mmps: f64 },
    TurnInPlace(f64),
    SayText(String),
    PlayAnimation(String),
    BatteryState,
}

impl DeviceCall {
    /// Whether this is a capability call rather than connection bookkeeping.
    #[must_use]
    pub const fn is_capability(&self) -> bool {
        !matches!(self, Self::Connect | Self::Disconnect)
    }
}

/// How capability calls misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Return a device error.
    Error,
    /// Panic inside the driver.
    Panic,
}

struct Shared {
    connect_failures: AtomicUsize,
    connect_attempts: AtomicUsize,
    handles_created: AtomicUsize,
    live_handles: AtomicUsize,
    max_live_handles: AtomicUsize,
    fail_disconnect: AtomicBool,
    /// Bumped by `drop_links`; a handle only works while its epoch matches.
    link_epoch: AtomicUsize,
    fault: Mutex<Fault>,
    connect_delay: Mutex<Duration>,
    action_delay: Mutex<Duration>,
    battery: Mutex<Option<BatteryState>>,
    calls: Mutex<Vec<DeviceCall>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated robot: the factory handed to a session, and the control
/// surface for shaping its behaviour. Clones share state.
#[derive(Clone)]
pub struct SimulatedRobot {
    shared: Arc<Shared>,
}

impl SimulatedRobot {
    /// Create a healthy robot that connects instantly and reports a nominal battery.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                connect_failures: AtomicUsize::new(0),
                connect_attempts: AtomicUsize::new(0),
                handles_created: AtomicUsize::new(0),
                live_handles: AtomicUsize::new(0),
                max_live_handles: AtomicUsize::new(0),
                fail_disconnect: AtomicBool::new(false),
                link_epoch: AtomicUsize::new(0),
                fault: Mutex::new(Fault::None),
                connect_delay: Mutex::new(Duration::ZERO),
                action_delay: Mutex::new(Duration::ZERO),
                battery: Mutex::new(Some(BatteryState {
                    voltage: 4.05,
                    level: 2,
                    is_charging: false,
                    on_charger: false,
                    suggested_charger_secs: 0.0,
                })),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Set how long every capability call takes.
    #[must_use]
    pub fn with_action_delay(self, delay: Duration) -> Self {
        self.set_action_delay(delay);
        self
    }

    pub fn set_action_delay(&self, delay: Duration) {
        *lock(&self.shared.action_delay) = delay;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *lock(&self.shared.connect_delay) = delay;
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Make disconnect return an error (the handle still closes).
    pub fn fail_disconnect(&self, fail: bool) {
        self.shared.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Silently break every open link: handles still believe they are
    /// connected, but their calls fail until they connect again.
    pub fn drop_links(&self) {
        self.shared.link_epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_fault(&self, fault: Fault) {
        *lock(&self.shared.fault) = fault;
    }

    pub fn set_battery(&self, battery: Option<BatteryState>) {
        *lock(&self.shared.battery) = battery;
    }

    /// Snapshot of every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.shared.calls).clone()
    }

    /// Capability calls only, without connect/disconnect bookkeeping.
    #[must_use]
    pub fn capability_calls(&self) -> Vec<DeviceCall> {
        lock(&self.shared.calls)
            .iter()
            .filter(|c| c.is_capability())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.shared.calls).clear();
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn handles_created(&self) -> usize {
        self.shared.handles_created.load(Ordering::SeqCst)
    }

    /// Handles currently connected.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.shared.live_handles.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously connected handles ever seen.
    #[must_use]
    pub fn max_live_handles(&self) -> usize {
        self.shared.max_live_handles.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFactory for SimulatedRobot {
    fn create(&self, identity: &DeviceIdentity) -> Box<dyn Device> {
        self.shared.handles_created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(serial = %identity.serial, "Simulated handle created");
        Box::new(SimulatedDevice {
            shared: Arc::clone(&self.shared),
            connected: AtomicBool::new(false),
            epoch: AtomicUsize::new(0),
        })
    }
}

/// One simulated connection handle.
struct SimulatedDevice {
    shared: Arc<Shared>,
    connected: AtomicBool,
    epoch: AtomicUsize,
}

impl SimulatedDevice {
    fn record(&self, call: DeviceCall) {
        lock(&self.shared.calls).push(call);
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.shared.live_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn act(&self, call: DeviceCall) -> Result<(), DeviceError> {
        tracing::debug!(?call, "Simulated robot");
        self.record(call);
        let linked = self.epoch.load(Ordering::SeqCst) == self.shared.link_epoch.load(Ordering::SeqCst);
        if !self.connected.load(Ordering::SeqCst) || !linked {
            return Err(DeviceError::NotConnected);
        }

        let delay = *lock(&self.shared.action_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fault = *lock(&self.shared.fault);
        match fault {
            Fault::None => Ok(()),
            Fault::Error => Err(DeviceError::Command("simulated fault".to_string())),
            Fault::Panic => panic!("simulated driver panic"),
        }
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Device for SimulatedDevice {
    async fn connect(&self, _timeout: Duration) -> Result<(), DeviceError> {
        self.record(DeviceCall::Connect);
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.shared.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .shared
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DeviceError::ConnectFailed("robot unreachable".to_string()));
        }

        self.epoch
            .store(self.shared.link_epoch.load(Ordering::SeqCst), Ordering::SeqCst);
        if !self.connected.swap(true, Ordering::SeqCst) {
            let live = self.shared.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.max_live_handles.fetch_max(live, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Disconnect);
        self.close();
        if self.shared.fail_disconnect.load(Ordering::SeqCst) {
            return Err(DeviceError::Command("disconnect failed".to_string()));
        }
        Ok(())
    }

    async fn drive_off_charger(&self) -> Result<(), DeviceError> {
        self.act(DeviceCall::DriveOffCharger).await
    }

    async fn drive_on_charger(&self) -> Result<(), DeviceError> {
        self.act(DeviceCall::DriveOnCharger).await
    }

    async fn drive_straight(&self, distance_mm: f64, speed_mmps: f64) -> Result<(), DeviceError> {
        self.act(DeviceCall::DriveStraight {
            distance_mm,
            speed_mmps,
        })
        .await
    }

    async fn turn_in_place(&self, degrees: f64) -> Result<(), DeviceError> {
        self.act(DeviceCall::TurnInPlace(degrees)).await
    }

    async fn say_text(&self, text: &str) -> Result<(), DeviceError> {
        self.act(DeviceCall::SayText(text.to_string())).await
    }

    async fn play_animation(&self, animation_id: &str) -> Result<(), DeviceError> {
        self.act(DeviceCall::PlayAnimation(animation_id.to_string()))
            .await
    }

    async fn battery_state(&self) -> Result<Option<BatteryState>, DeviceError> {
        self.act(DeviceCall::BatteryState).await?;
        Ok(lock(&self.shared.battery).clone())
    }
}
