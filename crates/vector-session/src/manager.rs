//! Device session manager: owns the one robot connection of this process.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use tokio::sync::Mutex;
use vector_core::{BatteryState, Device, DeviceError, DeviceFactory, SessionSettings};

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connect failed: {0}")]
    Connect(#[from] DeviceError),
}

/// Connection state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connect has been attempted yet.
    Uninitialized,
    /// A connect attempt is in progress.
    Connecting,
    Connected,
    /// The last connect or capability call failed, or the session was shut down.
    Disconnected,
}

struct Slot {
    handle: Option<Arc<dyn Device>>,
    state: SessionState,
    /// Bumped whenever a new handle is installed, so results from a
    /// replaced handle never overwrite the state of its successor.
    generation: u64,
}

type SharedSlot = Arc<RwLock<Slot>>;

fn read(slot: &SharedSlot) -> RwLockReadGuard<'_, Slot> {
    slot.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(slot: &SharedSlot) -> RwLockWriteGuard<'_, Slot> {
    slot.write().unwrap_or_else(PoisonError::into_inner)
}

fn mark_failed(slot: &SharedSlot, generation: u64) {
    let mut slot = write(slot);
    if slot.generation == generation && slot.state == SessionState::Connected {
        slot.state = SessionState::Disconnected;
        tracing::warn!("Device call failed, session marked disconnected");
    }
}

/// Owns the lifecycle of the single device handle.
///
/// The handle never leaves this type: callers borrow it through a
/// [`DeviceLease`], which reports capability failures back to the session.
/// Connect and reconnect calls are serialised; `is_usable` and `lease` never
/// wait on them.
pub struct DeviceSession {
    factory: Arc<dyn DeviceFactory>,
    settings: SessionSettings,
    slot: SharedSlot,
    lifecycle: Mutex<()>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Create an uninitialized session. No handle exists until the first connect.
    #[must_use]
    pub fn new(factory: Arc<dyn DeviceFactory>, settings: SessionSettings) -> Self {
        Self {
            factory,
            settings,
            slot: Arc::new(RwLock::new(Slot {
                handle: None,
                state: SessionState::Uninitialized,
                generation: 0,
            })),
            lifecycle: Mutex::new(()),
        }
    }

    /// Settings the session was created with.
    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        read(&self.slot).state
    }

    /// Whether a handle exists and the last known state is `Connected`.
    ///
    /// This is a hint: the link can still drop on the next call.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        let slot = read(&self.slot);
        slot.handle.is_some() && slot.state == SessionState::Connected
    }

    /// Borrow the device for capability calls, if the session is usable.
    #[must_use]
    pub fn lease(&self) -> Option<DeviceLease> {
        let slot = read(&self.slot);
        if slot.state != SessionState::Connected {
            return None;
        }
        slot.handle.as_ref().map(|device| DeviceLease {
            device: Arc::clone(device),
            slot: Arc::clone(&self.slot),
            generation: slot.generation,
        })
    }

    /// Mark the current handle as failed outside of a lease, e.g. after a
    /// capability call panicked.
    pub fn mark_disconnected(&self) {
        let generation = read(&self.slot).generation;
        mark_failed(&self.slot, generation);
    }

    /// Start-up registration: connect with the configured timeout.
    ///
    /// # Errors
    /// Returns error if the connect attempt fails or times out.
    pub async fn register(&self) -> Result<(), SessionError> {
        tracing::debug!(
            serial = %self.settings.identity.serial,
            ip = %self.settings.identity.ip,
            "Registering robot"
        );
        self.ensure_connected(self.settings.connect_timeout).await
    }

    /// Make sure the session is connected, with a single connect attempt.
    ///
    /// Returns immediately when already connected. Otherwise creates a handle
    /// if none exists (or disconnects the stale one, ignoring errors) and
    /// connects it. Never retries.
    ///
    /// # Errors
    /// Returns error if the connect attempt fails or times out.
    pub async fn ensure_connected(&self, timeout: Duration) -> Result<(), SessionError> {
        self.connect_current(timeout, false).await
    }

    /// Reconnect the current handle once, whatever the recorded state.
    ///
    /// A `Connected` session may sit on a link that died without any call
    /// noticing, so the handle is disconnected (ignoring errors) and connected
    /// again. Creates the handle if none exists. Never retries.
    ///
    /// # Errors
    /// Returns error if the connect attempt fails or times out.
    pub async fn refresh(&self, timeout: Duration) -> Result<(), SessionError> {
        self.connect_current(timeout, true).await
    }

    async fn connect_current(&self, timeout: Duration, force: bool) -> Result<(), SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let (device, generation, stale) = {
            let mut slot = write(&self.slot);
            if !force && slot.state == SessionState::Connected && slot.handle.is_some() {
                return Ok(());
            }
            let (device, stale) = if let Some(device) = &slot.handle {
                (Arc::clone(device), true)
            } else {
                let device: Arc<dyn Device> = Arc::from(self.factory.create(&self.settings.identity));
                slot.generation += 1;
                slot.handle = Some(Arc::clone(&device));
                (device, false)
            };
            slot.state = SessionState::Connecting;
            (device, slot.generation, stale)
        };

        if stale {
            tracing::debug!("Trying to disconnect stale handle");
            if let Err(e) = device.disconnect().await {
                tracing::debug!("Ignoring disconnect error: {e}");
            }
        }

        self.connect(&device, generation, timeout).await
    }

    /// Replace the handle with a brand-new one and connect it once.
    ///
    /// Any existing handle is disconnected first; its errors are ignored since
    /// a dropped link usually fails to close cleanly.
    ///
    /// # Errors
    /// Returns error if the connect attempt fails or times out.
    pub async fn reconnect_fresh(&self, timeout: Duration) -> Result<(), SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let old = {
            let mut slot = write(&self.slot);
            slot.state = SessionState::Connecting;
            slot.handle.take()
        };
        if let Some(old) = old {
            if let Err(e) = old.disconnect().await {
                tracing::debug!("Ignoring disconnect error on discarded handle: {e}");
            }
        }

        let device: Arc<dyn Device> = Arc::from(self.factory.create(&self.settings.identity));
        let generation = {
            let mut slot = write(&self.slot);
            slot.generation += 1;
            slot.handle = Some(Arc::clone(&device));
            slot.generation
        };

        self.connect(&device, generation, timeout).await
    }

    /// Disconnect and drop the handle. Used on process shutdown.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let old = {
            let mut slot = write(&self.slot);
            slot.state = SessionState::Disconnected;
            slot.generation += 1;
            slot.handle.take()
        };
        if let Some(old) = old {
            match old.disconnect().await {
                Ok(()) => tracing::info!("Robot disconnected"),
                Err(e) => tracing::warn!("Disconnect on shutdown failed: {e}"),
            }
        }
    }

    async fn connect(
        &self,
        device: &Arc<dyn Device>,
        generation: u64,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        tracing::debug!(?timeout, "Connecting");
        let result = match tokio::time::timeout(timeout, device.connect(timeout)).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Timeout(timeout)),
        };

        let mut slot = write(&self.slot);
        if slot.generation == generation {
            slot.state = if result.is_ok() {
                SessionState::Connected
            } else {
                SessionState::Disconnected
            };
        }
        drop(slot);

        match result {
            Ok(()) => {
                tracing::debug!("Connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!(serial = %self.settings.identity.serial, "Error connecting: {e}");
                Err(e.into())
            }
        }
    }
}

/// Borrowed access to the connected device.
///
/// Every failing call marks the session disconnected, so the next action
/// re-checks usability instead of retrying blindly.
pub struct DeviceLease {
    device: Arc<dyn Device>,
    slot: SharedSlot,
    generation: u64,
}

impl DeviceLease {
    fn track<T>(&self, result: Result<T, DeviceError>) -> Result<T, DeviceError> {
        if result.is_err() {
            mark_failed(&self.slot, self.generation);
        }
        result
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn drive_off_charger(&self) -> Result<(), DeviceError> {
        self.track(self.device.drive_off_charger().await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn drive_on_charger(&self) -> Result<(), DeviceError> {
        self.track(self.device.drive_on_charger().await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn drive_straight(&self, distance_mm: f64, speed_mmps: f64) -> Result<(), DeviceError> {
        self.track(self.device.drive_straight(distance_mm, speed_mmps).await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn turn_in_place(&self, degrees: f64) -> Result<(), DeviceError> {
        self.track(self.device.turn_in_place(degrees).await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn say_text(&self, text: &str) -> Result<(), DeviceError> {
        self.track(self.device.say_text(text).await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn play_animation(&self, animation_id: &str) -> Result<(), DeviceError> {
        self.track(self.device.play_animation(animation_id).await)
    }

    /// # Errors
    /// Returns the device error, after marking the session disconnected.
    pub async fn battery_state(&self) -> Result<Option<BatteryState>, DeviceError> {
        self.track(self.device.battery_state().await)
    }
}

#[cfg(all(test, feature = "simulated"))]
mod tests {
    use tokio_test::{assert_err, assert_ok};
    use vector_core::DeviceIdentity;

    use super::*;
    use crate::driver::{DeviceCall, Fault, SimulatedRobot};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn session(robot: &SimulatedRobot) -> DeviceSession {
        let settings = SessionSettings::new(DeviceIdentity::new("192.168.1.50", "00e20100"));
        DeviceSession::new(Arc::new(robot.clone()), settings)
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(!session.is_usable());
        assert!(session.lease().is_none());
        assert_eq!(robot.handles_created(), 0);
    }

    #[tokio::test]
    async fn test_ensure_connected_creates_and_connects() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);

        assert_ok!(session.ensure_connected(TIMEOUT).await);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.is_usable());
        assert_eq!(robot.connect_attempts(), 1);

        // Already connected: no further attempt.
        assert_ok!(session.ensure_connected(TIMEOUT).await);
        assert_eq!(robot.connect_attempts(), 1);
        assert_eq!(robot.handles_created(), 1);
    }

    #[tokio::test]
    async fn test_ensure_connected_failure_is_single_attempt() {
        let robot = SimulatedRobot::new();
        robot.fail_next_connects(5);
        let session = session(&robot);

        let err = assert_err!(session.ensure_connected(TIMEOUT).await);
        assert!(matches!(err, SessionError::Connect(DeviceError::ConnectFailed(_))));
        assert_eq!(robot.connect_attempts(), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_usable());
    }

    #[tokio::test]
    async fn test_ensure_connected_reuses_stale_handle() {
        let robot = SimulatedRobot::new();
        robot.fail_next_connects(1);
        let session = session(&robot);

        assert_err!(session.ensure_connected(TIMEOUT).await);
        assert_ok!(session.ensure_connected(TIMEOUT).await);
        assert_eq!(robot.handles_created(), 1);
        assert_eq!(robot.connect_attempts(), 2);
        assert!(robot.calls().contains(&DeviceCall::Disconnect));
    }

    #[tokio::test]
    async fn test_refresh_reconnects_silently_dropped_link() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.register().await);

        robot.drop_links();
        assert_eq!(session.state(), SessionState::Connected);

        assert_ok!(session.refresh(TIMEOUT).await);
        assert_eq!(robot.connect_attempts(), 2);
        assert_eq!(robot.handles_created(), 1);
        assert_eq!(robot.max_live_handles(), 1);
        assert!(robot.calls().contains(&DeviceCall::Disconnect));

        let lease = session.lease().unwrap();
        assert_ok!(lease.say_text("hello").await);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_single_attempt() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.register().await);

        robot.fail_next_connects(5);
        assert_err!(session.refresh(TIMEOUT).await);
        assert_eq!(robot.connect_attempts(), 2);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_fresh_replaces_handle() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.ensure_connected(TIMEOUT).await);

        robot.fail_disconnect(true);
        assert_ok!(session.reconnect_fresh(TIMEOUT).await);

        assert_eq!(robot.handles_created(), 2);
        assert_eq!(robot.live_handles(), 1);
        assert_eq!(robot.max_live_handles(), 1);
        assert!(session.is_usable());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let robot = SimulatedRobot::new();
        robot.set_connect_delay(Duration::from_millis(200));
        let session = session(&robot);

        let err = assert_err!(session.ensure_connected(Duration::from_millis(20)).await);
        assert!(matches!(err, SessionError::Connect(DeviceError::Timeout(_))));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_lease_failure_marks_disconnected() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.ensure_connected(TIMEOUT).await);

        let lease = session.lease().unwrap();
        assert_ok!(lease.turn_in_place(10.0).await);
        assert!(session.is_usable());

        robot.set_fault(Fault::Error);
        assert_err!(lease.say_text("hello").await);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.lease().is_none());
    }

    #[tokio::test]
    async fn test_old_lease_cannot_disconnect_new_handle() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.ensure_connected(TIMEOUT).await);
        let old = session.lease().unwrap();

        assert_ok!(session.reconnect_fresh(TIMEOUT).await);
        // The discarded handle is closed, so the call fails.
        assert_err!(old.drive_on_charger().await);
        assert!(session.is_usable());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let robot = SimulatedRobot::new();
        let session = session(&robot);
        assert_ok!(session.register().await);
        assert_eq!(robot.live_handles(), 1);

        session.shutdown().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(robot.live_handles(), 0);
        assert!(!session.is_usable());
    }
}
