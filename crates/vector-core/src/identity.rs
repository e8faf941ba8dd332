//! Device identity and session settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Network identity of the single robot this process owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// IP address or hostname of the robot.
    pub ip: String,
    /// Robot serial number, used by the SDK to select credentials.
    pub serial: String,
}

impl DeviceIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(ip: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            serial: serial.into(),
        }
    }
}

/// Settings a device session is created with.
///
/// `connect_timeout` bounds the start-up registration connect;
/// `recovery_timeout` bounds each attempt on the leave-charger recovery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub identity: DeviceIdentity,
    pub connect_timeout: Duration,
    pub recovery_timeout: Duration,
}

impl SessionSettings {
    /// Default timeout for the start-up connect.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default timeout for each leave-charger recovery attempt.
    pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(3);

    /// Create settings with the default timeouts.
    #[must_use]
    pub const fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            recovery_timeout: Self::DEFAULT_RECOVERY_TIMEOUT,
        }
    }

    /// Override the start-up connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the leave-charger recovery timeout.
    #[must_use]
    pub const fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}
