use std::time::Duration;

/// How bridged operations are serialized against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Serialization {
    /// One bridge-wide lock. An operation cannot start until the previous one, against any device, has resolved.
    #[default]
    Global,
    /// One lock per device. Operations of different kinds on the same device wait for each other.
    PerDevice,
    /// One lock per (device, operation kind). Operations against unrelated devices run concurrently.
    PerOperation,
}

/// Tunables for a [`Bridge`][crate::Bridge].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeConfig {
    /// Lock granularity for read, write and notification-configuration requests
    pub serialization: Serialization,
    /// Upper bound on the wait phase of a single request. `None` waits until the completion callback or a
    /// disconnect, however long that takes.
    pub operation_timeout: Option<Duration>,
    /// Capacity of the scan result stream. Results arriving while it is full are dropped.
    pub scan_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            serialization: Serialization::default(),
            operation_timeout: None,
            scan_buffer: 16,
        }
    }
}

impl BridgeConfig {
    /// Sets [`BridgeConfig::serialization`].
    pub fn with_serialization(mut self, serialization: Serialization) -> Self {
        self.serialization = serialization;
        self
    }

    /// Sets [`BridgeConfig::operation_timeout`].
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets [`BridgeConfig::scan_buffer`]. A capacity of zero is raised to one.
    pub fn with_scan_buffer(mut self, capacity: usize) -> Self {
        self.scan_buffer = capacity.max(1);
        self
    }
}
