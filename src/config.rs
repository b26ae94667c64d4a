//! Configuration types for the round-trip protocol.

use crate::error::{Error, Result};
use crate::types::{Rank, DEFAULT_COORDINATOR};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for one peer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Group membership and transport settings.
    pub group: GroupConfig,

    /// Protocol behavior.
    pub protocol: ProtocolConfig,

    /// Random workload settings.
    pub workload: WorkloadConfig,
}

impl Config {
    /// Create a configuration for `rank` in a group of `size` peers.
    pub fn new(rank: Rank, size: usize) -> Self {
        Self {
            group: GroupConfig::new(rank, size),
            ..Default::default()
        }
    }

    /// Set group configuration.
    pub fn with_group_config(mut self, group: GroupConfig) -> Self {
        self.group = group;
        self
    }

    /// Set protocol configuration.
    pub fn with_protocol_config(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set workload configuration.
    pub fn with_workload_config(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<()> {
        self.group.validate()?;
        self.workload.validate()
    }
}

/// Process-group membership for one peer.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Number of peers in the group.
    pub size: usize,

    /// This peer's rank.
    pub rank: Rank,

    /// Rank of the coordinator.
    pub coordinator: Rank,

    /// Address the coordinator listens on.
    pub coordinator_addr: SocketAddr,

    /// Transport settings.
    pub transport: TransportConfig,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            size: 1,
            rank: 0,
            coordinator: DEFAULT_COORDINATOR,
            coordinator_addr: SocketAddr::from(([127, 0, 0, 1], 7400)),
            transport: TransportConfig::default(),
        }
    }
}

impl GroupConfig {
    /// Create a group config for `rank` in a group of `size` peers.
    pub fn new(rank: Rank, size: usize) -> Self {
        Self {
            size,
            rank,
            ..Default::default()
        }
    }

    /// Set the coordinator rank.
    pub fn with_coordinator(mut self, coordinator: Rank) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Set the coordinator's listen address.
    pub fn with_coordinator_addr(mut self, addr: SocketAddr) -> Self {
        self.coordinator_addr = addr;
        self
    }

    /// Set transport configuration.
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Whether this peer is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.rank == self.coordinator
    }

    /// Check that ranks fall inside the group.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::Config("group size must be at least 1".to_string()));
        }
        if self.rank >= self.size {
            return Err(Error::Config(format!(
                "rank {} out of range for group of {}",
                self.rank, self.size
            )));
        }
        if self.coordinator >= self.size {
            return Err(Error::Config(format!(
                "coordinator {} out of range for group of {}",
                self.coordinator, self.size
            )));
        }
        self.transport.validate()
    }
}

/// Transport connection and framing settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a worker keeps retrying to reach the coordinator.
    pub connect_timeout: Duration,

    /// Delay between connection attempts.
    pub retry_delay: Duration,

    /// Maximum size of a single frame in bytes.
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(100),
            max_frame_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl TransportConfig {
    /// Set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_frame_size < 64 {
            return Err(Error::Config(format!(
                "max_frame_size {} too small",
                self.max_frame_size
            )));
        }
        Ok(())
    }
}

/// Protocol behavior switches.
#[derive(Debug, Clone, Default)]
pub struct ProtocolConfig {
    /// Insert full-group barriers before consolidation and before each
    /// variable-length distribution. Only needed for non-synchronizing transports.
    pub explicit_barriers: bool,
}

impl ProtocolConfig {
    /// Enable or disable explicit barriers.
    pub fn with_explicit_barriers(mut self, enabled: bool) -> Self {
        self.explicit_barriers = enabled;
        self
    }
}

/// Random workload generator settings.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Exclusive upper bound on the number of items per peer.
    pub max_items: usize,

    /// Inclusive upper bound on each item's value.
    pub max_value: i32,

    /// Base seed. Each peer uses `seed + rank`. None seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            max_items: 10,
            max_value: 180, // degrees
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Set the exclusive item-count bound.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set the inclusive value bound.
    pub fn with_max_value(mut self, max_value: i32) -> Self {
        self.max_value = max_value;
        self
    }

    /// Use a fixed base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(Error::Config("max_items must be at least 1".to_string()));
        }
        if self.max_value < 0 {
            return Err(Error::Config(format!(
                "max_value {} must not be negative",
                self.max_value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.group.size, 1);
        assert_eq!(config.group.coordinator, 0);
        assert!(!config.protocol.explicit_barriers);
        assert_eq!(config.workload.max_items, 10);
        assert_eq!(config.workload.max_value, 180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new(2, 4)
            .with_protocol_config(ProtocolConfig::default().with_explicit_barriers(true))
            .with_workload_config(WorkloadConfig::default().with_seed(7).with_max_items(3));

        assert_eq!(config.group.rank, 2);
        assert_eq!(config.group.size, 4);
        assert!(!config.group.is_coordinator());
        assert!(config.protocol.explicit_barriers);
        assert_eq!(config.workload.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rank_out_of_range() {
        let config = Config::new(4, 4);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let group = GroupConfig::new(0, 3).with_coordinator(3);
        assert!(matches!(group.validate(), Err(Error::Config(_))));

        assert!(GroupConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_workload_validation() {
        let config = Config::default().with_workload_config(WorkloadConfig::default().with_max_items(0));
        assert!(config.validate().is_err());
    }
}
