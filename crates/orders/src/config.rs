//! Order service settings.

use std::time::Duration;

/// Tunables for [`OrderService`](crate::OrderService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderServiceConfig {
    /// Upper bound on a single command or query, up to and including the append.
    pub command_timeout: Duration,

    /// Upper bound on publishing a command's stored events to the bus.
    /// Running out only leaves the read model behind; the command still succeeds.
    pub publish_timeout: Duration,

    /// When set, appends require the store to still be at the version the
    /// command loaded; otherwise the last writer wins.
    pub optimistic_concurrency: bool,
}

impl OrderServiceConfig {
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
            publish_timeout: Self::DEFAULT_PUBLISH_TIMEOUT,
            optimistic_concurrency: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OrderServiceConfig::default();
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert!(!config.optimistic_concurrency);
    }

    #[test]
    fn builder_overrides() {
        let config = OrderServiceConfig::new()
            .command_timeout(Duration::from_millis(250))
            .publish_timeout(Duration::from_millis(50))
            .optimistic_concurrency(true);
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.publish_timeout, Duration::from_millis(50));
        assert!(config.optimistic_concurrency);
    }
}
