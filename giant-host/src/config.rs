use std::time::Duration;

/// Controls how the components wait for the hardware.
///
/// All waits poll a status register, sleeping `interval` between two reads, and give up
/// with [`crate::Error::Timeout`] after `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        }
    }
}

/// Builder to create a [PollConfig]
///
/// # Example
///
/// ```
/// use giant_host::config::Builder;
/// use std::time::Duration;
///
/// let poll = Builder::new()
///     .poll_interval(Duration::from_micros(500))
///     .poll_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(poll.timeout, Duration::from_secs(5));
/// ```
#[derive(Default)]
pub struct Builder {
    config: PollConfig,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Time to sleep between two status reads
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Time after which a wait fails
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> PollConfig {
        self.config
    }
}
