use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{Error, config::PollConfig};

/// Polls `ready` until it returns `true`, sleeping `config.interval` in between.
/// Gives up after `timeout`.
pub(crate) fn poll_until(
    config: &PollConfig,
    timeout: Duration,
    what: &'static str,
    mut ready: impl FnMut() -> bool,
) -> Result<(), Error> {
    let start = Instant::now();
    loop {
        if ready() {
            return Ok(());
        }
        let waited = start.elapsed();
        if waited >= timeout {
            log::error!("Timed out after {:?} waiting for {}", waited, what);
            return Err(Error::Timeout { what, waited });
        }
        thread::sleep(config.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_once_ready() {
        let config = PollConfig::default();
        let mut polls = 0;
        poll_until(&config, config.timeout, "test", || {
            polls += 1;
            polls == 3
        })
        .unwrap();
        assert_eq!(polls, 3);
    }

    #[test]
    fn times_out() {
        let config = PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
        };
        match poll_until(&config, config.timeout, "never", || false) {
            Err(Error::Timeout { what, waited }) => {
                assert_eq!(what, "never");
                assert!(waited >= Duration::from_millis(5));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }
}
