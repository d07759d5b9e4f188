use std::time::Duration;

use giant_protocol::error::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the host-side components.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A parameter can't be represented by the hardware.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A status register did not reach the expected state in time.
    #[error("Timed out after {waited:?} while waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },
    /// The operation is not available on this block or configuration.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}
