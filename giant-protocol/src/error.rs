use thiserror::Error;

/// Errors raised when a requested configuration can't be represented by the hardware.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric parameter lies outside the range the registers accept.
    #[error("{name} ({value}) is out of range ([{min}, {max}])")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// A combination of parameters that doesn't describe a valid shape.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConfigError {
    pub fn out_of_range(
        name: &'static str,
        value: impl TryInto<i64>,
        min: i64,
        max: i64,
    ) -> ConfigError {
        ConfigError::OutOfRange {
            name,
            value: value.try_into().unwrap_or(i64::MAX),
            min,
            max,
        }
    }

    /// Checks that `value` lies in `[min, max]`.
    pub fn check_range(name: &'static str, value: i64, min: i64, max: i64) -> Result<(), Self> {
        if value < min || value > max {
            Err(ConfigError::OutOfRange {
                name,
                value,
                min,
                max,
            })
        } else {
            Ok(())
        }
    }
}

/// Errors that may occur when decoding a received bit frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame has {got} bits, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("Start bit is not low")]
    StartBit,
    #[error("Stop bit {0} is not high")]
    StopBit(usize),
    #[error("Parity mismatch")]
    Parity,
}

#[test]
fn out_of_range_message() {
    let err = ConfigError::out_of_range("Clock divider", 0u32, 1, 65536);
    assert_eq!(
        err.to_string(),
        "Clock divider (0) is out of range ([1, 65536])"
    );
}
