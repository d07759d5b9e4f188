//! Conversions between wall-clock time and hardware clock ticks.
use std::time::Duration;

use crate::error::ConfigError;

/// Clock constants of the connected hardware.
///
/// These are properties of the transport (the FPGA bitstream and its clocking) and
/// not of this crate, so they are passed in by whoever opens the device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClockConstants {
    ticks_per_ns: f64,
    f_clk_normal: f64,
}

impl ClockConstants {
    /// Creates clock constants from the ns-to-tick factor of the pulse generator
    /// and the frequency (in Hz) of the normal-mode clock.
    pub const fn new(ticks_per_ns: f64, f_clk_normal: f64) -> ClockConstants {
        ClockConstants {
            ticks_per_ns,
            f_clk_normal,
        }
    }

    /// Number of pulse generator ticks per nanosecond
    pub fn ticks_per_ns(&self) -> f64 {
        self.ticks_per_ns
    }

    /// Frequency of the normal-mode clock in Hz
    pub fn f_clk_normal(&self) -> f64 {
        self.f_clk_normal
    }

    /// Converts nanoseconds to pulse generator ticks, truncating.
    /// Negative inputs saturate to zero.
    pub fn ns_to_ticks(&self, ns: f64) -> u32 {
        (self.ticks_per_ns * ns) as u32
    }

    /// Converts a duration to normal-mode clock ticks, rounding to the nearest tick.
    pub fn duration_to_ticks(
        &self,
        name: &'static str,
        duration: Duration,
    ) -> Result<u32, ConfigError> {
        let ticks = (self.f_clk_normal * duration.as_secs_f64()).round();
        if ticks > u32::MAX as f64 {
            return Err(ConfigError::out_of_range(
                name,
                ticks as i64,
                0,
                u32::MAX as i64,
            ));
        }
        Ok(ticks as u32)
    }

    /// Clock divider for a bit-serial interface running at `baud_rate`.
    ///
    /// The result is `round(f_clk / baud_rate) - 1` and is not range checked here.
    pub fn baud_divider(&self, baud_rate: u32) -> i64 {
        (self.f_clk_normal / baud_rate as f64).round() as i64 - 1
    }
}

/// Smallest offset (in ticks) the pulse generator can produce after a trigger edge
pub const MIN_OFFSET_TICKS: u32 = 3;
/// Smallest pulse width (in ticks) the pulse generator can produce
pub const MIN_WIDTH_TICKS: u32 = 1;

/// A single glitch pulse as it is stored in pulse memory.
///
/// Both fields already have the hardware bias ([`MIN_OFFSET_TICKS`], [`MIN_WIDTH_TICKS`])
/// subtracted. Offsets are relative to the trigger edge for the first pulse and to the
/// end of the previous pulse otherwise.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Pulse {
    offset_ticks: u32,
    width_ticks: u32,
}

/// Records which bounds were enforced while converting a pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Clamped {
    pub offset: bool,
    pub width: bool,
}

impl Clamped {
    pub fn any(&self) -> bool {
        self.offset || self.width
    }
}

impl Pulse {
    /// Creates a pulse from raw memory values
    pub const fn from_ticks(offset_ticks: u32, width_ticks: u32) -> Pulse {
        Pulse {
            offset_ticks,
            width_ticks,
        }
    }

    /// Converts a pulse in nanoseconds into its memory representation.
    ///
    /// An offset at or below [`MIN_OFFSET_TICKS`] is forced to `MIN_OFFSET_TICKS + 1`, a
    /// width below [`MIN_WIDTH_TICKS`] is forced to `MIN_WIDTH_TICKS`. Both are then
    /// reduced by their minimum. The returned [`Clamped`] tells which limits applied.
    pub fn from_ns(clock: &ClockConstants, offset_ns: f64, width_ns: f64) -> (Pulse, Clamped) {
        let mut clamped = Clamped::default();

        let mut offset = clock.ns_to_ticks(offset_ns);
        if offset <= MIN_OFFSET_TICKS {
            offset = MIN_OFFSET_TICKS + 1;
            clamped.offset = true;
        }

        let mut width = clock.ns_to_ticks(width_ns);
        if width < MIN_WIDTH_TICKS {
            width = MIN_WIDTH_TICKS;
            clamped.width = true;
        }

        (
            Pulse {
                offset_ticks: offset - MIN_OFFSET_TICKS,
                width_ticks: width - MIN_WIDTH_TICKS,
            },
            clamped,
        )
    }

    /// Offset as stored in memory
    pub fn offset_ticks(&self) -> u32 {
        self.offset_ticks
    }

    /// Width as stored in memory
    pub fn width_ticks(&self) -> u32 {
        self.width_ticks
    }
}
