//! # GIAnT Host Library
//!
//! This crate drives the GIAnT fault-injection FPGA from the host. It turns high level
//! requests (glitch pulses, UART characters, trigger windows) into the exact register
//! traffic the FPGA expects.
//!
//! ## Architecture
//!
//! The crate is built around the [`RegisterInterface`] trait. A transport (USB, a memory
//! mapped register window, an emulator, ...) implements it, and every component in this
//! crate borrows it mutably for the duration of a single operation:
//!
//! - [`timing::TimingController`]: pulse list and pulse memory of a timing block
//! - [`dac::FaultInjector`]: the fault-injection timing block plus the DAC controls
//! - [`utx::Utx`] and [`urx::Urx`]: universal bit-stream transmitter and receiver
//! - [`trigger::UniversalTrigger`]: programmable delay/hold edge detectors
//! - [`gpio::GpioMux`]: routing of internal signals onto the GPIO pins
//! - [`uart::SerialTransceiver`]: a UART composed of all of the above
//!
//! Components only keep host-side state (the pulse list, the packet-size ledger, ...).
//! There is no global device handle, so whoever owns the transport decides when and by
//! which component it is used.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use giant_host::{config::PollConfig, dac::FaultInjector};
//!
//! let mut device = MyTransport::open()?;
//! let mut fi = FaultInjector::new();
//! fi.init(&mut device, true);
//! fi.add_pulse(&mut device, 1000.0, 50.0, false)?;
//! fi.arm(&mut device);
//! ```
//!
//! ## Waiting for the hardware
//!
//! The FPGA has no interrupt lines, so waiting means polling a status register. Every wait
//! in this crate is bounded by a [`config::PollConfig`] or an explicit timeout and fails
//! with [`Error::Timeout`] instead of blocking forever.
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Register level actions are logged at `debug` and
//! `trace`, results like computed dividers at `info`. Adjustments the hardware forces
//! on a request (e.g. a pulse shorter than the minimum) are logged at `warn`.
pub mod config;
pub mod dac;
pub mod error;
pub mod gpio;
mod poll;
pub mod timing;
pub mod trigger;
pub mod uart;
pub mod urx;
pub mod utx;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result};
pub use giant_protocol::{ClockConstants, Register};

/// Trait that register transports must implement.
///
/// This is the only way the components of this crate talk to the hardware. Operations are
/// assumed to succeed once the transport is open; retrying failed transfers is the
/// transport's responsibility.
///
/// Components take `&mut` access for each operation, which serializes all register traffic:
/// one operation completes before the next one begins.
pub trait RegisterInterface {
    /// Clock constants of the connected hardware.
    fn clock(&self) -> ClockConstants;

    /// Reads a single byte-wide register.
    fn read_register(&mut self, reg: Register) -> u8;

    /// Writes a single byte-wide register.
    fn write_register(&mut self, reg: Register, value: u8);

    /// Writes a 16-bit wide register.
    fn write_register16(&mut self, reg: Register, value: u16);

    /// Writes a 32-bit wide register.
    fn write_register32(&mut self, reg: Register, value: u32);

    /// Sets (`state == true`) or clears a single bit of a register, leaving the others untouched.
    fn set_bit_register(&mut self, reg: Register, bit: u8, state: bool);

    /// Emits a strobe: sets `bit` and clears it again, so the hardware sees exactly
    /// one rising edge.
    fn rising_edge_register(&mut self, reg: Register, bit: u8) {
        self.set_bit_register(reg, bit, true);
        self.set_bit_register(reg, bit, false);
    }
}
