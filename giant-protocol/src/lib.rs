//! # GIAnT Protocol Library
//!
//! This crate describes the bit- and byte-level formats used between a host and the
//! FPGA of the GIAnT fault-injection platform. It does not perform any I/O; the
//! register traffic itself is generated by the `giant-host` crate.
//!
//! ## Overview
//!
//! The FPGA exposes a bank of byte-wide registers. Everything the host wants from the
//! hardware (glitch pulses with nanosecond timing, a software defined UART, programmable
//! triggers) is expressed as values in those registers or in memories behind them.
//! This crate provides:
//!
//! - [`registers`]: the register map and the bit positions inside every control register
//! - [`timing`]: conversions between nanoseconds/seconds and hardware clock ticks, and
//!   the clamping rules of the pulse generator
//! - [`codec`]: the pulse memory image and how it maps onto byte writes, and the packing
//!   of bit streams into transmitter FIFO bytes
//! - [`frame`]: encoding and decoding of asynchronous serial character frames
//!
//! ## Basic Usage
//!
//! ### Encoding a UART character
//!
//! ```
//! use giant_protocol::frame::{FrameFormat, Parity};
//!
//! let format = FrameFormat::new(8, Parity::None, 1).expect("8N1 is a valid format");
//! let frame = format.encode(0xA5);
//! let bits: Vec<u8> = frame.iter().map(u8::from).collect();
//! // start bit, data LSB first, stop bit
//! assert_eq!(bits, [0, 1, 0, 1, 0, 0, 1, 0, 1, 1]);
//! ```
//!
//! ### Building the pulse memory image
//!
//! ```
//! use giant_protocol::{ClockConstants, Pulse, codec::MemoryImage};
//!
//! let clock = ClockConstants::new(0.25, 100e6);
//! let (pulse, clamped) = Pulse::from_ns(&clock, 1000.0, 40.0);
//! assert!(!clamped.any());
//!
//! let pulses = [pulse];
//! let image = MemoryImage::new(&pulses).expect("a single pulse fits into memory");
//! let words: Vec<_> = image.words().map(|w| (w.addr(), w.value())).collect();
//! assert_eq!(words, [(0, 4 << 16), (2, 247), (3, 9)]);
//! ```
//!
//! ## Error Handling
//!
//! Parameters that the hardware cannot represent are reported as [`error::ConfigError`].
//! Received frames that are malformed are reported as [`error::FrameError`].

pub mod codec;
pub mod error;
pub mod frame;
pub mod registers;
pub mod timing;

pub use registers::Register;
pub use timing::{ClockConstants, Pulse};
