//! # UIO Backend
//!
//! For GIAnT register banks that are memory mapped and exposed via the Linux UIO subsystem.
//! Register `n` lives in the 32-bit word at byte offset `4 * n`; byte-wide registers use
//! the low byte of their word, wide registers the full word.
//!
//! ## Example Usage
//!
//! ```ignore
//! use giant_host::{ClockConstants, dac::FaultInjector};
//!
//! let mut device = UioBackend::new("/dev/uio0", ClockConstants::new(0.25, 100e6))?;
//! let mut fi = FaultInjector::new();
//! fi.init(&mut device, true);
//! ```
use std::{
    fs::OpenOptions,
    io,
    num::NonZero,
    path::Path,
    ptr::{NonNull, read_volatile, write_volatile},
};

use giant_host::{ClockConstants, Register, RegisterInterface};
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};

const MAP_SIZE: NonZero<usize> = NonZero::new(0x1000).unwrap();
const REGISTER_COUNT: usize = 128;

/// Register bank mapped from a UIO device
pub struct UioBackend {
    regs: NonNull<u32>,
    clock: ClockConstants,
    /// Last value written to every register. Single bit updates are applied to this
    /// copy, so they don't depend on the register being readable.
    shadow: [u8; REGISTER_COUNT],
}

impl UioBackend {
    pub fn new(path: impl AsRef<Path>, clock: ClockConstants) -> io::Result<UioBackend> {
        let device_path = path.as_ref();
        log::debug!("Opening UIO device: {}", device_path.display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device_path)?;
        log::debug!("UIO device file opened successfully");

        let regs = unsafe {
            log::debug!("Mapping UIO memory (size=0x{:x})", MAP_SIZE);
            let ptr = mmap(
                None,
                MAP_SIZE,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )?;
            log::info!("UIO memory mapped successfully");
            ptr.cast::<u32>()
        };
        Ok(UioBackend {
            regs,
            clock,
            shadow: [0; REGISTER_COUNT],
        })
    }

    fn word(&self, reg: Register) -> *mut u32 {
        // Register ids are below REGISTER_COUNT, so the offset stays inside the mapping
        unsafe { self.regs.as_ptr().add(reg.id() as usize) }
    }

    fn write_word(&mut self, reg: Register, value: u32) {
        log::trace!("UIO write {:?} = 0x{:x}", reg, value);
        self.shadow[reg.id() as usize] = value as u8;
        unsafe { write_volatile(self.word(reg), value) }
    }
}

impl Drop for UioBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.regs.cast(), MAP_SIZE.get());
        }
    }
}

impl RegisterInterface for UioBackend {
    fn clock(&self) -> ClockConstants {
        self.clock
    }

    fn read_register(&mut self, reg: Register) -> u8 {
        let value = unsafe { read_volatile(self.word(reg)) } as u8;
        log::trace!("UIO read {:?} = 0x{:02x}", reg, value);
        value
    }

    fn write_register(&mut self, reg: Register, value: u8) {
        self.write_word(reg, value as u32);
    }

    fn write_register16(&mut self, reg: Register, value: u16) {
        self.write_word(reg, value as u32);
    }

    fn write_register32(&mut self, reg: Register, value: u32) {
        self.write_word(reg, value);
    }

    fn set_bit_register(&mut self, reg: Register, bit: u8, state: bool) {
        let current = self.shadow[reg.id() as usize];
        let value = if state {
            current | (1 << bit)
        } else {
            current & !(1 << bit)
        };
        self.write_word(reg, value as u32);
    }
}
