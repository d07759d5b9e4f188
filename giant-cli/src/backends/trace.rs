//! # Trace Backend
//!
//! A register bank without hardware behind it. Every access is logged, which makes it
//! possible to inspect the register traffic of a command before running it on a device.
//! Writable registers read back their last value; status registers report ready.
use giant_host::{ClockConstants, Register, RegisterInterface};

const REGISTER_COUNT: usize = 128;

const READY_REGISTERS: [Register; 4] = [
    Register::FiStatus,
    Register::UtimingStatus,
    Register::UtxStatus,
    Register::UrxStatus,
];

pub struct TraceBackend {
    clock: ClockConstants,
    regs: [u32; REGISTER_COUNT],
}

impl TraceBackend {
    pub fn new(clock: ClockConstants) -> TraceBackend {
        let mut regs = [0; REGISTER_COUNT];
        for reg in READY_REGISTERS {
            regs[reg.id() as usize] = 0x01;
        }
        TraceBackend { clock, regs }
    }

    fn store(&mut self, reg: Register, value: u32) {
        self.regs[reg.id() as usize] = value;
    }
}

impl RegisterInterface for TraceBackend {
    fn clock(&self) -> ClockConstants {
        self.clock
    }

    fn read_register(&mut self, reg: Register) -> u8 {
        let value = self.regs[reg.id() as usize] as u8;
        log::trace!("read  {:?} ({}) -> 0x{:02x}", reg, reg.id(), value);
        value
    }

    fn write_register(&mut self, reg: Register, value: u8) {
        log::trace!("write {:?} ({}) <- 0x{:02x}", reg, reg.id(), value);
        self.store(reg, value as u32);
    }

    fn write_register16(&mut self, reg: Register, value: u16) {
        log::trace!("write {:?} ({}) <- 0x{:04x}", reg, reg.id(), value);
        self.store(reg, value as u32);
    }

    fn write_register32(&mut self, reg: Register, value: u32) {
        log::trace!("write {:?} ({}) <- 0x{:08x}", reg, reg.id(), value);
        self.store(reg, value);
    }

    fn set_bit_register(&mut self, reg: Register, bit: u8, state: bool) {
        log::trace!("bit   {:?} ({}) [{}] <- {}", reg, reg.id(), bit, state as u8);
        let value = &mut self.regs[reg.id() as usize];
        if state {
            *value |= 1 << bit;
        } else {
            *value &= !(1 << bit);
        }
    }
}
