use std::collections::{HashMap, VecDeque};

use crate::{ClockConstants, Register, RegisterInterface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read(Register),
    Write(Register, u8),
    Write16(Register, u16),
    Write32(Register, u32),
    SetBit(Register, u8, bool),
}

/// The two accesses a rising edge on `bit` consists of
pub(crate) fn strobe(reg: Register, bit: u8) -> [Access; 2] {
    [
        Access::SetBit(reg, bit, true),
        Access::SetBit(reg, bit, false),
    ]
}

/// Register interface that records every access and answers reads from a script.
pub(crate) struct RecordingRegisters {
    pub clock: ClockConstants,
    pub log: Vec<Access>,
    scripted: HashMap<Register, VecDeque<u8>>,
    defaults: HashMap<Register, u8>,
}

impl RecordingRegisters {
    pub fn new() -> RecordingRegisters {
        RecordingRegisters {
            clock: ClockConstants::new(0.25, 100e6),
            log: Vec::new(),
            scripted: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    /// Values returned by the next reads of `reg`, before falling back to the default
    pub fn script(&mut self, reg: Register, values: &[u8]) {
        self.scripted
            .entry(reg)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Value returned by reads of `reg` once the script is exhausted
    pub fn set_default(&mut self, reg: Register, value: u8) {
        self.defaults.insert(reg, value);
    }

    pub fn take_log(&mut self) -> Vec<Access> {
        std::mem::take(&mut self.log)
    }

    /// Recorded accesses without the reads
    pub fn writes(&self) -> Vec<Access> {
        self.log
            .iter()
            .filter(|access| !matches!(access, Access::Read(_)))
            .copied()
            .collect()
    }
}

impl RegisterInterface for RecordingRegisters {
    fn clock(&self) -> ClockConstants {
        self.clock
    }

    fn read_register(&mut self, reg: Register) -> u8 {
        self.log.push(Access::Read(reg));
        self.scripted
            .get_mut(&reg)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.defaults.get(&reg).copied())
            .unwrap_or(0)
    }

    fn write_register(&mut self, reg: Register, value: u8) {
        self.log.push(Access::Write(reg, value));
    }

    fn write_register16(&mut self, reg: Register, value: u16) {
        self.log.push(Access::Write16(reg, value));
    }

    fn write_register32(&mut self, reg: Register, value: u32) {
        self.log.push(Access::Write32(reg, value));
    }

    fn set_bit_register(&mut self, reg: Register, bit: u8, state: bool) {
        self.log.push(Access::SetBit(reg, bit, state));
    }
}
