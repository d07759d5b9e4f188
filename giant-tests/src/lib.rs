//! Register-level emulator of the GIAnT FPGA.
//!
//! The [`Emulator`] implements [`RegisterInterface`] and models the parts of the FPGA
//! whose behavior can be observed through registers: both pulse memories, the UTX FIFO
//! with its packet-size queue, received URX packets, the universal triggers and the GPIO
//! select shift register. It is used by the integration tests of this crate.
use std::collections::VecDeque;

use bit_vec::BitVec;
use giant_host::{ClockConstants, Register, RegisterInterface};
use giant_protocol::{
    codec::{MEMORY_BYTES, MemoryImage},
    registers::{
        FiControl, GpioControl, GpioPin, UrxControl, UtimingControl, UtrigControl,
        UtrigStatusBit, UtxControl,
    },
};

const REGISTER_COUNT: usize = 128;

/// Register access as seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(Register),
    Write(Register, u32),
    SetBit(Register, u8, bool),
}

/// A UTX transmission started with the START strobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// FIFO content at the time of the strobe
    pub data: Vec<u8>,
    /// Packet sizes in the order the host wrote them
    pub sizes: Vec<u16>,
}

impl Transmission {
    /// The transmitted bit stream: all packets concatenated, each cut to its size.
    ///
    /// The FPGA pops sizes in reverse write order, so the first packet's size is the last
    /// one written.
    pub fn bits(&self) -> BitVec {
        let fifo = BitVec::from_bytes(&self.data);
        let mut bits = BitVec::new();
        let mut byte_offset = 0;
        for size in self.sizes.iter().rev() {
            let size = *size as usize;
            bits.extend(fifo.iter().skip(8 * byte_offset).take(size));
            byte_offset += size.div_ceil(8);
        }
        bits
    }
}

#[derive(Debug, Clone)]
struct RxPacket {
    bits: u16,
    data: VecDeque<u8>,
}

/// Pulse memory behind an address/data register triplet
#[derive(Debug, Clone)]
struct PulseMemory {
    addr_low: Register,
    addr_high: Register,
    data_in: Register,
    bytes: Vec<u8>,
}

impl PulseMemory {
    fn new(addr_low: Register, addr_high: Register, data_in: Register) -> PulseMemory {
        PulseMemory {
            addr_low,
            addr_high,
            data_in,
            bytes: vec![0; MEMORY_BYTES as usize],
        }
    }

    fn address(&self, regs: &[u32; REGISTER_COUNT]) -> usize {
        let low = regs[self.addr_low.id() as usize] as usize & 0xff;
        let high = regs[self.addr_high.id() as usize] as usize & 0x7;
        (high << 8) | low
    }

    fn commit(&mut self, regs: &[u32; REGISTER_COUNT]) {
        let addr = self.address(regs);
        self.bytes[addr] = regs[self.data_in.id() as usize] as u8;
    }

    fn word(&self, addr: usize) -> u32 {
        let b = &self.bytes[4 * addr..4 * addr + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

#[derive(Debug, Clone)]
pub struct Emulator {
    clock: ClockConstants,
    regs: [u32; REGISTER_COUNT],
    traffic: Vec<Access>,
    fi_memory: PulseMemory,
    utiming_memory: PulseMemory,
    fi_arm_count: usize,
    fi_trigger_count: usize,
    utx_fifo: Vec<u8>,
    utx_sizes: Vec<u16>,
    utx_busy_reads: usize,
    transmissions: Vec<Transmission>,
    urx_packets: VecDeque<RxPacket>,
    line: VecDeque<RxPacket>,
    trigger_armed: [bool; 2],
    trigger_fired: [bool; 2],
    gpio_selects: Vec<u8>,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Emulator {
        Self::with_clock(ClockConstants::new(0.25, 100e6))
    }

    pub fn with_clock(clock: ClockConstants) -> Emulator {
        Emulator {
            clock,
            regs: [0; REGISTER_COUNT],
            traffic: Vec::new(),
            fi_memory: PulseMemory::new(
                Register::FiAddrLow,
                Register::FiAddrHigh,
                Register::FiDataIn,
            ),
            utiming_memory: PulseMemory::new(
                Register::UtimingAddrLow,
                Register::UtimingAddrHigh,
                Register::UtimingDataIn,
            ),
            fi_arm_count: 0,
            fi_trigger_count: 0,
            utx_fifo: Vec::new(),
            utx_sizes: Vec::new(),
            utx_busy_reads: 0,
            transmissions: Vec::new(),
            urx_packets: VecDeque::new(),
            line: VecDeque::new(),
            trigger_armed: [false; 2],
            trigger_fired: [false; 2],
            gpio_selects: Vec::new(),
        }
    }

    /// All register accesses so far
    pub fn traffic(&self) -> &[Access] {
        &self.traffic
    }

    pub fn take_traffic(&mut self) -> Vec<Access> {
        std::mem::take(&mut self.traffic)
    }

    /// Last value written to `reg`, including single bit updates
    pub fn register(&self, reg: Register) -> u32 {
        self.regs[reg.id() as usize]
    }

    /// 32-bit word `addr` of the fault-injection pulse memory
    pub fn fi_word(&self, addr: usize) -> u32 {
        self.fi_memory.word(addr)
    }

    /// 32-bit word `addr` of the utiming pulse memory
    pub fn utiming_word(&self, addr: usize) -> u32 {
        self.utiming_memory.word(addr)
    }

    /// The `(offset, width)` pairs the fault-injection block would play, as announced by
    /// the memory header
    pub fn fi_pulses(&self) -> Option<Vec<(u32, u32)>> {
        let count = MemoryImage::pulse_count_from_header(self.fi_word(0))?;
        Some(
            (0..count)
                .map(|p| (self.fi_word(2 + 2 * p), self.fi_word(3 + 2 * p)))
                .collect(),
        )
    }

    pub fn fi_arm_count(&self) -> usize {
        self.fi_arm_count
    }

    pub fn fi_trigger_count(&self) -> usize {
        self.fi_trigger_count
    }

    /// Reports the UTX as busy for the next `reads` status reads
    pub fn set_utx_busy(&mut self, reads: usize) {
        self.utx_busy_reads = reads;
    }

    pub fn transmissions(&self) -> &[Transmission] {
        &self.transmissions
    }

    /// Pending FIFO bytes that were not sent yet
    pub fn utx_fifo(&self) -> &[u8] {
        &self.utx_fifo
    }

    /// Queues a character that arrives once trigger 2 is armed. `bits` is the number of
    /// sampled bits, `data` the bytes the URX stores for them.
    pub fn receive_on_trigger(&mut self, bits: u16, data: &[u8]) {
        self.line.push_back(RxPacket {
            bits,
            data: data.iter().copied().collect(),
        });
    }

    /// Selection driven onto `pin`, if the select shift register has been filled
    pub fn gpio_select(&self, pin: GpioPin) -> Option<u8> {
        let n = self.gpio_selects.len();
        if n < GpioPin::COUNT {
            return None;
        }
        // The first value shifted in ends up on the last pin
        Some(self.gpio_selects[n - 1 - pin.index()])
    }

    pub fn gpio_enabled(&self) -> bool {
        self.register(Register::Gpio1Control) & GpioControl::Enable.mask() as u32 != 0
    }

    fn trigger_index(reg: Register) -> Option<usize> {
        match reg {
            Register::Utrig1Control | Register::Utrig1Status => Some(0),
            Register::Utrig2Control | Register::Utrig2Status => Some(1),
            _ => None,
        }
    }

    fn store(&mut self, reg: Register, value: u32) {
        self.regs[reg.id() as usize] = value;
    }

    fn on_write(&mut self, reg: Register, value: u32) {
        match reg {
            Register::UtxDataIn => self.utx_fifo.push(value as u8),
            Register::UtxPacketSizeHigh => {
                let low = self.register(Register::UtxPacketSizeLow) as u16 & 0xff;
                self.utx_sizes.push(low | ((value as u16 & 0xff) << 8));
            }
            Register::Gpio1Select => self.gpio_selects.push(value as u8),
            _ => {}
        }
    }

    /// Handles a rising edge on `bit` of `reg`
    fn on_strobe(&mut self, reg: Register, bit: u8) {
        match reg {
            Register::FiControl => match bit {
                b if b == FiControl::WriteEnable.bit() => self.fi_memory.commit(&self.regs),
                b if b == FiControl::Arm.bit() => self.fi_arm_count += 1,
                b if b == FiControl::Trigger.bit() => self.fi_trigger_count += 1,
                _ => {}
            },
            Register::UtimingControl if bit == UtimingControl::WriteEnable.bit() => {
                self.utiming_memory.commit(&self.regs)
            }
            Register::UtxControl => match bit {
                b if b == UtxControl::Start.bit() => {
                    let transmission = Transmission {
                        data: std::mem::take(&mut self.utx_fifo),
                        sizes: std::mem::take(&mut self.utx_sizes),
                    };
                    log::debug!("Emulated UTX transmission: {:?}", transmission);
                    self.transmissions.push(transmission);
                }
                b if b == UtxControl::Clear.bit() => {
                    self.utx_fifo.clear();
                    self.utx_sizes.clear();
                }
                _ => {}
            },
            Register::UrxControl if bit == UrxControl::Clear.bit() => self.urx_packets.clear(),
            Register::Utrig1Control | Register::Utrig2Control => {
                let Some(i) = Self::trigger_index(reg) else {
                    return;
                };
                if bit == UtrigControl::Arm.bit() {
                    self.trigger_armed[i] = true;
                    self.trigger_fired[i] = false;
                } else if bit == UtrigControl::Force.bit() {
                    self.trigger_fired[i] = true;
                }
            }
            Register::Gpio1Control if bit == GpioControl::Clear.bit() => {
                self.gpio_selects.clear()
            }
            _ => {}
        }
    }

    fn trigger_status(&mut self, i: usize) -> u8 {
        // A character on the line fires both armed triggers and lands in the URX
        if self.trigger_armed[i] && !self.trigger_fired[i] {
            if let Some(packet) = self.line.pop_front() {
                self.urx_packets.push_back(packet);
                for t in 0..2 {
                    if self.trigger_armed[t] {
                        self.trigger_fired[t] = true;
                    }
                }
            }
        }
        let mut status = 0;
        if self.trigger_armed[i] && !self.trigger_fired[i] {
            status |= UtrigStatusBit::Armed.mask();
        }
        if self.trigger_fired[i] {
            status |= UtrigStatusBit::Triggered.mask();
        }
        status
    }

    fn urx_read(&mut self, reg: Register) -> u8 {
        match reg {
            Register::UrxPacketCount => self.urx_packets.len() as u8,
            Register::UrxPacketSizeOutLow => self
                .urx_packets
                .front()
                .map_or(0, |p| p.bits.to_le_bytes()[0]),
            Register::UrxPacketSizeOutHigh => self
                .urx_packets
                .front()
                .map_or(0, |p| p.bits.to_le_bytes()[1]),
            Register::UrxDataOut => {
                let Some(packet) = self.urx_packets.front_mut() else {
                    return 0;
                };
                let byte = packet.data.pop_front().unwrap_or(0);
                if packet.data.is_empty() {
                    self.urx_packets.pop_front();
                }
                byte
            }
            _ => 0,
        }
    }
}

impl RegisterInterface for Emulator {
    fn clock(&self) -> ClockConstants {
        self.clock
    }

    fn read_register(&mut self, reg: Register) -> u8 {
        self.traffic.push(Access::Read(reg));
        match reg {
            Register::FiStatus | Register::UtimingStatus | Register::UrxStatus => 0x01,
            Register::UtxStatus => {
                if self.utx_busy_reads > 0 {
                    self.utx_busy_reads -= 1;
                    0x02
                } else {
                    0x01
                }
            }
            Register::UtxPacketCount => self.transmissions.len() as u8,
            Register::FiDataOut => {
                let addr = self.fi_memory.address(&self.regs);
                self.fi_memory.bytes[addr]
            }
            Register::Utrig1Status | Register::Utrig2Status => {
                let i = Self::trigger_index(reg).unwrap_or_default();
                self.trigger_status(i)
            }
            Register::UrxPacketCount
            | Register::UrxPacketSizeOutLow
            | Register::UrxPacketSizeOutHigh
            | Register::UrxDataOut => self.urx_read(reg),
            _ => self.register(reg) as u8,
        }
    }

    fn write_register(&mut self, reg: Register, value: u8) {
        self.traffic.push(Access::Write(reg, value as u32));
        self.store(reg, value as u32);
        self.on_write(reg, value as u32);
    }

    fn write_register16(&mut self, reg: Register, value: u16) {
        self.traffic.push(Access::Write(reg, value as u32));
        self.store(reg, value as u32);
    }

    fn write_register32(&mut self, reg: Register, value: u32) {
        self.traffic.push(Access::Write(reg, value));
        self.store(reg, value);
    }

    fn set_bit_register(&mut self, reg: Register, bit: u8, state: bool) {
        self.traffic.push(Access::SetBit(reg, bit, state));
        let old = self.register(reg);
        let mask = 1u32 << bit;
        let new = if state { old | mask } else { old & !mask };
        self.store(reg, new);
        if old & mask == 0 && state {
            self.on_strobe(reg, bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_commits_on_rising_edge_only() {
        let mut emu = Emulator::new();
        emu.write_register(Register::FiAddrLow, 5);
        emu.write_register(Register::FiDataIn, 0xab);
        emu.set_bit_register(Register::FiControl, 0, false);
        assert_eq!(emu.fi_memory.bytes[5], 0);
        emu.rising_edge_register(Register::FiControl, 0);
        assert_eq!(emu.fi_memory.bytes[5], 0xab);
        assert_eq!(emu.read_register(Register::FiDataOut), 0xab);
    }

    #[test]
    fn transmission_bits_follow_size_order() {
        let transmission = Transmission {
            data: vec![0b1010_0000, 0b1100_0000],
            // written last-first: the first packet has 3 bits, the second 2
            sizes: vec![2, 3],
        };
        let bits: Vec<bool> = transmission.bits().iter().collect();
        assert_eq!(bits, vec![true, false, true, true, true]);
    }

    #[test]
    fn gpio_shift_register() {
        let mut emu = Emulator::new();
        for value in (0..8).rev() {
            emu.write_register(Register::Gpio1Select, value);
        }
        assert_eq!(emu.gpio_select(GpioPin::Gpio7), Some(7));
        assert_eq!(emu.gpio_select(GpioPin::Gpio0), Some(0));
    }
}
