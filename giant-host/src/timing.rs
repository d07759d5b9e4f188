//! Pulse timing controllers.
//!
//! A timing block is a pulse generator with its own pulse memory. The host keeps the list
//! of pulses and rewrites the whole [`MemoryImage`] every time the list changes; memory is
//! only reachable through an address/data/strobe register triplet, one byte at a time.
use giant_protocol::{
    Pulse, Register,
    codec::{MAX_PULSES, MemoryImage, MemoryWord, check_byte_address, split_address},
    error::ConfigError,
    registers::{FiControl, TimingStatusBit, UtimingControl},
};

use crate::{Error, RegisterInterface, Result};

/// Registers and control bits of one timing block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingBlock {
    pub addr_low: Register,
    pub addr_high: Register,
    pub data_in: Register,
    /// Not every block can read its memory back
    pub data_out: Option<Register>,
    pub control: Register,
    pub status: Register,
    pub write_enable_bit: u8,
    pub arm_bit: u8,
    pub trigger_bit: u8,
    pub disarm_bit: Option<u8>,
}

impl TimingBlock {
    /// The glitch pulse generator driving the DAC
    pub const FAULT_INJECTION: TimingBlock = TimingBlock {
        addr_low: Register::FiAddrLow,
        addr_high: Register::FiAddrHigh,
        data_in: Register::FiDataIn,
        data_out: Some(Register::FiDataOut),
        control: Register::FiControl,
        status: Register::FiStatus,
        write_enable_bit: FiControl::WriteEnable.bit(),
        arm_bit: FiControl::Arm.bit(),
        trigger_bit: FiControl::Trigger.bit(),
        disarm_bit: None,
    };

    /// The general purpose timing generator
    pub const UTIMING: TimingBlock = TimingBlock {
        addr_low: Register::UtimingAddrLow,
        addr_high: Register::UtimingAddrHigh,
        data_in: Register::UtimingDataIn,
        data_out: None,
        control: Register::UtimingControl,
        status: Register::UtimingStatus,
        write_enable_bit: UtimingControl::WriteEnable.bit(),
        arm_bit: UtimingControl::Arm.bit(),
        trigger_bit: UtimingControl::Trigger.bit(),
        disarm_bit: Some(UtimingControl::Disarm.bit()),
    };
}

/// Decoded status register of a timing block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingStatus(u8);

impl TimingStatus {
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// The block is idle and can be reprogrammed
    pub const fn is_ready(&self) -> bool {
        self.0 & TimingStatusBit::Ready.mask() != 0
    }

    /// The block waits for its trigger
    pub const fn is_armed(&self) -> bool {
        self.0 & TimingStatusBit::Armed.mask() != 0
    }
}

/// Host side of a timing block: the pulse list and its memory image.
#[derive(Clone, Debug)]
pub struct TimingController {
    block: TimingBlock,
    pulses: Vec<Pulse>,
}

impl TimingController {
    pub fn new(block: TimingBlock) -> TimingController {
        TimingController {
            block,
            pulses: Vec::new(),
        }
    }

    pub fn fault_injection() -> TimingController {
        Self::new(TimingBlock::FAULT_INJECTION)
    }

    pub fn utiming() -> TimingController {
        Self::new(TimingBlock::UTIMING)
    }

    pub fn block(&self) -> &TimingBlock {
        &self.block
    }

    /// Pulses as currently programmed
    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Adds a pulse to the sequence, or replaces the last one if `overwrite` is set,
    /// and rewrites pulse memory.
    ///
    /// `offset_ns` is relative to the trigger edge for the first pulse and to the end of
    /// the previous pulse otherwise. Values the hardware cannot produce are raised to the
    /// minimum with a warning. Returns the pulse as stored in memory.
    pub fn add_pulse<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        offset_ns: f64,
        width_ns: f64,
        overwrite: bool,
    ) -> Result<Pulse> {
        log::debug!("Adding pulse at {} ns: width {} ns", offset_ns, width_ns);
        if overwrite && self.pulses.is_empty() {
            // there is no last pulse to replace
            return Err(ConfigError::out_of_range(
                "Number of stored pulses",
                0,
                1,
                MAX_PULSES as i64,
            )
            .into());
        }
        if !overwrite && self.pulses.len() >= MAX_PULSES {
            return Err(ConfigError::out_of_range(
                "Number of pulses",
                self.pulses.len() + 1,
                0,
                MAX_PULSES as i64,
            )
            .into());
        }

        let (pulse, clamped) = Pulse::from_ns(&dev.clock(), offset_ns, width_ns);
        if clamped.offset {
            log::warn!("Requested delay shorter than minimum, truncating to minimum");
        }
        if clamped.width {
            log::warn!("Requested width shorter than minimum, truncating to minimum");
        }

        match self.pulses.last_mut() {
            Some(last) if overwrite => *last = pulse,
            _ => self.pulses.push(pulse),
        }

        self.write_image(dev)?;
        Ok(pulse)
    }

    /// Removes all pulses. Only the header is rewritten; the old table stays in memory
    /// but lies behind the announced end.
    pub fn clear_pulses<R: RegisterInterface + ?Sized>(&mut self, dev: &mut R) {
        log::debug!("Clearing {} pulses", self.pulses.len());
        self.pulses.clear();
        self.write_word(dev, MemoryImage::EMPTY.header());
    }

    fn write_image<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> Result<()> {
        let image = MemoryImage::new(&self.pulses)?;
        log::debug!(
            "Writing pulse memory: {} pulses, end offset {}",
            self.pulses.len(),
            image.end_offset()
        );
        for word in image.words() {
            self.write_word(dev, word);
        }
        Ok(())
    }

    fn write_word<R: RegisterInterface + ?Sized>(&self, dev: &mut R, word: MemoryWord) {
        log::trace!("Pulse memory[{}] = 0x{:08x}", word.addr(), word.value());
        for (addr, byte) in word.bytes() {
            self.write_byte(dev, addr, byte);
        }
    }

    fn write_byte<R: RegisterInterface + ?Sized>(&self, dev: &mut R, addr: u16, value: u8) {
        let (low, high) = split_address(addr);
        dev.write_register(self.block.addr_low, low);
        dev.write_register(self.block.addr_high, high);
        dev.write_register(self.block.data_in, value);
        dev.rising_edge_register(self.block.control, self.block.write_enable_bit);
    }

    /// Writes a single byte of pulse memory.
    pub fn write_memory8<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        addr: u16,
        value: u8,
    ) -> Result<()> {
        self.write_byte(dev, check_byte_address(addr)?, value);
        Ok(())
    }

    /// Reads a single byte of pulse memory.
    pub fn read_memory8<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        addr: u16,
    ) -> Result<u8> {
        let data_out = self
            .block
            .data_out
            .ok_or(Error::Unsupported("Reading pulse memory"))?;
        let (low, high) = split_address(check_byte_address(addr)?);
        dev.write_register(self.block.addr_low, low);
        dev.write_register(self.block.addr_high, high);
        Ok(dev.read_register(data_out))
    }

    /// Writes a 32-bit word at word address `addr`, least significant byte first.
    pub fn write_memory32<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        addr: u16,
        value: u32,
    ) -> Result<()> {
        self.write_word(dev, MemoryWord::new(addr, value)?);
        Ok(())
    }

    /// Reads the 32-bit word at word address `addr`.
    pub fn read_memory32<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        addr: u16,
    ) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for ((byte_addr, _), byte) in MemoryWord::new(addr, 0)?.bytes().zip(bytes.iter_mut()) {
            *byte = self.read_memory8(dev, byte_addr)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Arms the block: the pulse sequence starts at the next trigger edge.
    pub fn arm<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::debug!("Arming timing block");
        dev.rising_edge_register(self.block.control, self.block.arm_bit);
    }

    /// Starts the pulse sequence immediately, regardless of the trigger input.
    pub fn software_trigger<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::debug!("Software trigger");
        dev.rising_edge_register(self.block.control, self.block.trigger_bit);
    }

    /// Leaves the armed state without firing.
    pub fn disarm<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> Result<()> {
        let bit = self
            .block
            .disarm_bit
            .ok_or(Error::Unsupported("Disarming this timing block"))?;
        dev.rising_edge_register(self.block.control, bit);
        Ok(())
    }

    pub fn status<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> TimingStatus {
        TimingStatus(dev.read_register(self.block.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Access, RecordingRegisters, strobe};

    /// Expected accesses for writing `value` to the fault-injection memory word `addr`
    fn fi_word(addr: u16, value: u32) -> Vec<Access> {
        value
            .to_le_bytes()
            .into_iter()
            .enumerate()
            .flat_map(|(b, byte)| {
                let byte_addr = 4 * addr + b as u16;
                let mut accesses = vec![
                    Access::Write(Register::FiAddrLow, (byte_addr & 0xff) as u8),
                    Access::Write(Register::FiAddrHigh, ((byte_addr >> 8) & 0x7) as u8),
                    Access::Write(Register::FiDataIn, byte),
                ];
                accesses.extend(strobe(Register::FiControl, 0));
                accesses
            })
            .collect()
    }

    #[test]
    fn add_pulse_writes_header_then_pulses() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        // 0.25 ticks per ns: 1000 ns = 250 ticks, 40 ns = 10 ticks
        let pulse = fi.add_pulse(&mut dev, 1000.0, 40.0, false).unwrap();
        assert_eq!(pulse, Pulse::from_ticks(247, 9));

        let mut expected = fi_word(0, 4 << 16);
        expected.extend(fi_word(2, 247));
        expected.extend(fi_word(3, 9));
        assert_eq!(dev.take_log(), expected);
    }

    #[test]
    fn every_mutation_rewrites_full_image() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        fi.add_pulse(&mut dev, 1000.0, 40.0, false).unwrap();
        dev.take_log();
        fi.add_pulse(&mut dev, 400.0, 80.0, false).unwrap();

        let mut expected = fi_word(0, 6 << 16);
        expected.extend(fi_word(2, 247));
        expected.extend(fi_word(3, 9));
        expected.extend(fi_word(4, 97));
        expected.extend(fi_word(5, 19));
        assert_eq!(dev.take_log(), expected);
    }

    #[test]
    fn overwrite_replaces_last_pulse() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        fi.add_pulse(&mut dev, 1000.0, 40.0, false).unwrap();
        fi.add_pulse(&mut dev, 400.0, 80.0, false).unwrap();
        fi.add_pulse(&mut dev, 200.0, 8.0, true).unwrap();
        assert_eq!(
            fi.pulses(),
            &[Pulse::from_ticks(247, 9), Pulse::from_ticks(47, 1)]
        );
    }

    #[test]
    fn overwrite_on_empty_list_fails_without_traffic() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        assert!(matches!(
            fi.add_pulse(&mut dev, 1000.0, 40.0, true),
            Err(Error::Config(ConfigError::OutOfRange {
                value: 0,
                min: 1,
                ..
            }))
        ));
        assert!(dev.log.is_empty());
        assert!(fi.pulses().is_empty());
    }

    #[test]
    fn pulse_memory_is_bounded() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        for _ in 0..MAX_PULSES {
            fi.pulses.push(Pulse::default());
        }
        assert!(matches!(
            fi.add_pulse(&mut dev, 1000.0, 40.0, false),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        // replacing the last pulse still works
        fi.add_pulse(&mut dev, 1000.0, 40.0, true).unwrap();
        assert_eq!(fi.pulses().len(), MAX_PULSES);
    }

    #[test]
    fn clear_rewrites_header_only() {
        let mut dev = RecordingRegisters::new();
        let mut fi = TimingController::fault_injection();
        fi.add_pulse(&mut dev, 1000.0, 40.0, false).unwrap();
        dev.take_log();
        fi.clear_pulses(&mut dev);
        assert_eq!(dev.take_log(), fi_word(0, 2 << 16));
        assert!(fi.pulses().is_empty());
    }

    #[test]
    fn arm_and_trigger_are_strobes() {
        let mut dev = RecordingRegisters::new();
        let fi = TimingController::fault_injection();
        fi.arm(&mut dev);
        fi.software_trigger(&mut dev);
        let mut expected = strobe(Register::FiControl, 1).to_vec();
        expected.extend(strobe(Register::FiControl, 2));
        assert_eq!(dev.take_log(), expected);
    }

    #[test]
    fn disarm_only_on_utiming() {
        let mut dev = RecordingRegisters::new();
        assert_eq!(
            TimingController::fault_injection().disarm(&mut dev),
            Err(Error::Unsupported("Disarming this timing block"))
        );
        TimingController::utiming().disarm(&mut dev).unwrap();
        assert_eq!(dev.take_log(), strobe(Register::UtimingControl, 3).to_vec());
    }

    #[test]
    fn read_memory32_assembles_little_endian() {
        let mut dev = RecordingRegisters::new();
        dev.script(Register::FiDataOut, &[0x44, 0x33, 0x22, 0x11]);
        let fi = TimingController::fault_injection();
        assert_eq!(fi.read_memory32(&mut dev, 2), Ok(0x1122_3344));
        assert_eq!(
            &dev.log[..3],
            &[
                Access::Write(Register::FiAddrLow, 8),
                Access::Write(Register::FiAddrHigh, 0),
                Access::Read(Register::FiDataOut),
            ]
        );
        assert_eq!(
            TimingController::utiming().read_memory8(&mut dev, 0),
            Err(Error::Unsupported("Reading pulse memory"))
        );
    }

    #[test]
    fn memory_access_behind_end_fails_without_traffic() {
        let mut dev = RecordingRegisters::new();
        let fi = TimingController::fault_injection();
        assert!(matches!(
            fi.write_memory32(&mut dev, 20000, 0xdead_beef),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            fi.read_memory32(&mut dev, 512),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            fi.write_memory8(&mut dev, 2048, 0xff),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            fi.read_memory8(&mut dev, u16::MAX),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(dev.log.is_empty());

        fi.write_memory32(&mut dev, 511, 0x1122_3344).unwrap();
        assert_eq!(dev.take_log(), fi_word(511, 0x1122_3344));
    }

    #[rstest::rstest]
    #[case(0b00, false, false)]
    #[case(0b01, true, false)]
    #[case(0b10, false, true)]
    #[case(0b11, true, true)]
    fn status_bits(#[case] raw: u8, #[case] ready: bool, #[case] armed: bool) {
        let mut dev = RecordingRegisters::new();
        dev.set_default(Register::FiStatus, raw);
        let status = TimingController::fault_injection().status(&mut dev);
        assert_eq!(status.is_ready(), ready);
        assert_eq!(status.is_armed(), armed);
        assert_eq!(status.raw(), raw);
    }
}
