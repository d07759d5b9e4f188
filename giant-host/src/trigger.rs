//! Universal triggers.
//!
//! A universal trigger watches an input for an event, waits for a programmable delay and
//! then asserts its output for a programmable hold time. There are two of them.
use std::time::Duration;

use giant_protocol::{
    Register,
    error::ConfigError,
    registers::{UtrigControl, UtrigStatusBit},
};

use crate::{Result, RegisterInterface, config::PollConfig, poll::poll_until};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TriggerId {
    Trigger1,
    Trigger2,
}

impl TryFrom<u8> for TriggerId {
    type Error = ConfigError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(TriggerId::Trigger1),
            1 => Ok(TriggerId::Trigger2),
            _ => Err(ConfigError::out_of_range("Trigger index", value, 0, 1)),
        }
    }
}

/// Input event the trigger waits for, or the shape of its output.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TriggerMode {
    #[default]
    Off,
    High,
    Low,
    Rising,
    Falling,
    Change,
}

impl TriggerMode {
    /// The three-bit encoding of the mode
    pub const fn bits(self) -> u8 {
        match self {
            TriggerMode::Off => 0,
            TriggerMode::High => 1,
            TriggerMode::Low => 2,
            TriggerMode::Rising => 3,
            TriggerMode::Falling => 4,
            TriggerMode::Change => 5,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct TriggerRegisters {
    control: Register,
    status: Register,
    delay: Register,
    hold: Register,
}

impl TriggerRegisters {
    const fn of(id: TriggerId) -> TriggerRegisters {
        match id {
            TriggerId::Trigger1 => TriggerRegisters {
                control: Register::Utrig1Control,
                status: Register::Utrig1Status,
                delay: Register::Utrig1Delay,
                hold: Register::Utrig1Hold,
            },
            TriggerId::Trigger2 => TriggerRegisters {
                control: Register::Utrig2Control,
                status: Register::Utrig2Status,
                delay: Register::Utrig2Delay,
                hold: Register::Utrig2Hold,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UniversalTrigger {
    id: TriggerId,
    regs: TriggerRegisters,
}

impl UniversalTrigger {
    pub const fn new(id: TriggerId) -> UniversalTrigger {
        UniversalTrigger {
            id,
            regs: TriggerRegisters::of(id),
        }
    }

    /// Trigger by zero based index
    pub fn from_index(index: u8) -> Result<UniversalTrigger> {
        Ok(Self::new(TriggerId::try_from(index)?))
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn status<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> u8 {
        dev.read_register(self.regs.status)
    }

    pub fn is_armed<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> bool {
        self.status(dev) & UtrigStatusBit::Armed.mask() != 0
    }

    pub fn has_triggered<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> bool {
        self.status(dev) & UtrigStatusBit::Triggered.mask() != 0
    }

    /// Selects the shape of the output pulse.
    pub fn set_output_mode<R: RegisterInterface + ?Sized>(&self, dev: &mut R, mode: TriggerMode) {
        self.write_mode(
            dev,
            mode,
            [
                UtrigControl::OutputMode0,
                UtrigControl::OutputMode1,
                UtrigControl::OutputMode2,
            ],
        );
    }

    /// Selects the input event that fires the trigger.
    pub fn set_event_mode<R: RegisterInterface + ?Sized>(&self, dev: &mut R, mode: TriggerMode) {
        self.write_mode(
            dev,
            mode,
            [
                UtrigControl::InputMode0,
                UtrigControl::InputMode1,
                UtrigControl::InputMode2,
            ],
        );
    }

    fn write_mode<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        mode: TriggerMode,
        fields: [UtrigControl; 3],
    ) {
        let bits = mode.bits();
        for (i, field) in fields.into_iter().enumerate() {
            dev.set_bit_register(self.regs.control, field.bit(), (bits >> i) & 1 != 0);
        }
    }

    /// Time between the input event and the output assertion
    pub fn set_delay<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        delay: Duration,
    ) -> Result<()> {
        let ticks = dev.clock().duration_to_ticks("Trigger delay", delay)?;
        log::debug!("{:?}: delay {:?} = {} ticks", self.id, delay, ticks);
        dev.write_register32(self.regs.delay, ticks);
        Ok(())
    }

    /// Time the output stays asserted
    pub fn set_hold_time<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        hold: Duration,
    ) -> Result<()> {
        let ticks = dev.clock().duration_to_ticks("Trigger hold time", hold)?;
        log::debug!("{:?}: hold {:?} = {} ticks", self.id, hold, ticks);
        dev.write_register32(self.regs.hold, ticks);
        Ok(())
    }

    pub fn software_trigger<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        dev.rising_edge_register(self.regs.control, UtrigControl::Force.bit());
    }

    pub fn arm<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::debug!("Arming {:?}", self.id);
        dev.rising_edge_register(self.regs.control, UtrigControl::Arm.bit());
    }

    /// Polls the status until the trigger has fired or `timeout` has passed.
    pub fn wait_triggered<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        poll: &PollConfig,
        timeout: Duration,
    ) -> Result<()> {
        poll_until(poll, timeout, "universal trigger", || self.has_triggered(dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        test_utils::{Access, RecordingRegisters, strobe},
    };

    #[test]
    fn only_two_triggers() {
        assert_eq!(
            UniversalTrigger::from_index(1).map(|t| t.id()),
            Ok(TriggerId::Trigger2)
        );
        assert_eq!(
            UniversalTrigger::from_index(2),
            Err(Error::Config(ConfigError::OutOfRange {
                name: "Trigger index",
                value: 2,
                min: 0,
                max: 1
            }))
        );
    }

    #[rstest::rstest]
    #[case(TriggerMode::Off, [false, false, false])]
    #[case(TriggerMode::Rising, [true, true, false])]
    #[case(TriggerMode::Falling, [false, false, true])]
    #[case(TriggerMode::Change, [true, false, true])]
    fn event_mode_is_three_bit_writes(#[case] mode: TriggerMode, #[case] expected: [bool; 3]) {
        let mut dev = RecordingRegisters::new();
        UniversalTrigger::new(TriggerId::Trigger2).set_event_mode(&mut dev, mode);
        assert_eq!(
            dev.log,
            vec![
                Access::SetBit(Register::Utrig2Control, 2, expected[0]),
                Access::SetBit(Register::Utrig2Control, 3, expected[1]),
                Access::SetBit(Register::Utrig2Control, 4, expected[2]),
            ]
        );
    }

    #[test]
    fn output_mode_uses_upper_bits() {
        let mut dev = RecordingRegisters::new();
        UniversalTrigger::new(TriggerId::Trigger1).set_output_mode(&mut dev, TriggerMode::High);
        assert_eq!(
            dev.log,
            vec![
                Access::SetBit(Register::Utrig1Control, 5, true),
                Access::SetBit(Register::Utrig1Control, 6, false),
                Access::SetBit(Register::Utrig1Control, 7, false),
            ]
        );
    }

    #[test]
    fn delay_and_hold_in_clock_ticks() {
        let mut dev = RecordingRegisters::new();
        let trigger = UniversalTrigger::new(TriggerId::Trigger2);
        // 10 bits at 115200 baud with a 100 MHz clock
        trigger
            .set_delay(&mut dev, Duration::from_secs_f64(10.0 / 115200.0))
            .unwrap();
        trigger.set_hold_time(&mut dev, Duration::ZERO).unwrap();
        assert_eq!(
            dev.log,
            vec![
                Access::Write32(Register::Utrig2Delay, 8681),
                Access::Write32(Register::Utrig2Hold, 0),
            ]
        );
    }

    #[test]
    fn delay_overflow() {
        let mut dev = RecordingRegisters::new();
        let trigger = UniversalTrigger::new(TriggerId::Trigger1);
        assert!(matches!(
            trigger.set_delay(&mut dev, Duration::from_secs(60)),
            Err(Error::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(dev.log.is_empty());
    }

    #[test]
    fn arm_and_force() {
        let mut dev = RecordingRegisters::new();
        let trigger = UniversalTrigger::new(TriggerId::Trigger1);
        trigger.arm(&mut dev);
        trigger.software_trigger(&mut dev);
        let mut expected = strobe(Register::Utrig1Control, 0).to_vec();
        expected.extend(strobe(Register::Utrig1Control, 1));
        assert_eq!(dev.log, expected);
    }

    #[test]
    fn wait_triggered_polls_status() {
        let mut dev = RecordingRegisters::new();
        dev.script(Register::Utrig2Status, &[0b01, 0b01]);
        dev.set_default(Register::Utrig2Status, 0b11);
        let trigger = UniversalTrigger::new(TriggerId::Trigger2);
        assert!(trigger.is_armed(&mut dev));
        trigger
            .wait_triggered(&mut dev, &PollConfig::default(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(dev.log.len(), 3);

        let mut idle = RecordingRegisters::new();
        assert!(matches!(
            trigger.wait_triggered(&mut idle, &PollConfig::default(), Duration::from_millis(2)),
            Err(Error::Timeout { .. })
        ));
    }
}
