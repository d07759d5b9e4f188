//! Fault injection: the glitch DAC and its pulse generator.
//!
//! The DAC drives the target supply. Between pulses it outputs the normal voltage,
//! during a pulse the fault voltage and while disabled the off voltage. Voltages are
//! raw 8-bit DAC codes; the mapping to volts depends on the analog front end.
use giant_protocol::{
    Pulse, Register,
    registers::{DacControl, FiTriggerSource, FiUniversalTriggerSource},
};

use crate::{
    Result, RegisterInterface,
    timing::{TimingController, TimingStatus},
};

#[derive(Clone, Debug)]
pub struct FaultInjector {
    timing: TimingController,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultInjector {
    pub fn new() -> FaultInjector {
        FaultInjector {
            timing: TimingController::fault_injection(),
        }
    }

    /// The pulse generator behind the DAC
    pub fn timing(&self) -> &TimingController {
        &self.timing
    }

    /// Power-on sequence: enables the DAC in normal mode, drops all pulses and fires on
    /// the external trigger input.
    pub fn init<R: RegisterInterface + ?Sized>(&mut self, dev: &mut R, falling_edge: bool) {
        log::debug!("Initializing fault injection (falling edge: {})", falling_edge);
        self.set_enabled(dev, true);
        self.set_test_mode_enabled(dev, false);
        self.set_rfid_mode_enabled(dev, false);
        self.clear_pulses(dev);
        self.set_trigger_source_enabled(dev, FiTriggerSource::Ext1, false);
        self.set_trigger_on_falling_edge(dev, falling_edge);
        self.set_trigger_source_enabled(dev, FiTriggerSource::Ext1, true);
    }

    /// See [`TimingController::add_pulse`]
    pub fn add_pulse<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        offset_ns: f64,
        width_ns: f64,
        overwrite: bool,
    ) -> Result<Pulse> {
        self.timing.add_pulse(dev, offset_ns, width_ns, overwrite)
    }

    pub fn clear_pulses<R: RegisterInterface + ?Sized>(&mut self, dev: &mut R) {
        self.timing.clear_pulses(dev);
    }

    pub fn pulses(&self) -> &[Pulse] {
        self.timing.pulses()
    }

    pub fn arm<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        self.timing.arm(dev);
    }

    pub fn software_trigger<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        self.timing.software_trigger(dev);
    }

    pub fn status<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> TimingStatus {
        self.timing.status(dev)
    }

    /// DAC code during a pulse
    pub fn set_fault_voltage<R: RegisterInterface + ?Sized>(&self, dev: &mut R, code: u8) {
        dev.write_register(Register::DacVHigh, code);
    }

    /// DAC code between pulses
    pub fn set_normal_voltage<R: RegisterInterface + ?Sized>(&self, dev: &mut R, code: u8) {
        dev.write_register(Register::DacVLow, code);
    }

    /// DAC code while the target is switched off
    pub fn set_off_voltage<R: RegisterInterface + ?Sized>(&self, dev: &mut R, code: u8) {
        dev.write_register(Register::DacVOff, code);
    }

    pub fn set_enabled<R: RegisterInterface + ?Sized>(&self, dev: &mut R, on: bool) {
        dev.set_bit_register(Register::DacControl, DacControl::Enable.bit(), on);
    }

    /// In test mode the DAC sweeps from its highest to its lowest output.
    pub fn set_test_mode_enabled<R: RegisterInterface + ?Sized>(&self, dev: &mut R, on: bool) {
        dev.set_bit_register(Register::DacControl, DacControl::TestMode.bit(), on);
    }

    /// Drives the DAC from the modulated sine generator. Enabling it disables UTX mode.
    pub fn set_rfid_mode_enabled<R: RegisterInterface + ?Sized>(&self, dev: &mut R, on: bool) {
        if on {
            self.set_utx_mode_enabled(dev, false);
        }
        dev.set_bit_register(Register::DacControl, DacControl::RfidMode.bit(), on);
    }

    /// Switches the DAC to the off voltage on every zero sent by the UTX.
    /// Enabling it disables RFID mode.
    pub fn set_utx_mode_enabled<R: RegisterInterface + ?Sized>(&self, dev: &mut R, on: bool) {
        if on {
            self.set_rfid_mode_enabled(dev, false);
        }
        dev.set_bit_register(Register::DacControl, DacControl::UtxMode.bit(), on);
    }

    pub fn set_trigger_source_enabled<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        source: FiTriggerSource,
        on: bool,
    ) {
        dev.set_bit_register(Register::FiTriggerControl, source.bit(), on);
    }

    /// Selects what drives the [`FiTriggerSource::Universal`] input.
    pub fn set_universal_trigger_source_enabled<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        source: FiUniversalTriggerSource,
        on: bool,
    ) {
        dev.set_bit_register(Register::FiUniversalTriggerControl, source.bit(), on);
    }

    pub fn set_trigger_on_falling_edge<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        on: bool,
    ) {
        dev.set_bit_register(
            Register::FiTriggerControl,
            FiTriggerSource::InvertEdge.bit(),
            on,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Access, RecordingRegisters};

    #[test]
    fn init_sequence() {
        let mut dev = RecordingRegisters::new();
        let mut fi = FaultInjector::new();
        fi.add_pulse(&mut dev, 1000.0, 40.0, false).unwrap();
        dev.take_log();

        fi.init(&mut dev, true);
        assert!(fi.pulses().is_empty());

        let writes = dev.writes();
        assert_eq!(
            &writes[..3],
            &[
                Access::SetBit(Register::DacControl, 0, true),
                Access::SetBit(Register::DacControl, 1, false),
                Access::SetBit(Register::DacControl, 2, false),
            ]
        );
        // the header write sits between the mode bits and the trigger setup
        assert_eq!(writes[3], Access::Write(Register::FiAddrLow, 0));
        assert_eq!(
            &writes[writes.len() - 3..],
            &[
                Access::SetBit(Register::FiTriggerControl, 2, false),
                Access::SetBit(Register::FiTriggerControl, 7, true),
                Access::SetBit(Register::FiTriggerControl, 2, true),
            ]
        );
    }

    #[test]
    fn rfid_and_utx_are_exclusive() {
        let mut dev = RecordingRegisters::new();
        let fi = FaultInjector::new();
        fi.set_rfid_mode_enabled(&mut dev, true);
        fi.set_utx_mode_enabled(&mut dev, true);
        fi.set_utx_mode_enabled(&mut dev, false);
        assert_eq!(
            dev.log,
            vec![
                Access::SetBit(Register::DacControl, 3, false),
                Access::SetBit(Register::DacControl, 2, true),
                Access::SetBit(Register::DacControl, 2, false),
                Access::SetBit(Register::DacControl, 3, true),
                Access::SetBit(Register::DacControl, 3, false),
            ]
        );
    }

    #[test]
    fn voltage_codes() {
        let mut dev = RecordingRegisters::new();
        let fi = FaultInjector::default();
        fi.set_fault_voltage(&mut dev, 0x20);
        fi.set_normal_voltage(&mut dev, 0x80);
        fi.set_off_voltage(&mut dev, 0xff);
        assert_eq!(
            dev.log,
            vec![
                Access::Write(Register::DacVHigh, 0x20),
                Access::Write(Register::DacVLow, 0x80),
                Access::Write(Register::DacVOff, 0xff),
            ]
        );
    }

    #[test]
    fn universal_trigger_sources() {
        let mut dev = RecordingRegisters::new();
        let fi = FaultInjector::new();
        fi.set_trigger_source_enabled(&mut dev, FiTriggerSource::Universal, true);
        fi.set_universal_trigger_source_enabled(&mut dev, FiUniversalTriggerSource::Utrig1, true);
        assert_eq!(
            dev.log,
            vec![
                Access::SetBit(Register::FiTriggerControl, 1, true),
                Access::SetBit(Register::FiUniversalTriggerControl, 3, true),
            ]
        );
    }
}
