use giant_host::{
    Error,
    dac::FaultInjector,
    timing::TimingController,
};
use giant_protocol::{codec::MAX_PULSES, error::ConfigError};
use giant_tests::Emulator;

#[test]
fn clamped_pulses_read_back() {
    let mut emu = Emulator::new();
    let mut fi = FaultInjector::new();
    // 0.25 ticks/ns: 8 ns = 2 ticks (clamped to 4), 2 ns = 0 ticks (clamped to 1)
    fi.add_pulse(&mut emu, 8.0, 2.0, false).unwrap();
    fi.add_pulse(&mut emu, 1000.0, 40.0, false).unwrap();

    assert_eq!(emu.fi_word(0), 6 << 16);
    assert_eq!(emu.fi_pulses(), Some(vec![(1, 0), (247, 9)]));
}

#[test]
fn host_reads_back_what_it_wrote() {
    let mut emu = Emulator::new();
    let mut fi = TimingController::fault_injection();
    fi.add_pulse(&mut emu, 400.0, 80.0, false).unwrap();
    assert_eq!(fi.read_memory32(&mut emu, 0), Ok(4 << 16));
    assert_eq!(fi.read_memory32(&mut emu, 2), Ok(97));
    assert_eq!(fi.read_memory32(&mut emu, 3), Ok(19));
}

#[test]
fn word_behind_memory_end_is_rejected() {
    let mut emu = Emulator::new();
    let fi = TimingController::fault_injection();
    assert!(matches!(
        fi.write_memory32(&mut emu, 20000, 0xdead_beef),
        Err(Error::Config(ConfigError::OutOfRange { .. }))
    ));
    assert!(emu.traffic().is_empty());

    fi.write_memory32(&mut emu, 511, 0xdead_beef).unwrap();
    assert_eq!(emu.fi_word(511), 0xdead_beef);
    assert_eq!(fi.read_memory32(&mut emu, 511), Ok(0xdead_beef));
}

#[test]
fn clear_then_add_matches_fresh_engine() {
    let mut used = Emulator::new();
    let mut fi = FaultInjector::new();
    fi.add_pulse(&mut used, 100.0, 20.0, false).unwrap();
    fi.add_pulse(&mut used, 200.0, 30.0, false).unwrap();
    fi.clear_pulses(&mut used);
    fi.add_pulse(&mut used, 1000.0, 40.0, false).unwrap();

    let mut fresh = Emulator::new();
    let mut fresh_fi = FaultInjector::new();
    fresh_fi.add_pulse(&mut fresh, 1000.0, 40.0, false).unwrap();

    assert_eq!(used.fi_pulses(), fresh.fi_pulses());
    assert_eq!(fi.pulses(), fresh_fi.pulses());
}

#[test]
fn overwrite_replaces_last_pair_only() {
    let mut emu = Emulator::new();
    let mut fi = FaultInjector::new();
    fi.add_pulse(&mut emu, 1000.0, 40.0, false).unwrap();
    fi.add_pulse(&mut emu, 400.0, 80.0, false).unwrap();
    fi.add_pulse(&mut emu, 200.0, 8.0, true).unwrap();

    assert_eq!(emu.fi_pulses(), Some(vec![(247, 9), (47, 1)]));
}

#[test]
fn overwrite_without_pulses_fails() {
    let mut emu = Emulator::new();
    let mut fi = FaultInjector::new();
    assert!(matches!(
        fi.add_pulse(&mut emu, 1000.0, 40.0, true),
        Err(Error::Config(ConfigError::OutOfRange { min: 1, .. }))
    ));
    assert!(emu.traffic().is_empty());
}

#[test]
fn memory_holds_max_pulses() {
    let mut emu = Emulator::new();
    let mut fi = FaultInjector::new();
    for i in 0..MAX_PULSES {
        fi.add_pulse(&mut emu, 100.0 + i as f64, 20.0, false).unwrap();
    }
    assert!(fi.add_pulse(&mut emu, 100.0, 20.0, false).is_err());

    let pulses = emu.fi_pulses().unwrap();
    assert_eq!(pulses.len(), MAX_PULSES);
    assert_eq!(pulses[0], (22, 4));
    // no aliasing onto the header
    assert_eq!(emu.fi_word(0), (2 * MAX_PULSES as u32 + 2) << 16);
}

#[test]
fn utiming_has_its_own_memory() {
    let mut emu = Emulator::new();
    let mut utiming = TimingController::utiming();
    utiming.add_pulse(&mut emu, 1000.0, 40.0, false).unwrap();
    assert_eq!(emu.utiming_word(2), 247);
    assert_eq!(emu.fi_word(0), 0);
    utiming.disarm(&mut emu).unwrap();
}

#[test]
fn arm_and_trigger() {
    let mut emu = Emulator::new();
    let mut fi = FaultInjector::new();
    fi.init(&mut emu, true);
    fi.add_pulse(&mut emu, 1000.0, 40.0, false).unwrap();
    fi.arm(&mut emu);
    fi.software_trigger(&mut emu);
    assert_eq!(emu.fi_arm_count(), 1);
    assert_eq!(emu.fi_trigger_count(), 1);
    assert!(fi.status(&mut emu).is_ready());
}
