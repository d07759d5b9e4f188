//! GPIO pin multiplexer.
//!
//! Each of the eight GPIO pins can carry one internal signal. The selection is staged on
//! the host with [`GpioMux::set_pin_mux`] and transferred with [`GpioMux::update_mux_state`].
//! The select register is a shift register, so the selections are written starting
//! with the last pin.
use giant_protocol::{
    Register,
    registers::{GpioControl, GpioOutput, GpioPin, GpioSelect},
};

use crate::RegisterInterface;

#[derive(Clone, Debug)]
pub struct GpioMux {
    selections: [GpioSelect; GpioPin::COUNT],
}

impl GpioMux {
    /// Takes over the multiplexer. All pins start out floating and GPIO is disabled.
    pub fn new<R: RegisterInterface + ?Sized>(dev: &mut R) -> GpioMux {
        let mux = GpioMux {
            selections: [GpioSelect::ValueZ; GpioPin::COUNT],
        };
        mux.clear(dev);
        mux
    }

    /// Staged selection of `pin`
    pub fn selection(&self, pin: GpioPin) -> GpioSelect {
        self.selections[pin.index()]
    }

    /// Disables GPIO and resets the select shift register.
    pub fn clear<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        self.disable(dev);
        dev.rising_edge_register(Register::Gpio1Control, GpioControl::Clear.bit());
    }

    pub fn disable<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::info!("Disabling GPIO...");
        dev.set_bit_register(Register::Gpio1Control, GpioControl::Enable.bit(), false);
    }

    /// Stages `select` for `pin`. Nothing is written until [`GpioMux::update_mux_state`].
    pub fn set_pin_mux(&mut self, pin: GpioPin, select: GpioSelect) {
        self.selections[pin.index()] = select;
    }

    /// Writes the staged selections to the FPGA and enables GPIO.
    pub fn update_mux_state<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        self.clear(dev);
        for pin in GpioPin::ALL.into_iter().rev() {
            let select = self.selection(pin);
            log::info!("Setting {:?} -> {:?}", pin, select);
            dev.write_register(Register::Gpio1Select, select.bits());
        }
        log::info!("Enabling GPIO...");
        dev.set_bit_register(Register::Gpio1Control, GpioControl::Enable.bit(), true);
    }

    /// Drives one of the internal outputs that can be routed with [`GpioSelect::GpioOutput0`] etc.
    pub fn set_internal_output<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        output: GpioOutput,
        state: bool,
    ) {
        dev.set_bit_register(Register::GpioOutputs, output.bit(), state);
    }
}
