//! Software UART built from the universal transmitter, receiver and triggers.
//!
//! Characters are encoded on the host and shifted out by the UTX at the baud rate. For
//! reception, trigger 1 starts the URX on the falling edge of the start bit and trigger 2
//! fires one frame later, which marks the character as complete.
use std::time::Duration;

use bit_vec::BitVec;
use giant_protocol::{
    frame::FrameFormat,
    registers::{GpioPin, GpioSelect},
};

use crate::{
    Error, Result, RegisterInterface,
    config::PollConfig,
    gpio::GpioMux,
    trigger::{TriggerId, TriggerMode, UniversalTrigger},
    urx::Urx,
    utx::{OutputMode, Utx, clock_divider_bits},
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UartConfig {
    pub tx_pin: GpioPin,
    /// Without an RX pin the transceiver can only send
    pub rx_pin: Option<GpioPin>,
    pub baud_rate: u32,
    pub format: FrameFormat,
}

impl UartConfig {
    /// 8N1 transmitter on `tx_pin`
    pub fn new(tx_pin: GpioPin, baud_rate: u32) -> UartConfig {
        UartConfig {
            tx_pin,
            rx_pin: None,
            baud_rate,
            format: FrameFormat::default(),
        }
    }

    pub fn with_rx_pin(mut self, rx_pin: GpioPin) -> Self {
        self.rx_pin = Some(rx_pin);
        self
    }

    pub fn with_format(mut self, format: FrameFormat) -> Self {
        self.format = format;
        self
    }

    /// Length of one character on the line
    pub fn frame_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.format.bit_len() as f64 / self.baud_rate as f64)
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug)]
pub struct SerialTransceiver {
    config: UartConfig,
    poll: PollConfig,
    utx: Utx,
    urx: Option<Urx>,
    start_trigger: UniversalTrigger,
    stop_trigger: UniversalTrigger,
}

impl SerialTransceiver {
    /// Routes the pins and sets up UTX, URX and both universal triggers for `config`.
    pub fn configure<R: RegisterInterface + ?Sized>(
        dev: &mut R,
        mux: &mut GpioMux,
        config: UartConfig,
        poll: PollConfig,
    ) -> Result<SerialTransceiver> {
        let div = dev.clock().baud_divider(config.baud_rate);
        clock_divider_bits(div)?;
        log::info!("Using divider {} for baud rate {}", div, config.baud_rate);
        let div = div as u32;

        mux.set_pin_mux(config.tx_pin, GpioSelect::UtxDataOut);
        if let Some(rx_pin) = config.rx_pin {
            mux.set_pin_mux(rx_pin, GpioSelect::UrxDataInWithTx);
        }
        mux.update_mux_state(dev);

        let utx = Utx::new(dev, poll);
        utx.set_clock_divider(dev, div)?;
        utx.set_tx_disconnect_from_rx(dev, true);
        // UART idles high
        utx.set_output_mode(dev, OutputMode::One);

        let urx = match config.rx_pin {
            Some(_) => {
                let urx = Urx::new(dev, poll);
                urx.set_clock_divider(dev, div)?;
                urx.set_resync_falling(dev, false);
                urx.set_resync_rising(dev, false);
                urx.clear(dev);
                Some(urx)
            }
            None => None,
        };

        let start_trigger = UniversalTrigger::new(TriggerId::Trigger1);
        start_trigger.set_delay(dev, Duration::ZERO)?;
        start_trigger.set_hold_time(dev, Duration::ZERO)?;
        start_trigger.set_event_mode(dev, TriggerMode::Falling);
        start_trigger.set_output_mode(dev, TriggerMode::Rising);

        let stop_trigger = UniversalTrigger::new(TriggerId::Trigger2);
        stop_trigger.set_delay(dev, config.frame_duration())?;
        stop_trigger.set_hold_time(dev, Duration::ZERO)?;
        stop_trigger.set_event_mode(dev, TriggerMode::Falling);
        stop_trigger.set_output_mode(dev, TriggerMode::Rising);

        Ok(SerialTransceiver {
            config,
            poll,
            utx,
            urx,
            start_trigger,
            stop_trigger,
        })
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Sends a single character.
    pub fn send_value<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        value: u32,
    ) -> Result<()> {
        self.send_frames(dev, std::slice::from_ref(&value))
    }

    /// Sends all characters of `values` back to back in a single transmission.
    pub fn send_buffer<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        values: &[u32],
    ) -> Result<()> {
        self.send_frames(dev, values)
    }

    fn send_frames<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        values: &[u32],
    ) -> Result<()> {
        let format = self.config.format;
        let mut bits = BitVec::with_capacity(values.len() * format.bit_len());
        for value in values {
            format.encode_into(*value, &mut bits);
        }

        self.utx.clear(dev);
        self.utx.write_bits(dev, &bits)?;
        self.utx.send(dev);
        Ok(())
    }

    /// Waits up to `timeout` for a character and returns the raw bytes of the received
    /// packet.
    pub fn wait_for_byte<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let urx = self
            .urx
            .as_ref()
            .ok_or(Error::Unsupported("Receiving without an RX pin"))?;
        urx.clear(dev);

        self.start_trigger.arm(dev);
        self.stop_trigger.arm(dev);
        self.stop_trigger.wait_triggered(dev, &self.poll, timeout)?;

        let packet = urx.read_packet(dev);
        log::info!("Received packet with {} bytes", packet.len());
        log::debug!("Data = {:02x?}", packet);
        Ok(packet)
    }
}
