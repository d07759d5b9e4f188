//! Universal transmitter.
//!
//! The UTX shifts bits out of a FIFO at a rate set by its clock divider. Data is pushed
//! byte by byte; the number of valid bits of each pushed buffer is kept in a host-side
//! ledger and handed to the FPGA right before the transmission starts.
use bit_vec::BitVec;
use giant_protocol::{
    Register,
    codec::{pack_bits, split_packet_size},
    error::ConfigError,
    registers::{UtxControl, UtxStatusBit},
};

use crate::{Result, RegisterInterface, config::PollConfig, poll::poll_until};

/// Smallest clock divider of UTX and URX
pub const MIN_CLOCK_DIVIDER: u32 = 1;
/// Largest clock divider of UTX and URX. It is written truncated to 16 bits, i.e. as 0.
pub const MAX_CLOCK_DIVIDER: u32 = 1 << 16;

/// Checks a clock divider and returns the value written into the 16-bit register.
pub(crate) fn clock_divider_bits(div: i64) -> Result<u16> {
    ConfigError::check_range(
        "Clock divider",
        div,
        MIN_CLOCK_DIVIDER as i64,
        MAX_CLOCK_DIVIDER as i64,
    )?;
    Ok(div as u16)
}

/// Level of the output while no data is shifted out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum OutputMode {
    #[default]
    Zero,
    One,
    Tristate,
    LastValue,
}

impl OutputMode {
    /// The two-bit encoding of the mode
    pub const fn bits(self) -> u8 {
        match self {
            OutputMode::Zero => 0b00,
            OutputMode::One => 0b01,
            OutputMode::Tristate => 0b10,
            OutputMode::LastValue => 0b11,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UtxStatus(u8);

impl UtxStatus {
    pub const fn raw(&self) -> u8 {
        self.0
    }

    pub const fn is_ready(&self) -> bool {
        self.0 & UtxStatusBit::Ready.mask() != 0
    }

    pub const fn is_transmitting(&self) -> bool {
        self.0 & UtxStatusBit::Transmitting.mask() != 0
    }
}

#[derive(Clone, Debug)]
pub struct Utx {
    ledger: Vec<u16>,
    poll: PollConfig,
}

impl Utx {
    /// Takes over the transmitter. The FIFO is cleared.
    pub fn new<R: RegisterInterface + ?Sized>(dev: &mut R, poll: PollConfig) -> Utx {
        let mut utx = Utx {
            ledger: Vec::new(),
            poll,
        };
        utx.clear(dev);
        utx
    }

    /// Bit counts of the buffers written since the last clear, in write order
    pub fn ledger(&self) -> &[u16] {
        &self.ledger
    }

    /// Empties the FIFO and forgets all pending packet sizes.
    pub fn clear<R: RegisterInterface + ?Sized>(&mut self, dev: &mut R) {
        log::debug!("Clearing UTX");
        dev.rising_edge_register(Register::UtxControl, UtxControl::Clear.bit());
        self.ledger.clear();
    }

    /// Aborts a running transmission.
    pub fn stop<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        dev.rising_edge_register(Register::UtxControl, UtxControl::Stop.bit());
    }

    pub fn status<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> UtxStatus {
        UtxStatus(dev.read_register(Register::UtxStatus))
    }

    pub fn packet_count<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> u8 {
        dev.read_register(Register::UtxPacketCount)
    }

    /// Whether a one is driven high or left floating.
    pub fn set_one_as_tristate<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        state: bool,
    ) {
        log::warn!("UTX: one as tristate might not work yet");
        dev.set_bit_register(Register::UtxControl, UtxControl::OneToZ.bit(), state);
    }

    /// Whether the transmitter is internally disconnected from the receiver.
    pub fn set_tx_disconnect_from_rx<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        state: bool,
    ) {
        log::warn!("UTX: disconnecting TX from RX is untested");
        dev.set_bit_register(Register::UtxControl, UtxControl::DisconnectTxUrx.bit(), state);
    }

    /// Whether the utiming block may start a transmission.
    pub fn set_start_via_utiming<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        state: bool,
    ) {
        log::warn!("UTX: start via utiming is untested");
        dev.set_bit_register(Register::UtxControl, UtxControl::EnableUtiming.bit(), state);
    }

    /// Sets the number of normal-mode clock cycles per bit minus one.
    pub fn set_clock_divider<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        div: u32,
    ) -> Result<()> {
        let bits = clock_divider_bits(div as i64)?;
        dev.write_register16(Register::UtxClockDivider, bits);
        Ok(())
    }

    pub fn set_output_mode<R: RegisterInterface + ?Sized>(&self, dev: &mut R, mode: OutputMode) {
        let bits = mode.bits();
        let out_mode0 = UtxControl::OutMode0.bit();
        let out_mode1 = UtxControl::OutMode1.bit();
        dev.set_bit_register(Register::UtxControl, out_mode0, bits & 0b01 != 0);
        dev.set_bit_register(Register::UtxControl, out_mode1, bits & 0b10 != 0);
    }

    /// Pushes a single byte into the FIFO.
    pub fn write<R: RegisterInterface + ?Sized>(&self, dev: &mut R, byte: u8) {
        dev.write_register(Register::UtxDataIn, byte);
    }

    pub fn is_idle<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> bool {
        self.status(dev).is_ready()
    }

    /// Blocks until the transmitter is idle.
    pub fn wait_ready<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> Result<()> {
        poll_until(&self.poll, self.poll.timeout, "UTX ready", || {
            self.is_idle(dev)
        })
    }

    /// Pushes a buffer into the FIFO once the transmitter is idle.
    ///
    /// `valid_bits` is the number of bits of `data` that are sent; `0` means all of them.
    pub fn write_buffer<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        data: &[u8],
        valid_bits: usize,
    ) -> Result<()> {
        let bits = if valid_bits > 0 {
            valid_bits
        } else {
            8 * data.len()
        };
        let size = u16::try_from(bits)
            .map_err(|_| ConfigError::out_of_range("Packet size", bits, 0, u16::MAX as i64))?;

        self.wait_ready(dev)?;
        log::debug!("Writing {} bytes ({} bits) to UTX", data.len(), size);
        for byte in data {
            self.write(dev, *byte);
        }
        self.ledger.push(size);
        Ok(())
    }

    /// Pushes a bit sequence, packed MSB first, with its exact length.
    pub fn write_bits<R: RegisterInterface + ?Sized>(
        &mut self,
        dev: &mut R,
        bits: &BitVec,
    ) -> Result<()> {
        log::info!("Will write {} bits", bits.len());
        if bits.is_empty() {
            return Ok(());
        }
        self.write_buffer(dev, &pack_bits(bits), bits.len())
    }

    /// Hands the packet sizes to the FPGA, last written first.
    fn write_sizes<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        for size in self.ledger.iter().rev() {
            let (low, high) = split_packet_size(*size);
            dev.write_register(Register::UtxPacketSizeLow, low);
            dev.write_register(Register::UtxPacketSizeHigh, high);
        }
    }

    /// Starts transmitting everything in the FIFO. The ledger is kept; call
    /// [`Utx::clear`] before reusing the transmitter.
    pub fn send<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::debug!("Sending {} UTX packets", self.ledger.len());
        self.write_sizes(dev);
        dev.rising_edge_register(Register::UtxControl, UtxControl::Start.bit());
    }
}
