//! Universal receiver.
use giant_protocol::{
    Register,
    codec::bytes_for_bits,
    registers::{UrxControl, UrxStatusBit},
};

use crate::{
    Result, RegisterInterface, config::PollConfig, poll::poll_until, utx::clock_divider_bits,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UrxStatus(u8);

impl UrxStatus {
    pub const fn raw(&self) -> u8 {
        self.0
    }

    pub const fn is_ready(&self) -> bool {
        self.0 & UrxStatusBit::Ready.mask() != 0
    }

    pub const fn is_receiving(&self) -> bool {
        self.0 & UrxStatusBit::Receiving.mask() != 0
    }

    /// Current level of the sampled input
    pub const fn data_in(&self) -> bool {
        self.0 & UrxStatusBit::DataInSample.mask() != 0
    }
}

/// Samples an input at the rate of its clock divider and stores the bits as packets.
#[derive(Clone, Debug)]
pub struct Urx {
    poll: PollConfig,
}

impl Urx {
    /// Takes over the receiver. Pending packets are dropped.
    pub fn new<R: RegisterInterface + ?Sized>(dev: &mut R, poll: PollConfig) -> Urx {
        let urx = Urx { poll };
        urx.clear(dev);
        urx
    }

    pub fn clear<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        log::debug!("Clearing URX");
        dev.rising_edge_register(Register::UrxControl, UrxControl::Clear.bit());
    }

    pub fn force_start<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        dev.rising_edge_register(Register::UrxControl, UrxControl::Start.bit());
    }

    pub fn force_stop<R: RegisterInterface + ?Sized>(&self, dev: &mut R) {
        dev.rising_edge_register(Register::UrxControl, UrxControl::Stop.bit());
    }

    pub fn status<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> UrxStatus {
        UrxStatus(dev.read_register(Register::UrxStatus))
    }

    pub fn packet_count<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> u8 {
        dev.read_register(Register::UrxPacketCount)
    }

    /// See [`crate::utx::Utx::set_clock_divider`]
    pub fn set_clock_divider<R: RegisterInterface + ?Sized>(
        &self,
        dev: &mut R,
        div: u32,
    ) -> Result<()> {
        let bits = clock_divider_bits(div as i64)?;
        dev.write_register16(Register::UrxClockDivider, bits);
        Ok(())
    }

    pub fn is_idle<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> bool {
        self.status(dev).is_ready()
    }

    pub fn wait_ready<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> Result<()> {
        poll_until(&self.poll, self.poll.timeout, "URX ready", || {
            self.is_idle(dev)
        })
    }

    /// Pops a single byte of the current packet.
    pub fn read_byte<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> u8 {
        dev.read_register(Register::UrxDataOut)
    }

    /// Resynchronize the sampling clock on rising input edges.
    pub fn set_resync_rising<R: RegisterInterface + ?Sized>(&self, dev: &mut R, state: bool) {
        let bit = UrxControl::ResyncToRisingEdges.bit();
        dev.set_bit_register(Register::UrxControl, bit, state);
    }

    /// Resynchronize the sampling clock on falling input edges.
    pub fn set_resync_falling<R: RegisterInterface + ?Sized>(&self, dev: &mut R, state: bool) {
        let bit = UrxControl::ResyncToFallingEdges.bit();
        dev.set_bit_register(Register::UrxControl, bit, state);
    }

    /// Resynchronize the sampling clock on every input edge.
    pub fn set_resync_on_edge<R: RegisterInterface + ?Sized>(&self, dev: &mut R, state: bool) {
        dev.set_bit_register(Register::UrxControl, UrxControl::ResyncOnEdge.bit(), state);
    }

    /// Reads the next packet. The bit count comes from the packet size registers; the
    /// last byte carries the remaining bits.
    pub fn read_packet<R: RegisterInterface + ?Sized>(&self, dev: &mut R) -> Vec<u8> {
        let packets = self.packet_count(dev);
        log::info!("{} packets in URX", packets);

        let low = dev.read_register(Register::UrxPacketSizeOutLow);
        let high = dev.read_register(Register::UrxPacketSizeOutHigh);
        let bits = u16::from_le_bytes([low, high]);
        let byte_count = bytes_for_bits(bits);
        log::info!("{} bits = {} bytes", bits, byte_count);

        (0..byte_count).map(|_| self.read_byte(dev)).collect()
    }
}
