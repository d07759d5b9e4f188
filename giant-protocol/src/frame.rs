use std::fmt::Display;

use bit_vec::BitVec;

use crate::error::{ConfigError, FrameError};

/// Parity bit appended to the data bits of a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    /// Number of bits the parity occupies in a frame
    pub fn bit_count(&self) -> usize {
        match self {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        }
    }
}

/// The shape of an asynchronous serial character frame:
/// one low start bit, `data_bits` data bits (LSB first), an optional parity bit
/// and `stop_bits` high stop bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameFormat {
    data_bits: u8,
    parity: Parity,
    stop_bits: u8,
}

impl FrameFormat {
    pub const MAX_DATA_BITS: u8 = 32;
    pub const MAX_STOP_BITS: u8 = 2;

    /// The common 8N1 format
    pub const EIGHT_N_ONE: FrameFormat = FrameFormat {
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
    };

    pub fn new(data_bits: u8, parity: Parity, stop_bits: u8) -> Result<FrameFormat, ConfigError> {
        if stop_bits > Self::MAX_STOP_BITS {
            return Err(ConfigError::InvalidConfig(format!(
                "Stop bits must be between 0 and {}, got {}",
                Self::MAX_STOP_BITS,
                stop_bits
            )));
        }
        if data_bits == 0 || data_bits > Self::MAX_DATA_BITS {
            return Err(ConfigError::InvalidConfig(format!(
                "Data bits must be between 1 and {}, got {}",
                Self::MAX_DATA_BITS,
                data_bits
            )));
        }
        Ok(FrameFormat {
            data_bits,
            parity,
            stop_bits,
        })
    }

    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn stop_bits(&self) -> u8 {
        self.stop_bits
    }

    /// Number of bits in one frame
    pub fn bit_len(&self) -> usize {
        1 + self.data_bits as usize + self.parity.bit_count() + self.stop_bits as usize
    }

    fn parity_bit(&self, data_parity: bool) -> bool {
        match self.parity {
            Parity::Odd => !data_parity,
            _ => data_parity,
        }
    }

    /// Appends the frame for `value` to `bits`.
    /// Value bits above `data_bits` are ignored.
    pub fn encode_into(&self, value: u32, bits: &mut BitVec) {
        bits.reserve(self.bit_len());
        // start
        bits.push(false);

        let mut parity = false;
        for i in 0..self.data_bits {
            let bit = (value >> i) & 0x1 == 1;
            bits.push(bit);
            parity ^= bit;
        }

        if self.parity != Parity::None {
            bits.push(self.parity_bit(parity));
        }

        bits.grow(self.stop_bits as usize, true);
    }

    /// Encodes `value` into a single frame.
    pub fn encode(&self, value: u32) -> BitVec {
        let mut bits = BitVec::with_capacity(self.bit_len());
        self.encode_into(value, &mut bits);
        bits
    }

    /// Decodes a single frame, checking start, parity and stop bits.
    pub fn decode(&self, bits: &BitVec) -> Result<u32, FrameError> {
        if bits.len() != self.bit_len() {
            return Err(FrameError::Length {
                expected: self.bit_len(),
                got: bits.len(),
            });
        }
        if bits[0] {
            return Err(FrameError::StartBit);
        }

        let mut value = 0;
        let mut parity = false;
        for i in 0..self.data_bits as usize {
            let bit = bits[1 + i];
            value |= (bit as u32) << i;
            parity ^= bit;
        }

        let mut pos = 1 + self.data_bits as usize;
        if self.parity != Parity::None {
            if bits[pos] != self.parity_bit(parity) {
                return Err(FrameError::Parity);
            }
            pos += 1;
        }

        for stop in 0..self.stop_bits as usize {
            if !bits[pos + stop] {
                return Err(FrameError::StopBit(stop));
            }
        }
        Ok(value)
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::EIGHT_N_ONE
    }
}

impl Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(f, "{}{}{}", self.data_bits, parity, self.stop_bits)
    }
}

/// Encodes `value` as a serial character frame with the given shape.
///
/// Fails with [`ConfigError::InvalidConfig`] if the shape is malformed; a frame is either
/// complete or not produced at all.
pub fn encode(
    value: u32,
    data_bits: u8,
    parity: Parity,
    stop_bits: u8,
) -> Result<BitVec, ConfigError> {
    Ok(FrameFormat::new(data_bits, parity, stop_bits)?.encode(value))
}
