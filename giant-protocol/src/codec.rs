//! Binary layouts shared with the FPGA: the pulse memory image, the byte
//! addressing of pulse memory and the packing of bit streams into FIFO bytes.
use bit_vec::BitVec;

use crate::{error::ConfigError, timing::Pulse};

/// Number of 32-bit words in front of the first pulse (header word and one reserved word)
pub const HEADER_WORDS: u32 = 2;
/// Number of 32-bit words per pulse (offset and width)
pub const WORDS_PER_PULSE: u32 = 2;
/// The address high register only carries three bits
pub const ADDR_HIGH_MASK: u8 = 0x7;
/// Size of the byte address space of pulse memory
pub const MEMORY_BYTES: u32 = 1 << 11;
/// Size of pulse memory in 32-bit words
pub const MEMORY_WORDS: u32 = MEMORY_BYTES / 4;
/// Most pulses that fit into pulse memory
pub const MAX_PULSES: usize = ((MEMORY_WORDS - HEADER_WORDS) / WORDS_PER_PULSE) as usize;

/// Checks that `addr` is a byte address inside pulse memory.
pub fn check_byte_address(addr: u16) -> Result<u16, ConfigError> {
    ConfigError::check_range(
        "Pulse memory byte address",
        addr.into(),
        0,
        MEMORY_BYTES as i64 - 1,
    )?;
    Ok(addr)
}

/// Splits a byte address of pulse memory into the values of the low and high address registers.
pub fn split_address(addr: u16) -> (u8, u8) {
    ((addr & 0xff) as u8, ((addr >> 8) as u8) & ADDR_HIGH_MASK)
}

/// A 32-bit word of pulse memory at a word address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryWord {
    addr: u16,
    value: u32,
}

impl MemoryWord {
    /// Fails if `addr` lies behind the last word of pulse memory.
    pub fn new(addr: u16, value: u32) -> Result<MemoryWord, ConfigError> {
        ConfigError::check_range(
            "Pulse memory word address",
            addr.into(),
            0,
            MEMORY_WORDS as i64 - 1,
        )?;
        Ok(MemoryWord { addr, value })
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// The four byte writes this word consists of, least significant byte first,
    /// as `(byte address, value)` pairs.
    pub fn bytes(&self) -> impl Iterator<Item = (u16, u8)> + use<> {
        let MemoryWord { addr, value } = *self;
        value
            .to_le_bytes()
            .into_iter()
            .enumerate()
            .map(move |(b, byte)| (4 * addr + b as u16, byte))
    }
}

/// The content of pulse memory derived from a list of pulses.
///
/// Layout (in 32-bit words):
///
/// | word       | content                          |
/// |------------|----------------------------------|
/// | 0          | `end_offset << 16`               |
/// | 1          | reserved                         |
/// | 2 + 2p     | offset of pulse `p` in ticks     |
/// | 3 + 2p     | width of pulse `p` in ticks      |
///
/// where `end_offset` is the first word after the pulse table. The hardware stops
/// reading at `end_offset`, so stale entries behind it are unreachable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryImage<'a> {
    pulses: &'a [Pulse],
}

impl<'a> MemoryImage<'a> {
    /// Image without pulses: only the header pointing behind the reserved word
    pub const EMPTY: MemoryImage<'static> = MemoryImage { pulses: &[] };

    pub fn new(pulses: &'a [Pulse]) -> Result<MemoryImage<'a>, ConfigError> {
        if pulses.len() > MAX_PULSES {
            return Err(ConfigError::out_of_range(
                "Number of pulses",
                pulses.len(),
                0,
                MAX_PULSES as i64,
            ));
        }
        Ok(MemoryImage { pulses })
    }

    /// First word behind the pulse table
    pub fn end_offset(&self) -> u32 {
        WORDS_PER_PULSE * self.pulses.len() as u32 + HEADER_WORDS
    }

    /// The header word at address 0
    pub fn header(&self) -> MemoryWord {
        MemoryWord {
            addr: 0,
            value: self.end_offset() << 16,
        }
    }

    /// The header followed by the offset and width word of every pulse, in write order.
    pub fn words(&self) -> impl Iterator<Item = MemoryWord> + '_ {
        std::iter::once(self.header()).chain(self.pulses.iter().enumerate().flat_map(
            |(p, pulse)| {
                let addr = (HEADER_WORDS + WORDS_PER_PULSE * p as u32) as u16;
                [
                    MemoryWord {
                        addr,
                        value: pulse.offset_ticks(),
                    },
                    MemoryWord {
                        addr: addr + 1,
                        value: pulse.width_ticks(),
                    },
                ]
            },
        ))
    }

    /// Parses a header word back into the number of pulses it announces.
    pub fn pulse_count_from_header(header: u32) -> Option<usize> {
        let end = header >> 16;
        if header & 0xffff != 0
            || end < HEADER_WORDS
            || (end - HEADER_WORDS) % WORDS_PER_PULSE != 0
        {
            return None;
        }
        Some(((end - HEADER_WORDS) / WORDS_PER_PULSE) as usize)
    }
}

/// Packs a bit stream into FIFO bytes.
///
/// The first bit becomes the most significant bit of the first byte; the last byte
/// is padded with zeros. The number of valid bits has to be transmitted separately.
pub fn pack_bits(bits: &BitVec) -> Vec<u8> {
    bits.to_bytes()
}

/// Splits a packet size into the values of the low and high size registers.
pub fn split_packet_size(size: u16) -> (u8, u8) {
    let [low, high] = size.to_le_bytes();
    (low, high)
}

/// Number of bytes needed to hold `bits` bits.
pub fn bytes_for_bits(bits: u16) -> usize {
    (bits as usize).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_has_header_only() {
        let image = MemoryImage::new(&[]).unwrap();
        assert_eq!(
            image.words().collect::<Vec<_>>(),
            vec![MemoryWord {
                addr: 0,
                value: 2 << 16
            }]
        );
    }

    #[test]
    fn pulse_words_follow_reserved_word() {
        let pulses = [Pulse::from_ticks(10, 20), Pulse::from_ticks(30, 40)];
        let image = MemoryImage::new(&pulses).unwrap();
        assert_eq!(image.end_offset(), 6);
        let words: Vec<_> = image.words().map(|w| (w.addr(), w.value())).collect();
        assert_eq!(
            words,
            vec![(0, 6 << 16), (2, 10), (3, 20), (4, 30), (5, 40)]
        );
    }

    #[test]
    fn too_many_pulses() {
        let pulses = vec![Pulse::default(); MAX_PULSES + 1];
        assert!(matches!(
            MemoryImage::new(&pulses),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(MemoryImage::new(&pulses[..MAX_PULSES]).is_ok());
    }

    #[test]
    fn max_pulses_fill_memory() {
        assert_eq!(MAX_PULSES, 255);
        let pulses = vec![Pulse::default(); MAX_PULSES];
        let last = MemoryImage::new(&pulses).unwrap().words().last().unwrap();
        let (last_byte, _) = last.bytes().last().unwrap();
        assert_eq!(last_byte as u32, MEMORY_BYTES - 1);
    }

    #[test]
    fn word_bytes_are_little_endian() {
        let word = MemoryWord::new(3, 0x1122_3344).unwrap();
        assert_eq!(
            word.bytes().collect::<Vec<_>>(),
            vec![(12, 0x44), (13, 0x33), (14, 0x22), (15, 0x11)]
        );
    }

    #[rstest::rstest]
    #[case(511, true)]
    #[case(512, false)]
    #[case(20000, false)]
    #[case(u16::MAX, false)]
    fn word_address_bounds(#[case] addr: u16, #[case] valid: bool) {
        let word = MemoryWord::new(addr, 0xdead_beef);
        assert_eq!(word.is_ok(), valid);
        if let Err(err) = word {
            assert!(matches!(err, ConfigError::OutOfRange { max: 511, .. }));
        }
    }

    #[test]
    fn last_word_ends_at_last_byte() {
        let word = MemoryWord::new((MEMORY_WORDS - 1) as u16, 0).unwrap();
        let (last_byte, _) = word.bytes().last().unwrap();
        assert_eq!(last_byte, 2047);
        assert!(check_byte_address(last_byte).is_ok());
        assert!(check_byte_address(last_byte + 1).is_err());
    }

    #[test]
    fn empty_image_constant() {
        let empty = MemoryImage::new(&[]).unwrap();
        assert_eq!(MemoryImage::EMPTY.header(), empty.header());
    }

    #[rstest::rstest]
    #[case(0x0000, (0x00, 0x0))]
    #[case(0x01ff, (0xff, 0x1))]
    #[case(0x07fe, (0xfe, 0x7))]
    #[case(0x3fff, (0xff, 0x7))]
    fn address_split(#[case] addr: u16, #[case] expected: (u8, u8)) {
        assert_eq!(split_address(addr), expected);
    }

    #[rstest::rstest]
    #[case(0x0000_0000, None)]
    #[case(0x0002_0000, Some(0))]
    #[case(0x0006_0000, Some(2))]
    #[case(0x0005_0000, None)]
    #[case(0x0006_0001, None)]
    fn header_parsing(#[case] header: u32, #[case] expected: Option<usize>) {
        assert_eq!(MemoryImage::pulse_count_from_header(header), expected);
    }

    #[test]
    fn bits_are_packed_msb_first() {
        let mut bits = BitVec::new();
        bits.extend([true, false, false, false, false, false, false, true, true]);
        assert_eq!(pack_bits(&bits), vec![0x81, 0x80]);
    }

    #[test]
    fn packet_size_split() {
        assert_eq!(split_packet_size(0x1234), (0x34, 0x12));
        assert_eq!(bytes_for_bits(9), 2);
        assert_eq!(bytes_for_bits(16), 2);
        assert_eq!(bytes_for_bits(0), 0);
    }
}
