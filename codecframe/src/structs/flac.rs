//! FLAC frame headers and STREAMINFO.
//!
//! Frame headers are variable length: a fixed four-byte prefix, a UTF-8-style
//! coded frame or sample number, optional blocksize and sample-rate fields,
//! and a trailing CRC-8 over the header bytes.

use std::fmt;

use crate::structs::Probe;
use crate::structs::frame::{CodecHeader, HeaderDetails};
use crate::utils::bits::BitSliceReader;
use crate::utils::crc::CRC_8_FLAC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingStrategy {
    /// Fixed blocksize; the coded number counts frames.
    Fixed,
    /// Variable blocksize; the coded number counts samples.
    Variable,
}

impl fmt::Display for BlockingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingStrategy::Fixed => write!(f, "fixed"),
            BlockingStrategy::Variable => write!(f, "variable"),
        }
    }
}

/// Channel assignments 0..=10.
const CHANNEL_MODES: [&str; 11] = [
    "mono",
    "stereo (left, right)",
    "linear surround (left, right, center)",
    "quadraphonic (front left, front right, rear left, rear right)",
    "5.0 surround (front left, front right, front center, rear left, rear right)",
    "5.1 surround (front left, front right, front center, LFE, rear left, rear right)",
    "6.1 surround (front left, front right, front center, LFE, rear center, side left, side right)",
    "7.1 surround (front left, front right, front center, LFE, rear left, rear right, side left, side right)",
    "left/side stereo",
    "right/side stereo",
    "mid/side stereo",
];

/// Decoded FLAC frame header.
#[derive(Debug, Clone)]
pub struct FlacHeader {
    pub blocking_strategy: BlockingStrategy,
    /// Samples per channel in this frame.
    pub block_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub channel_mode: &'static str,
    pub bit_depth: u8,
    /// Frame number (fixed strategy) or first sample number (variable).
    pub coded_number: u64,
    /// Header length in bytes, CRC-8 included.
    pub length: usize,
}

impl FlacHeader {
    /// Shortest possible header: fixed prefix, one-byte number, CRC-8.
    pub const MIN_LENGTH: usize = 6;
    /// Longest possible header: seven-byte number plus two-byte blocksize
    /// and sample-rate fields.
    pub const MAX_LENGTH: usize = 16;

    /// Whether `data` starts with the two-byte frame sync pattern.
    pub(crate) fn is_sync_candidate(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0xFF && data[1] & 0xFE == 0xF8
    }

    /// Decodes a header from the start of `data`.
    ///
    /// `stream_info` supplies the sample rate and bit depth for headers that
    /// defer to STREAMINFO (only available for FLAC-in-Ogg).
    pub(crate) fn parse(data: &[u8], stream_info: Option<&FlacStreamInfo>) -> Probe<Self> {
        if data.len() < 4 {
            return Probe::NeedData;
        }

        // 14 sync bits and a zero reserved bit
        if data[0] != 0xFF || data[1] & 0xFE != 0xF8 {
            return Probe::Invalid;
        }

        let blocking_strategy = if data[1] & 0x01 != 0 {
            BlockingStrategy::Variable
        } else {
            BlockingStrategy::Fixed
        };

        let block_size_code = data[2] >> 4;
        let sample_rate_code = data[2] & 0x0F;
        if block_size_code == 0 || sample_rate_code == 15 {
            return Probe::Invalid;
        }

        let channel_code = data[3] >> 4;
        if channel_code > 10 {
            return Probe::Invalid;
        }
        let (channels, channel_mode) = match channel_code {
            0..=7 => (channel_code + 1, CHANNEL_MODES[channel_code as usize]),
            _ => (2, CHANNEL_MODES[channel_code as usize]),
        };

        let bit_depth = match (data[3] >> 1) & 0x07 {
            0b000 => match stream_info {
                Some(info) => info.bit_depth,
                None => return Probe::Invalid,
            },
            0b001 => 8,
            0b010 => 12,
            0b100 => 16,
            0b101 => 20,
            0b110 => 24,
            0b111 => 32,
            _ => return Probe::Invalid,
        };

        // reserved bit
        if data[3] & 0x01 != 0 {
            return Probe::Invalid;
        }

        let mut position = 4usize;

        let coded_number = match Self::read_coded_number(data, &mut position) {
            Probe::Valid(number) => number,
            Probe::NeedData => return Probe::NeedData,
            Probe::Invalid => return Probe::Invalid,
        };

        let block_size = match block_size_code {
            1 => 192,
            2..=5 => 576 << (block_size_code - 2),
            6 => match Self::read_u8(data, &mut position) {
                Some(value) => value as u32 + 1,
                None => return Probe::NeedData,
            },
            7 => match Self::read_u16_be(data, &mut position) {
                Some(value) => value as u32 + 1,
                None => return Probe::NeedData,
            },
            _ => 256 << (block_size_code - 8),
        };

        let sample_rate = match sample_rate_code {
            0 => match stream_info {
                Some(info) => info.sample_rate,
                None => return Probe::Invalid,
            },
            1 => 88200,
            2 => 176400,
            3 => 192000,
            4 => 8000,
            5 => 16000,
            6 => 22050,
            7 => 24000,
            8 => 32000,
            9 => 44100,
            10 => 48000,
            11 => 96000,
            12 => match Self::read_u8(data, &mut position) {
                Some(value) => value as u32 * 1000,
                None => return Probe::NeedData,
            },
            13 => match Self::read_u16_be(data, &mut position) {
                Some(value) => value as u32,
                None => return Probe::NeedData,
            },
            _ => match Self::read_u16_be(data, &mut position) {
                Some(value) => value as u32 * 10,
                None => return Probe::NeedData,
            },
        };

        // trailing CRC-8 over everything before it
        let length = position + 1;
        if data.len() < length {
            return Probe::NeedData;
        }
        if CRC_8_FLAC.checksum(&data[..position]) != data[position] {
            return Probe::Invalid;
        }

        Probe::Valid(Self {
            blocking_strategy,
            block_size,
            sample_rate,
            channels,
            channel_mode,
            bit_depth,
            coded_number,
            length,
        })
    }

    /// UTF-8-style variable-length number: up to 7 bytes for sample numbers.
    fn read_coded_number(data: &[u8], position: &mut usize) -> Probe<u64> {
        let Some(&first) = data.get(*position) else {
            return Probe::NeedData;
        };

        let width = match first.leading_ones() {
            0 => 1,
            1 => return Probe::Invalid,
            n @ 2..=7 => n as usize,
            _ => return Probe::Invalid,
        };

        if data.len() < *position + width {
            return Probe::NeedData;
        }

        let mut value = if width == 1 {
            first as u64
        } else {
            (first & (0x7F >> width)) as u64
        };

        for i in 1..width {
            let byte = data[*position + i];
            if byte & 0xC0 != 0x80 {
                return Probe::Invalid;
            }
            value = value << 6 | (byte & 0x3F) as u64;
        }

        *position += width;
        Probe::Valid(value)
    }

    fn read_u8(data: &[u8], position: &mut usize) -> Option<u8> {
        let value = *data.get(*position)?;
        *position += 1;
        Some(value)
    }

    fn read_u16_be(data: &[u8], position: &mut usize) -> Option<u16> {
        if data.len() < *position + 2 {
            return None;
        }
        let value = u16::from_be_bytes([data[*position], data[*position + 1]]);
        *position += 2;
        Some(value)
    }

    pub(crate) fn into_codec_header(self) -> CodecHeader {
        CodecHeader {
            bit_depth: self.bit_depth,
            channels: self.channels,
            channel_mode: self.channel_mode.to_string(),
            sample_rate: self.sample_rate,
            bitrate: 0,
            details: HeaderDetails::Flac(self),
        }
    }
}

/// STREAMINFO metadata carried by the FLAC-in-Ogg identification packet.
#[derive(Debug, Clone)]
pub struct FlacStreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub total_samples: u64,
}

impl FlacStreamInfo {
    /// Parses a metadata block header followed by the 34-byte STREAMINFO body.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 + 34 {
            return None;
        }

        let mut reader = BitSliceReader::from_slice(data);
        reader.skip_n(32).ok()?;

        Some(Self {
            min_block_size: reader.get_n(16).ok()?,
            max_block_size: reader.get_n(16).ok()?,
            min_frame_size: reader.get_n(24).ok()?,
            max_frame_size: reader.get_n(24).ok()?,
            sample_rate: reader.get_n(20).ok()?,
            channels: reader.get_n::<u8>(3).ok()? + 1,
            bit_depth: reader.get_n::<u8>(5).ok()? + 1,
            total_samples: reader.get_n(36).ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a valid fixed-strategy header: 256-sample blocks, 44.1 kHz,
    /// stereo, 16-bit, with the given frame number (< 128).
    pub(crate) fn build_header(frame_number: u8) -> Vec<u8> {
        let mut header = vec![0xFF, 0xF8, 0x89, 0x18, frame_number];
        header.push(CRC_8_FLAC.checksum(&header));
        header
    }

    #[test]
    fn fixed_strategy_header() {
        let bytes = build_header(0);
        let Probe::Valid(header) = FlacHeader::parse(&bytes, None) else {
            panic!("expected a valid header");
        };

        assert_eq!(header.blocking_strategy, BlockingStrategy::Fixed);
        assert_eq!(header.block_size, 256);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 2);
        assert_eq!(header.channel_mode, "stereo (left, right)");
        assert_eq!(header.bit_depth, 16);
        assert_eq!(header.coded_number, 0);
        assert_eq!(header.length, 6);
    }

    #[test]
    fn crc8_mismatch_rejects() {
        let mut bytes = build_header(0);
        *bytes.last_mut().unwrap() ^= 0xA5;
        assert!(matches!(FlacHeader::parse(&bytes, None), Probe::Invalid));
    }

    #[test]
    fn short_input_asks_for_more() {
        let bytes = build_header(0);
        assert!(matches!(FlacHeader::parse(&bytes[..3], None), Probe::NeedData));
        assert!(matches!(FlacHeader::parse(&bytes[..5], None), Probe::NeedData));
    }

    #[test]
    fn streaminfo_codes_defer_to_ogg_metadata() {
        // Sample rate code 0 requires STREAMINFO.
        let mut bytes = vec![0xFF, 0xF8, 0x80, 0x18, 0x00];
        bytes.push(CRC_8_FLAC.checksum(&bytes));
        assert!(matches!(FlacHeader::parse(&bytes, None), Probe::Invalid));

        let info = FlacStreamInfo {
            min_block_size: 256,
            max_block_size: 256,
            min_frame_size: 0,
            max_frame_size: 0,
            sample_rate: 96000,
            channels: 2,
            bit_depth: 24,
            total_samples: 0,
        };
        let Probe::Valid(header) = FlacHeader::parse(&bytes, Some(&info)) else {
            panic!("expected a valid header");
        };
        assert_eq!(header.sample_rate, 96000);
    }

    #[test]
    fn two_byte_coded_number() {
        // Frame number 128 encodes as 0xC2 0x80.
        let mut bytes = vec![0xFF, 0xF8, 0x89, 0x18, 0xC2, 0x80];
        bytes.push(CRC_8_FLAC.checksum(&bytes));
        let Probe::Valid(header) = FlacHeader::parse(&bytes, None) else {
            panic!("expected a valid header");
        };
        assert_eq!(header.coded_number, 128);
        assert_eq!(header.length, 7);
    }

    #[test]
    fn uncommon_block_size_and_rate_fields() {
        // Blocksize code 6 (8-bit value minus one), sample rate code 12 (kHz).
        let mut bytes = vec![0xFF, 0xF8, 0x6C, 0x18, 0x00, 0xBF, 0x32];
        bytes.push(CRC_8_FLAC.checksum(&bytes));
        let Probe::Valid(header) = FlacHeader::parse(&bytes, None) else {
            panic!("expected a valid header");
        };
        assert_eq!(header.block_size, 192);
        assert_eq!(header.sample_rate, 50000);
        assert_eq!(header.length, 8);
    }

    #[test]
    fn streaminfo_fields() {
        // Block header (4 bytes) + 34-byte body.
        let mut data = vec![0x00, 0x00, 0x00, 0x22];
        data.extend_from_slice(&[0x10, 0x00]); // min block 4096
        data.extend_from_slice(&[0x10, 0x00]); // max block 4096
        data.extend_from_slice(&[0x00, 0x00, 0x00]); // min frame
        data.extend_from_slice(&[0x00, 0x00, 0x00]); // max frame
        // 44100 Hz (20 bits), 2 channels (1), 16 bits (15), 0 samples
        data.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0u8; 16]); // md5

        let info = FlacStreamInfo::parse(&data).unwrap();
        assert_eq!(info.min_block_size, 4096);
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bit_depth, 16);
        assert_eq!(info.total_samples, 0);
    }
}
