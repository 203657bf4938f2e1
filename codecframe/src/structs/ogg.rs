//! Ogg page headers and pages.
//!
//! A page starts with a 27-byte fixed header followed by the segment table.
//! Packets are reassembled from lacing runs: consecutive 255-byte segments
//! belong to one packet, terminated by the first segment shorter than 255.

use crate::structs::Probe;
use crate::structs::frame::CodecFrame;

const CONTINUED_FLAG: u8 = 0x01;
const FIRST_PAGE_FLAG: u8 = 0x02;
const LAST_PAGE_FLAG: u8 = 0x04;

/// Decoded Ogg page header including the segment table.
#[derive(Debug, Clone)]
pub struct OggPageHeader {
    pub version: u8,
    pub header_type: u8,
    pub absolute_granule_position: i64,
    pub stream_serial_number: u32,
    pub page_sequence_number: u32,
    pub page_checksum: u32,
    pub segment_table: Vec<u8>,
    /// 27 bytes plus the segment table.
    pub header_length: usize,
    /// Full page length: header plus payload.
    pub frame_length: usize,
}

impl OggPageHeader {
    pub const FIXED_LENGTH: usize = 27;

    pub(crate) fn parse(data: &[u8]) -> Probe<Self> {
        if data.len() < Self::FIXED_LENGTH {
            return Probe::NeedData;
        }

        if &data[..4] != b"OggS" || data[4] != 0 {
            return Probe::Invalid;
        }

        let page_segments = data[26] as usize;
        if data.len() < Self::FIXED_LENGTH + page_segments {
            return Probe::NeedData;
        }

        let segment_table = data[27..27 + page_segments].to_vec();
        let payload_length: usize = segment_table.iter().map(|&n| n as usize).sum();
        let header_length = Self::FIXED_LENGTH + page_segments;

        Probe::Valid(Self {
            version: data[4],
            header_type: data[5],
            absolute_granule_position: i64::from_le_bytes(data[6..14].try_into().unwrap()),
            stream_serial_number: u32::from_le_bytes(data[14..18].try_into().unwrap()),
            page_sequence_number: u32::from_le_bytes(data[18..22].try_into().unwrap()),
            page_checksum: u32::from_le_bytes(data[22..26].try_into().unwrap()),
            segment_table,
            header_length,
            frame_length: header_length + payload_length,
        })
    }
}

/// A demuxed Ogg page.
///
/// `data` is the payload, `raw_data` the whole page including its header;
/// `segments` holds the packets reassembled from the segment table, after
/// continued-packet stitching. The running totals are the driver totals
/// after mapping this page's codec frames.
#[derive(Debug, Clone)]
pub struct OggPage {
    pub version: u8,
    pub is_continued_packet: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub absolute_granule_position: i64,
    pub stream_serial_number: u32,
    pub page_sequence_number: u32,
    /// Checksum stored in the page header; validated on parse.
    pub page_checksum: u32,
    pub segment_table: Vec<u8>,
    /// Packets carried by this page.
    pub segments: Vec<Vec<u8>>,
    pub codec_frames: Vec<CodecFrame>,
    pub raw_data: Vec<u8>,
    pub data: Vec<u8>,
    pub samples: u32,
    /// Sum of the carried codec frame durations, in milliseconds.
    pub duration: f64,
    /// IEEE CRC-32 of the payload.
    pub crc32: u32,
    pub total_bytes_out: u64,
    pub total_samples: u64,
    pub total_duration: f64,
}

impl OggPage {
    pub(crate) fn from_parts(header: OggPageHeader, raw_data: Vec<u8>) -> Self {
        let data = raw_data[header.header_length.min(raw_data.len())..].to_vec();
        let segments = assemble_packets(&header.segment_table, &data);

        Self {
            version: header.version,
            is_continued_packet: header.header_type & CONTINUED_FLAG != 0,
            is_first_page: header.header_type & FIRST_PAGE_FLAG != 0,
            is_last_page: header.header_type & LAST_PAGE_FLAG != 0,
            absolute_granule_position: header.absolute_granule_position,
            stream_serial_number: header.stream_serial_number,
            page_sequence_number: header.page_sequence_number,
            page_checksum: header.page_checksum,
            segment_table: header.segment_table,
            segments,
            codec_frames: Vec::new(),
            raw_data,
            data,
            samples: 0,
            duration: 0.0,
            crc32: 0,
            total_bytes_out: 0,
            total_samples: 0,
            total_duration: 0.0,
        }
    }
}

/// Joins lacing runs into packets. A trailing run without a sub-255
/// terminator still produces a (possibly incomplete) final packet; the
/// container parser decides whether it continues on the next page.
fn assemble_packets(segment_table: &[u8], payload: &[u8]) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut packet = Vec::new();
    let mut offset = 0usize;

    for &lacing in segment_table {
        let length = lacing as usize;
        let end = (offset + length).min(payload.len());
        packet.extend_from_slice(&payload[offset.min(payload.len())..end]);
        offset += length;

        if lacing < 255 {
            packets.push(std::mem::take(&mut packet));
        }
    }

    if !packet.is_empty() || segment_table.last() == Some(&255) {
        packets.push(packet);
    }

    packets
}
