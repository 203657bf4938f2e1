//! FLAC frame synchronization.
//!
//! FLAC frames are variable length with no length field, so synchronization
//! confirms a header by locating the next header candidate and validating
//! the CRC-16 footer over everything in between. During flush the remaining
//! buffer is emitted as the final frame iff its footer validates.

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::process::{LogStats, RawCodecFrame};
use crate::structs::Probe;
use crate::structs::flac::{FlacHeader, FlacStreamInfo};
use crate::structs::frame::{CodecFrame, CodecHeader};
use crate::structs::ogg::OggPage;
use crate::utils::crc::CRC_16_FLAC;
use crate::utils::errors::DemuxError;

/// Minimum payload between two frame headers.
const MIN_FRAME_SIZE: usize = 2;
/// Give up confirming a header beyond this many bytes.
const MAX_FRAME_SIZE: usize = 512 * 1024;

/// Native FLAC framer.
#[derive(Debug, Default)]
pub struct FlacParser;

impl FlacParser {
    pub(crate) fn parse_frame(
        &mut self,
        buffer: &mut ChunkBuffer,
        cache: &mut HeaderCache,
        stats: &LogStats<'_>,
    ) -> Result<Option<RawCodecFrame>, DemuxError> {
        if buffer.flushing() {
            return Ok(Self::parse_flushed(buffer, cache, stats));
        }

        loop {
            let probed = match read_header(buffer.bytes(), 0, None, cache) {
                Probe::NeedData => return Ok(None),
                Probe::Invalid => {
                    match next_sync_candidate(buffer.bytes(), 1) {
                        Some(offset) => buffer.advance(offset),
                        None => {
                            // keep the last byte, it may start the next sync pair
                            let skip = buffer.remaining().saturating_sub(1).max(1);
                            buffer.advance(skip);
                            return Ok(None);
                        }
                    }
                    continue;
                }
                Probe::Valid(probed) => probed,
            };

            let mut next_offset = probed.header_length + MIN_FRAME_SIZE;

            loop {
                if next_offset > MAX_FRAME_SIZE {
                    stats.warn(
                        buffer,
                        "Unable to sync FLAC frame: maximum frame size exceeded. Dropping data.",
                    );
                    cache.reset();
                    buffer.advance(next_offset);
                    break;
                }

                match read_header(buffer.bytes(), next_offset, None, cache) {
                    Probe::NeedData => return Ok(None),
                    Probe::Valid(_) => {
                        let frame = &buffer.bytes()[..next_offset];
                        if check_frame_footer_crc16(frame) {
                            cache.enable();
                            let data = frame.to_vec();
                            buffer.advance(next_offset);
                            return Ok(Some(RawCodecFrame {
                                header: probed.header,
                                samples: probed.samples,
                                data,
                            }));
                        }
                    }
                    Probe::Invalid => {}
                }

                match next_sync_candidate(buffer.bytes(), next_offset + 1) {
                    Some(offset) => next_offset = offset,
                    None => return Ok(None),
                }
            }
        }
    }

    /// Drain mode: the remaining buffer is the final frame iff its trailing
    /// CRC-16 validates; otherwise resync one candidate at a time.
    fn parse_flushed(
        buffer: &mut ChunkBuffer,
        cache: &mut HeaderCache,
        stats: &LogStats<'_>,
    ) -> Option<RawCodecFrame> {
        loop {
            let remainder = buffer.bytes();
            if remainder.len() < FlacHeader::MIN_LENGTH + MIN_FRAME_SIZE {
                buffer.advance(remainder.len());
                return None;
            }

            if let Probe::Valid(probed) = read_header(remainder, 0, None, cache) {
                if check_frame_footer_crc16(remainder) {
                    cache.enable();
                    let data = remainder.to_vec();
                    buffer.advance(data.len());
                    return Some(RawCodecFrame {
                        header: probed.header,
                        samples: probed.samples,
                        data,
                    });
                }
                stats.warn(
                    buffer,
                    "FLAC frame footer CRC-16 mismatch while flushing. Dropping data.",
                );
            }

            match next_sync_candidate(buffer.bytes(), 1) {
                Some(offset) => buffer.advance(offset),
                None => {
                    buffer.advance(buffer.remaining());
                    return None;
                }
            }
        }
    }
}

/// FLAC carried in Ogg.
///
/// The identification packet stores STREAMINFO; audio pages contribute one
/// frame per packet whose first byte is a sync candidate, each validated as
/// an isolated header.
#[derive(Debug, Default)]
pub struct OggFlacParser {
    page_index: usize,
    stream_info: Option<FlacStreamInfo>,
    /// Identification packet suffix from byte 13 onward, as delivered.
    stream_info_raw: Vec<u8>,
}

impl OggFlacParser {
    pub(crate) fn parse_ogg_page(
        &mut self,
        page: &mut OggPage,
        cache: &mut HeaderCache,
        buffer: &ChunkBuffer,
        stats: &LogStats<'_>,
    ) -> Result<(), DemuxError> {
        let index = self.page_index;
        self.page_index += 1;

        if index == 0 {
            match page.segments.first() {
                Some(packet) if packet.len() > 13 => {
                    self.stream_info_raw = packet[13..].to_vec();
                    self.stream_info = FlacStreamInfo::parse(&self.stream_info_raw);
                    if self.stream_info.is_none() {
                        stats.warn(buffer, "Failed to parse FLAC STREAMINFO from Ogg identification packet.");
                    }
                }
                _ => stats.warn(buffer, "Invalid FLAC identification packet in Ogg stream."),
            }
            return Ok(());
        }

        for packet in &page.segments {
            if packet.first() != Some(&0xFF) {
                // metadata packet
                continue;
            }

            match read_header(packet, 0, self.stream_info.as_ref(), cache) {
                Probe::Valid(probed) => {
                    let sample_rate = probed.header.sample_rate;
                    let duration = probed.samples as f64 / sample_rate as f64 * 1000.0;
                    page.codec_frames.push(CodecFrame {
                        header: probed.header,
                        data: packet.clone(),
                        samples: probed.samples,
                        duration,
                        frame_number: 0,
                        crc32: 0,
                        total_bytes_out: 0,
                        total_samples: 0,
                        total_duration: 0.0,
                    });
                }
                _ => stats.warn(buffer, "Failed to parse FLAC frame header in Ogg segment."),
            }
        }

        Ok(())
    }

    pub(crate) fn stream_info(&self) -> Option<&FlacStreamInfo> {
        self.stream_info.as_ref()
    }
}

struct FlacProbe {
    header: CodecHeader,
    header_length: usize,
    samples: u32,
}

/// Parses a FLAC header at `offset`, caching under the full header bytes.
fn read_header(
    bytes: &[u8],
    offset: usize,
    stream_info: Option<&FlacStreamInfo>,
    cache: &mut HeaderCache,
) -> Probe<FlacProbe> {
    if bytes.len() <= offset {
        return Probe::NeedData;
    }

    let data = &bytes[offset..];
    let parsed = match FlacHeader::parse(data, stream_info) {
        Probe::Valid(header) => header,
        Probe::NeedData => return Probe::NeedData,
        Probe::Invalid => return Probe::Invalid,
    };

    let key = &data[..parsed.length];
    if let Some(header) = cache.get_header(key) {
        let samples = parsed.block_size;
        return Probe::Valid(FlacProbe {
            header,
            header_length: parsed.length,
            samples,
        });
    }

    let (header_length, samples) = (parsed.length, parsed.block_size);
    let header = parsed.into_codec_header();
    cache.set_header(key, header.clone(), header.params());

    Probe::Valid(FlacProbe {
        header,
        header_length,
        samples,
    })
}

/// Scans forward for the next two-byte frame sync pattern at or after `from`.
fn next_sync_candidate(bytes: &[u8], from: usize) -> Option<usize> {
    if bytes.len() < from + 2 {
        return None;
    }

    (from..bytes.len() - 1).find(|&i| FlacHeader::is_sync_candidate(&bytes[i..]))
}

fn check_frame_footer_crc16(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }

    let (body, footer) = frame.split_at(frame.len() - 2);
    CRC_16_FLAC.checksum(body) == u16::from_be_bytes([footer[0], footer[1]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::crc::CRC_8_FLAC;

    /// A valid frame: 256-sample fixed header, filler payload, CRC-16 footer.
    pub(crate) fn frame(frame_number: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xF8, 0x89, 0x18, frame_number];
        data.push(CRC_8_FLAC.checksum(&data));
        data.extend_from_slice(payload);
        let crc = CRC_16_FLAC.checksum(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }

    fn stats() -> LogStats<'static> {
        LogStats {
            enabled: false,
            codec: "flac",
            mime: "audio/flac",
            total_bytes_out: 0,
        }
    }

    fn drain(buffer: &mut ChunkBuffer, cache: &mut HeaderCache) -> Vec<RawCodecFrame> {
        let mut parser = FlacParser;
        let mut frames = Vec::new();
        while let Some(frame) = parser.parse_frame(buffer, cache, &stats()).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn confirms_via_next_header_and_crc() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&frame(0, &[0x10; 20]));
        buffer.push(&frame(1, &[0x20; 24]));

        let mut cache = HeaderCache::new(None);
        let frames = drain(&mut buffer, &mut cache);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 28);
        assert_eq!(frames[0].samples, 256);

        // The trailing frame arrives on flush.
        buffer.set_flushing(true);
        let frames = drain(&mut buffer, &mut cache);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 32);
    }

    #[test]
    fn resyncs_through_junk_prefix() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(&[0x00, 0x01, 0x02, 0x03]);
        buffer.push(&frame(0, &[0x10; 20]));
        buffer.push(&frame(1, &[0x20; 24]));

        let mut cache = HeaderCache::new(None);
        let mut frames = drain(&mut buffer, &mut cache);
        buffer.set_flushing(true);
        frames.extend(drain(&mut buffer, &mut cache));

        assert_eq!(frames.len(), 2);
        assert_eq!(buffer.read_position(), 4 + 28 + 32);
    }

    #[test]
    fn corrupted_footer_crc_prevents_emission() {
        let mut first = frame(0, &[0x10; 20]);
        let last = first.len() - 1;
        first[last] ^= 0xFF;

        let mut buffer = ChunkBuffer::new();
        buffer.push(&first);
        buffer.push(&frame(1, &[0x20; 24]));
        buffer.set_flushing(true);

        let mut cache = HeaderCache::new(None);
        let frames = drain(&mut buffer, &mut cache);

        // Only the second frame validates; nothing is emitted at position 0.
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 32);
        let crate::structs::frame::HeaderDetails::Flac(details) = &frames[0].header.details else {
            panic!("expected a FLAC header");
        };
        assert_eq!(details.coded_number, 1);
    }

    #[test]
    fn ogg_nested_parser_reads_streaminfo_and_frames() {
        // Identification packet: 0x7F "FLAC" maj min nheaders "fLaC" + STREAMINFO
        let mut id = vec![0x7F];
        id.extend_from_slice(b"FLAC");
        id.extend_from_slice(&[1, 0]);
        id.extend_from_slice(&1u16.to_be_bytes());
        id.extend_from_slice(b"fLaC");
        id.extend_from_slice(&[0x00, 0x00, 0x00, 0x22]);
        id.extend_from_slice(&[0x01, 0x00]); // min block
        id.extend_from_slice(&[0x10, 0x00]); // max block
        id.extend_from_slice(&[0x00; 6]); // frame sizes
        id.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0, 0, 0, 0, 0]);
        id.extend_from_slice(&[0u8; 16]);

        let mut parser = OggFlacParser::default();
        let mut cache = HeaderCache::new(None);
        let buffer = ChunkBuffer::new();

        let mut id_page = page_with_segments(vec![id]);
        parser
            .parse_ogg_page(&mut id_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert_eq!(parser.stream_info().unwrap().sample_rate, 44100);

        // Vorbis-comment style metadata packet is filtered by its first byte.
        let mut comments_page = page_with_segments(vec![vec![0x04, 0x00, 0x00]]);
        parser
            .parse_ogg_page(&mut comments_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert!(comments_page.codec_frames.is_empty());

        let mut audio_page = page_with_segments(vec![frame(0, &[0x55; 10]), frame(1, &[0x66; 12])]);
        parser
            .parse_ogg_page(&mut audio_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert_eq!(audio_page.codec_frames.len(), 2);
        assert_eq!(audio_page.codec_frames[0].samples, 256);
        assert_eq!(audio_page.codec_frames[0].header.sample_rate, 44100);
    }

    fn page_with_segments(segments: Vec<Vec<u8>>) -> OggPage {
        use crate::structs::ogg::OggPageHeader;

        let table: Vec<u8> = segments.iter().map(|s| s.len() as u8).collect();
        let payload: Vec<u8> = segments.concat();
        let header_length = OggPageHeader::FIXED_LENGTH + table.len();
        let mut raw = vec![0u8; header_length];
        raw.extend_from_slice(&payload);

        let header = OggPageHeader {
            version: 0,
            header_type: 0,
            absolute_granule_position: 0,
            stream_serial_number: 0,
            page_sequence_number: 0,
            page_checksum: 0,
            segment_table: table,
            header_length,
            frame_length: header_length + payload.len(),
        };
        OggPage::from_parts(header, raw)
    }
}
