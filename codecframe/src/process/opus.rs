//! Opus packets carried in Ogg.
//!
//! The first dispatched page holds the identification header, the second
//! the OpusTags comment packet (ignored), and every packet on later pages
//! is one Opus frame sized by its TOC byte.

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::process::LogStats;
use crate::structs::frame::CodecFrame;
use crate::structs::ogg::OggPage;
use crate::structs::opus::OpusHeader;
use crate::utils::errors::DemuxError;

const SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Default)]
pub struct OpusParser {
    page_index: usize,
    id_header: Option<OpusHeader>,
    /// Identification packet bytes, preserved for cache keying.
    id_raw: Vec<u8>,
    warned_missing_id: bool,
}

impl OpusParser {
    pub(crate) fn parse_ogg_page(
        &mut self,
        page: &mut OggPage,
        cache: &mut HeaderCache,
        buffer: &ChunkBuffer,
        stats: &LogStats<'_>,
    ) -> Result<(), DemuxError> {
        let index = self.page_index;
        self.page_index += 1;

        match index {
            0 => {
                match page.segments.first().and_then(|p| {
                    OpusHeader::parse_id(p).map(|header| (header, p.clone()))
                }) {
                    Some((header, raw)) => {
                        self.id_header = Some(header);
                        self.id_raw = raw;
                    }
                    None => stats.warn(buffer, "Failed to parse Opus identification header."),
                }
            }
            1 => {
                // OpusTags
            }
            _ => {
                let Some(id) = &self.id_header else {
                    if !self.warned_missing_id {
                        stats.warn(
                            buffer,
                            "Dropping Opus packets: no identification header was parsed.",
                        );
                        self.warned_missing_id = true;
                    }
                    return Ok(());
                };

                for packet in &page.segments {
                    let Some((header, samples)) = id.with_toc(packet) else {
                        stats.warn(buffer, "Failed to parse Opus packet TOC.");
                        continue;
                    };

                    // TOC byte keys the per-packet fields; code 3 adds its count byte
                    let toc_length = if packet[0] & 0x03 == 3 { 2 } else { 1 };
                    let mut key = self.id_raw.clone();
                    key.extend_from_slice(&packet[..toc_length]);

                    let codec_header = match cache.get_header(&key) {
                        Some(cached) => cached,
                        None => {
                            let codec_header = header.to_codec_header();
                            cache.set_header(&key, codec_header.clone(), codec_header.params());
                            codec_header
                        }
                    };

                    page.codec_frames.push(CodecFrame {
                        header: codec_header,
                        data: packet.clone(),
                        samples,
                        duration: samples as f64 / SAMPLE_RATE as f64 * 1000.0,
                        frame_number: 0,
                        crc32: 0,
                        total_bytes_out: 0,
                        total_samples: 0,
                        total_duration: 0.0,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::frame::HeaderDetails;
    use crate::structs::ogg::OggPageHeader;
    use crate::structs::opus::OpusMode;

    fn page_with_segments(segments: Vec<Vec<u8>>) -> OggPage {
        let table: Vec<u8> = segments.iter().map(|s| s.len() as u8).collect();
        let payload: Vec<u8> = segments.concat();
        let header_length = OggPageHeader::FIXED_LENGTH + table.len();
        let mut raw = vec![0u8; header_length];
        raw.extend_from_slice(&payload);

        OggPage::from_parts(
            OggPageHeader {
                version: 0,
                header_type: 0,
                absolute_granule_position: 0,
                stream_serial_number: 0,
                page_sequence_number: 0,
                page_checksum: 0,
                segment_table: table,
                header_length,
                frame_length: header_length + payload.len(),
            },
            raw,
        )
    }

    fn id_packet() -> Vec<u8> {
        let mut packet = Vec::from(OpusHeader::MAGIC);
        packet.push(1);
        packet.push(1); // mono
        packet.extend_from_slice(&312u16.to_le_bytes());
        packet.extend_from_slice(&48000u32.to_le_bytes());
        packet.extend_from_slice(&0i16.to_le_bytes());
        packet.push(0);
        packet
    }

    fn stats() -> LogStats<'static> {
        LogStats {
            enabled: false,
            codec: "opus",
            mime: "application/ogg",
            total_bytes_out: 0,
        }
    }

    #[test]
    fn pages_map_to_id_tags_then_audio() {
        let mut parser = OpusParser::default();
        let mut cache = HeaderCache::new(None);
        let buffer = ChunkBuffer::new();

        let mut id_page = page_with_segments(vec![id_packet()]);
        parser
            .parse_ogg_page(&mut id_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert!(id_page.codec_frames.is_empty());

        let mut tags_page = page_with_segments(vec![b"OpusTags".to_vec()]);
        parser
            .parse_ogg_page(&mut tags_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert!(tags_page.codec_frames.is_empty());

        // TOC 0x78: Hybrid fullband 20 ms, one frame.
        let mut audio_page = page_with_segments(vec![vec![0x78, 0x01, 0x02, 0x03]]);
        parser
            .parse_ogg_page(&mut audio_page, &mut cache, &buffer, &stats())
            .unwrap();

        assert_eq!(audio_page.codec_frames.len(), 1);
        let frame = &audio_page.codec_frames[0];
        assert_eq!(frame.samples, 960);
        assert_eq!(frame.duration, 20.0);
        assert_eq!(frame.header.sample_rate, 48000);
        assert_eq!(frame.header.channel_mode, "mono");
        let HeaderDetails::Opus(details) = &frame.header.details else {
            panic!("expected an Opus header");
        };
        assert_eq!(details.mode, OpusMode::Hybrid);
        assert_eq!(details.pre_skip, 312);
    }

    #[test]
    fn audio_without_id_header_is_dropped() {
        let mut parser = OpusParser::default();
        let mut cache = HeaderCache::new(None);
        let buffer = ChunkBuffer::new();

        let mut broken_id = page_with_segments(vec![b"OpusHxxx".to_vec()]);
        parser
            .parse_ogg_page(&mut broken_id, &mut cache, &buffer, &stats())
            .unwrap();

        let mut tags_page = page_with_segments(vec![b"OpusTags".to_vec()]);
        parser
            .parse_ogg_page(&mut tags_page, &mut cache, &buffer, &stats())
            .unwrap();

        let mut audio_page = page_with_segments(vec![vec![0x78]]);
        parser
            .parse_ogg_page(&mut audio_page, &mut cache, &buffer, &stats())
            .unwrap();
        assert!(audio_page.codec_frames.is_empty());
    }
}
