//! Ogg container demuxing.
//!
//! Pages are located with the fixed-length sync skeleton and validated
//! against their CRC-32 before anything else looks at them. Packets are
//! stitched across page boundaries, the codec is identified from the first
//! payload signature, and each page is dispatched to the nested codec
//! parser, which populates the page's codec frames.

use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::process::flac::OggFlacParser;
use crate::process::opus::OpusParser;
use crate::process::vorbis::VorbisParser;
use crate::process::{LogStats, fixed_length_frame_sync};
use crate::structs::Probe;
use crate::structs::ogg::{OggPage, OggPageHeader};
use crate::structs::opus::OpusHeader;
use crate::structs::vorbis::VorbisHeader;
use crate::utils::crc::CRC_32_OGG;
use crate::utils::errors::DemuxError;

const FLAC_ID_MAGIC: &[u8] = b"\x7fFLAC";
const SKELETON_MAGICS: [&[u8]; 3] = [b"fishead\0", b"fisbone\0", b"index\0\0\0"];

#[derive(Debug)]
enum NestedParser {
    Opus(OpusParser),
    Vorbis(VorbisParser),
    Flac(OggFlacParser),
}

enum Identification {
    Codec(NestedParser, &'static str),
    Skeleton,
    Unknown,
}

#[derive(Debug, Default)]
pub struct OggParser {
    nested: Option<NestedParser>,
    codec: &'static str,
    continued_packet: Vec<u8>,
    prev_sequence_number: Option<u32>,
    warned_unsupported: bool,
}

impl OggParser {
    pub(crate) fn new() -> Self {
        Self {
            codec: "",
            ..Self::default()
        }
    }

    /// The identified nested codec tag, "" until the first signature page.
    pub(crate) fn codec(&self) -> &'static str {
        self.codec
    }

    pub(crate) fn parse_frame(
        &mut self,
        buffer: &mut ChunkBuffer,
        cache: &mut HeaderCache,
        stats: &LogStats<'_>,
    ) -> Result<Option<OggPage>, DemuxError> {
        loop {
            let synced = fixed_length_frame_sync(
                buffer,
                cache,
                stats,
                false,
                |header: &OggPageHeader| header.frame_length,
                |buffer, offset, _cache| Self::read_page(buffer, offset, stats),
            )?;
            let Some((header, raw)) = synced else {
                return Ok(None);
            };

            let mut page = OggPage::from_parts(header, raw);

            // Continued-packet stitching: a terminal 255 lacing value means
            // the last packet spills onto the next page; otherwise a pending
            // continuation completes this page's first packet.
            if page.segment_table.last() == Some(&255) {
                if let Some(tail) = page.segments.pop() {
                    self.continued_packet.extend_from_slice(&tail);
                }
            } else if !self.continued_packet.is_empty() {
                if let Some(first) = page.segments.first_mut() {
                    let mut joined = std::mem::take(&mut self.continued_packet);
                    joined.extend_from_slice(first);
                    *first = joined;
                }
            }

            if let Some(previous) = self.prev_sequence_number {
                if sequence_discontinuity(previous, page.page_sequence_number) {
                    stats.warn(
                        buffer,
                        &format!(
                            "Expected page sequence number {}, got {}. \
                             Pages may have been lost or delivered out of order.",
                            previous.wrapping_add(1),
                            page.page_sequence_number
                        ),
                    );
                }
            }
            self.prev_sequence_number = Some(page.page_sequence_number);

            if self.nested.is_none() {
                match Self::identify_codec(&page.data) {
                    Identification::Codec(parser, codec) => {
                        self.nested = Some(parser);
                        self.codec = codec;
                    }
                    Identification::Skeleton => continue,
                    Identification::Unknown => {
                        if !self.warned_unsupported {
                            stats.warn(buffer, "Unsupported codec in Ogg stream.");
                            self.warned_unsupported = true;
                        }
                        continue;
                    }
                }
            }

            match self.nested.as_mut() {
                Some(NestedParser::Opus(parser)) => {
                    parser.parse_ogg_page(&mut page, cache, buffer, stats)?;
                }
                Some(NestedParser::Vorbis(parser)) => {
                    parser.parse_ogg_page(&mut page, cache, buffer, stats)?;
                }
                Some(NestedParser::Flac(parser)) => {
                    parser.parse_ogg_page(&mut page, cache, buffer, stats)?;
                }
                None => unreachable!("nested parser set during identification"),
            }

            return Ok(Some(page));
        }
    }

    /// Parses a page header at `offset` and validates the whole page
    /// against its CRC-32 with the checksum field zeroed.
    fn read_page(
        buffer: &ChunkBuffer,
        offset: usize,
        stats: &LogStats<'_>,
    ) -> Probe<OggPageHeader> {
        let Some(view) = buffer.view(OggPageHeader::FIXED_LENGTH, offset) else {
            return Probe::NeedData;
        };

        let header = match OggPageHeader::parse(view) {
            Probe::Valid(header) => header,
            Probe::NeedData => return Probe::NeedData,
            Probe::Invalid => return Probe::Invalid,
        };

        // the full page must be buffered before the checksum can run
        if header.frame_length > view.len() {
            if buffer.flushing() {
                return Probe::Invalid;
            }
            return Probe::NeedData;
        }
        let page = &view[..header.frame_length];

        let mut crc = CRC_32_OGG.begin();
        crc = CRC_32_OGG.update(crc, &page[..22]);
        crc = CRC_32_OGG.update(crc, &[0, 0, 0, 0]);
        crc = CRC_32_OGG.update(crc, &page[26..]);

        if CRC_32_OGG.finalize(crc) != header.page_checksum {
            stats.warn(
                buffer,
                &format!(
                    "Ogg page checksum mismatch for page {}. Skipping page.",
                    header.page_sequence_number
                ),
            );
            return Probe::Invalid;
        }

        Probe::Valid(header)
    }

    fn identify_codec(payload: &[u8]) -> Identification {
        if payload.starts_with(OpusHeader::MAGIC) {
            return Identification::Codec(NestedParser::Opus(OpusParser::default()), "opus");
        }
        if payload.starts_with(VorbisHeader::MAGIC) {
            return Identification::Codec(NestedParser::Vorbis(VorbisParser::default()), "vorbis");
        }
        if payload.starts_with(FLAC_ID_MAGIC) {
            return Identification::Codec(NestedParser::Flac(OggFlacParser::default()), "flac");
        }
        if SKELETON_MAGICS.iter().any(|magic| payload.starts_with(magic)) {
            return Identification::Skeleton;
        }

        Identification::Unknown
    }
}

/// An out-of-order page warrants a warning only once both sides of the
/// comparison are past stream startup (sequence numbers above 1).
fn sequence_discontinuity(previous: u32, current: u32) -> bool {
    current != previous.wrapping_add(1) && previous > 1 && current > 1
}
