//! Vorbis packets carried in Ogg.
//!
//! The first dispatched page holds the identification header; the second
//! carries the comment and setup packets. The setup packet is scanned in
//! reverse to recover the mode-index to block-flag mapping, which sizes
//! every subsequent audio packet.

use std::collections::HashMap;

use crate::process::LogStats;
use crate::process::buffer::ChunkBuffer;
use crate::process::cache::HeaderCache;
use crate::structs::frame::{CodecFrame, CodecHeader};
use crate::structs::ogg::OggPage;
use crate::structs::vorbis::VorbisHeader;
use crate::utils::bits::{ReverseBitReader, reverse_byte};
use crate::utils::errors::{DemuxError, VorbisError};

/// Mode-index to block-flag mapping recovered from the setup header.
#[derive(Debug)]
pub(crate) struct ModeTable {
    flags: HashMap<u8, bool>,
    mask: u8,
    prev_mask: u8,
}

#[derive(Debug, Default)]
pub struct VorbisParser {
    page_index: usize,
    id_header: Option<VorbisHeader>,
    codec_header: Option<CodecHeader>,
    /// Identification packet bytes, preserved for cache keying.
    id_raw: Vec<u8>,
    mode: Option<ModeTable>,
    prev_block_size: u32,
}

impl VorbisParser {
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
                let id = page
                    .segments
                    .first()
                    .and_then(|packet| {
                        VorbisHeader::parse_id(packet).map(|header| (header, packet.clone()))
                    })
                    .ok_or(VorbisError::InvalidIdentification)?;

                self.codec_header = Some(id.0.to_codec_header());
                self.id_header = Some(id.0);
                self.id_raw = id.1;
            }
            1 => {
                // [comments, setup]; comment metadata is not interpreted
                let setup = page.segments.get(1).ok_or(VorbisError::MissingSetup)?;
                self.mode = Some(parse_setup_header(setup)?);
            }
            _ => {
                let (Some(id), Some(mode)) = (&self.id_header, &self.mode) else {
                    return Err(VorbisError::MissingSetup.into());
                };

                for packet in &page.segments {
                    let Some(&first) = packet.first() else {
                        stats.warn(buffer, "Dropping empty Vorbis packet.");
                        continue;
                    };

                    let samples = packet_samples(
                        first,
                        mode,
                        id.blocksize0,
                        id.blocksize1,
                        &mut self.prev_block_size,
                    );

                    let codec_header = match cache.get_header(&self.id_raw) {
                        Some(cached) => cached,
                        None => {
                            let header = self
                                .codec_header
                                .clone()
                                .unwrap_or_else(|| id.to_codec_header());
                            cache.set_header(&self.id_raw, header.clone(), header.params());
                            header
                        }
                    };

                    page.codec_frames.push(CodecFrame {
                        header: codec_header,
                        data: packet.clone(),
                        samples,
                        duration: samples as f64 / id.sample_rate as f64 * 1000.0,
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

/// Samples contributed by one audio packet: the average of the previous and
/// current window sizes, with the previous size re-derived from the packet
/// when a long window is selected.
fn packet_samples(
    first_byte: u8,
    mode: &ModeTable,
    blocksize0: u32,
    blocksize1: u32,
    prev_block_size: &mut u32,
) -> u32 {
    let byte = first_byte >> 1;
    let block_flag = mode.flags.get(&(byte & mode.mask)).copied().unwrap_or(false);

    if block_flag {
        *prev_block_size = if byte & mode.prev_mask != 0 {
            blocksize1
        } else {
            blocksize0
        };
    }

    let current_block_size = if block_flag { blocksize1 } else { blocksize0 };
    let samples = (*prev_block_size + current_block_size) >> 2;
    *prev_block_size = current_block_size;

    samples
}

/// Recovers the mode table by scanning the setup packet backward.
///
/// Mode entries sit just before the trailing framing bit: each is a mapping
/// byte preceded by sixteen zero window-type bits, sixteen zero
/// transform-type bits and the block flag. The scan stops at the first
/// non-zero window/transform group and cross-checks the entry count against
/// the coded mode count next to it.
pub(crate) fn parse_setup_header(setup: &[u8]) -> Result<ModeTable, VorbisError> {
    let mut reader = ReverseBitReader::new(setup);

    // sync with the framing bit
    while reader.read(1) & 0x01 != 1 {
        if reader.position() <= 0 {
            return Err(VorbisError::FramingBitNotFound);
        }
    }

    let mut flags: HashMap<u8, bool> = HashMap::new();
    let mut count = 0usize;
    let mut mode_bits: Option<u32> = None;

    while count < 64 && reader.position() > 0 {
        let mapping = reverse_byte(reader.read(8) as u8);

        if flags.contains_key(&mapping) && !(count == 1 && mapping == 0) {
            return Err(VorbisError::DuplicateModeMapping(mapping));
        }

        // window type and transform type must be all zeros
        let mut zero_groups = 0;
        while zero_groups < 4 && reader.read(8) == 0 {
            zero_groups += 1;
        }

        if zero_groups == 4 {
            let bits = reader.read(7);
            flags.insert(mapping, bits & 0x01 == 1);
            count += 1;
            mode_bits = Some(bits);
            // rewind so the next iteration starts right after the block flag
            reader.rewind(6);
        } else {
            // a non-zero group marks the end of the mode entries; the six
            // bits beyond the last block flag are the coded mode count
            let Some(bits) = mode_bits else {
                return Err(VorbisError::NoModes);
            };
            let coded = (((reverse_byte(bits as u8) & 0b0111_1110) >> 1) + 1) as usize;
            if coded != count {
                return Err(VorbisError::ModeCountMismatch {
                    scanned: count,
                    coded,
                });
            }
            break;
        }
    }

    if count == 0 {
        return Err(VorbisError::NoModes);
    }

    let mask = (1u32 << count.ilog2()) - 1;
    Ok(ModeTable {
        flags,
        mask: mask as u8,
        prev_mask: (mask as u8 | 0x01) + 1,
    })
}
