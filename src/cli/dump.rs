use anyhow::Result;

use codecframe::process::demux::{Demuxer, DemuxerOptions};
use codecframe::structs::frame::Frame;

use super::command::{DumpArgs, resolve_mime};
use crate::input::InputReader;

pub fn cmd_dump(args: &DumpArgs) -> Result<()> {
    let mime = resolve_mime(&args.input, args.mime.as_deref())?;

    let mut demuxer = Demuxer::new(
        &mime,
        DemuxerOptions {
            enable_logging: true,
            ..Default::default()
        },
    )?;
    let mut input = InputReader::new(&args.input)?;

    let limit = args.limit.unwrap_or(u64::MAX);
    let mut printed = 0u64;

    input.process_chunks(64 * 1024, |chunk| {
        for frame in demuxer.parse_chunk(chunk) {
            print_frame(&frame?, &mut printed);
            if printed >= limit {
                return Ok(false);
            }
        }
        Ok(true)
    })?;

    if printed < limit {
        for frame in demuxer.flush() {
            print_frame(&frame?, &mut printed);
            if printed >= limit {
                break;
            }
        }
    }

    Ok(())
}

fn print_frame(frame: &Frame, printed: &mut u64) {
    if let Frame::Page(page) = frame {
        println!(
            "page  seq={:<6} granule={:<12} packets={:<3} bytes={}",
            page.page_sequence_number,
            page.absolute_granule_position,
            page.segments.len(),
            page.raw_data.len(),
        );
    }

    for codec_frame in frame.codec_frames() {
        println!(
            "{:>8}  bytes={:<6} samples={:<5} duration={:>8.3}ms  bitrate={:<4} crc32={:08X}",
            codec_frame.frame_number,
            codec_frame.data.len(),
            codec_frame.samples,
            codec_frame.duration,
            codec_frame.header.bitrate,
            codec_frame.crc32,
        );
        *printed += 1;
    }
}
