use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use codecframe::process::demux::{Demuxer, DemuxerOptions};
use codecframe::structs::frame::{CodecHeader, Frame};

use super::command::{InfoArgs, resolve_mime};
use crate::input::InputReader;
use crate::timestamp::time_str;

pub fn cmd_info(args: &InfoArgs, multi: Option<&MultiProgress>) -> Result<()> {
    let mime = resolve_mime(&args.input, args.mime.as_deref())?;
    log::info!("Analyzing {} as {mime}", args.input.display());

    let codec: Rc<RefCell<String>> = Rc::default();
    let codec_sink = codec.clone();
    let options = DemuxerOptions {
        on_codec: Some(Box::new(move |tag| {
            *codec_sink.borrow_mut() = tag.to_string();
        })),
        enable_logging: true,
        ..Default::default()
    };

    let mut demuxer = Demuxer::new(&mime, options)?;
    let mut input = InputReader::new(&args.input)?;
    let mut summary = Summary::default();

    let pb = multi.map(|multi| {
        let pb = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing frames...");
        pb
    });

    input.process_chunks(64 * 1024, |chunk| {
        summary.total_bytes_in += chunk.len() as u64;
        for frame in demuxer.parse_chunk(chunk) {
            summary.record(&frame?);
        }

        if let Some(ref pb) = pb {
            pb.set_message(format!("Analyzing frames...       {}", summary.frames));
            pb.tick();
        }

        Ok(true)
    })?;

    for frame in demuxer.flush() {
        summary.record(&frame?);
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    summary.print(&mime, &codec.borrow());
    Ok(())
}

#[derive(Default)]
struct Summary {
    first_header: Option<CodecHeader>,
    frames: u64,
    pages: u64,
    total_bytes_in: u64,
    data_bytes: u64,
    samples: u64,
    sample_rate: u32,
}

impl Summary {
    fn record(&mut self, frame: &Frame) {
        if let Frame::Page(_) = frame {
            self.pages += 1;
        }

        for codec_frame in frame.codec_frames() {
            self.frames += 1;
            self.data_bytes += codec_frame.data.len() as u64;
            self.samples += codec_frame.samples as u64;
            self.sample_rate = codec_frame.header.sample_rate;

            if self.first_header.is_none() {
                self.first_header = Some(codec_frame.header.clone());
            }
        }
    }

    fn print(&self, mime: &str, codec: &str) {
        let Some(header) = &self.first_header else {
            println!("No audio frames found in the input.");
            println!("This doesn't appear to be a valid {mime} stream.");
            return;
        };

        println!();
        println!("Stream Information");
        println!("  Codec                     {codec}");
        println!("  Sample rate               {} Hz", header.sample_rate);
        println!(
            "  Channels                  {} ({})",
            header.channels, header.channel_mode
        );
        println!("  Bit depth                 {}", header.bit_depth);
        println!();

        println!("Analysis Summary");
        println!("  Frames processed          {}", self.frames);
        if self.pages > 0 {
            println!("  Ogg pages                 {}", self.pages);
        }

        let size_mb = self.total_bytes_in as f64 / 1_000_000.0;
        println!(
            "  Size                      {size_mb:.2} MB ({} bytes)",
            self.total_bytes_in
        );

        if self.sample_rate > 0 {
            let duration_ms = self.samples as f64 / self.sample_rate as f64 * 1000.0;
            println!("  Duration                  {}", time_str(duration_ms));

            if duration_ms > 0.0 {
                let avg_kbps = self.data_bytes as f64 * 8.0 / duration_ms;
                println!("  Average data rate         {avg_kbps:.1} kbps");
            }
        }
        println!();
    }
}
