use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pdcc_lib::constants::DEFAULT_BIT_RATE_HZ;
use pdcc_lib::sim::TrafficGenerator;
use pdcc_lib::{Capture, DecodeError, DecoderConfig, Frame, FrameSink, TransactionDecoder};

/// USB Power Delivery CC-line decoder for recorded logic captures.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode every transaction in a capture file.
    Decode(DecodeArgs),
    /// Write a synthetic capture with a power negotiation in it.
    Simulate {
        /// Destination capture JSON.
        capture: PathBuf,
        /// Number of messages to generate.
        #[arg(short, long, default_value_t = 5)]
        messages: usize,
        #[arg(long, default_value_t = DEFAULT_BIT_RATE_HZ)]
        bit_rate: u32,
        #[arg(long, default_value_t = DEFAULT_BIT_RATE_HZ * 8)]
        sample_rate: u32,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Capture JSON: sample rate, initial level and transition sample indices.
    capture: PathBuf,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write frames here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Nominal BMC bit rate in bits per second.
    #[arg(long, default_value_t = DEFAULT_BIT_RATE_HZ)]
    bit_rate: u32,
    /// Override the sample rate recorded in the capture.
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Accepted deviation of a mid-bit edge, as a fraction of half a bit.
    #[arg(long)]
    tolerance: Option<f64>,
    /// Also emit one frame per decoded byte.
    #[arg(long)]
    byte_frames: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

fn setup_logging(
    log_file_path: Option<PathBuf>,
    verbosity: &Verbosity<InfoLevel>,
) -> Result<Option<WorkerGuard>> {
    // Frames go to stdout, logs to stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path)
            .with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

/// Streams frames to a writer, one transaction attempt at a time.
struct FrameWriter<W: Write> {
    out: W,
    format: OutputFormat,
    sample_rate_hz: u32,
    pending: Vec<Frame>,
    written: usize,
    error: Option<io::Error>,
}

impl<W: Write> FrameWriter<W> {
    fn new(out: W, format: OutputFormat, sample_rate_hz: u32) -> Self {
        Self {
            out,
            format,
            sample_rate_hz,
            pending: Vec::new(),
            written: 0,
            error: None,
        }
    }

    fn time_s(&self, frame: &Frame) -> f64 {
        frame.start_sample as f64 / self.sample_rate_hz as f64
    }

    fn write_header(&mut self) -> io::Result<()> {
        if self.format == OutputFormat::Csv {
            writeln!(self.out, "Time [s],Type,Data1,Data2")?;
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let time = self.time_s(frame);
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{:>14.9}  {}", time, frame),
            OutputFormat::Csv => writeln!(
                self.out,
                "{:.9},{},0x{:X},0x{:X}",
                time, frame.kind, frame.data1, frame.data2
            ),
            OutputFormat::Json => {
                let line = serde_json::json!({
                    "time_s": time,
                    "frame": frame,
                    "text": frame.to_string(),
                });
                writeln!(self.out, "{}", line)
            }
        }
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        let frames = std::mem::take(&mut self.pending);
        for frame in &frames {
            self.write_frame(frame)?;
        }
        self.written += frames.len();
        self.out.flush()
    }

    /// Surface the first write error seen while decoding.
    fn finish(mut self) -> io::Result<usize> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.flush_pending()?;
        Ok(self.written)
    }
}

impl<W: Write> FrameSink for FrameWriter<W> {
    fn add_frame(&mut self, frame: Frame) {
        self.pending.push(frame);
    }

    fn commit(&mut self) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.flush_pending() {
            warn!("Failed to write frames: {}", e);
            self.error = Some(e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = setup_logging(cli.log_file, &cli.verbose)?;

    let result = match cli.command {
        Command::Decode(args) => run_decode(args).await,
        Command::Simulate {
            capture,
            messages,
            bit_rate,
            sample_rate,
        } => run_simulate(capture, messages, bit_rate, sample_rate),
    };

    if let Err(e) = result {
        error!("{:?}", e);
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_decode(options: DecodeArgs) -> Result<()> {
    let capture = Capture::load(&options.capture)
        .with_context(|| format!("Failed to load capture {:?}", options.capture))?;
    let sample_rate = options.sample_rate.unwrap_or(capture.sample_rate_hz);

    let mut config = DecoderConfig::new(options.bit_rate, sample_rate).with_byte_frames(options.byte_frames);
    if let Some(tolerance) = options.tolerance {
        config = config.with_tolerance(tolerance);
    }
    let mut decoder = TransactionDecoder::new(config).context("Invalid decoder settings")?;

    info!(
        transitions = capture.transitions.len(),
        duration_s = capture.duration_s(),
        bit_rate = config.bit_rate_hz,
        sample_rate = config.sample_rate_hz,
        "Decoding capture"
    );

    let out: Box<dyn Write + Send> = match &options.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = FrameWriter::new(out, options.format, sample_rate);
    writer.write_header().context("Failed to write output")?;

    let mut cursor = capture.into_cursor()?;
    let cancel = Arc::new(AtomicBool::new(false));

    let worker_cancel = Arc::clone(&cancel);
    let mut task = tokio::task::spawn_blocking(move || {
        let result = decoder.run(&mut cursor, &mut writer, &worker_cancel);
        (result, writer)
    });

    let (result, writer) = tokio::select! {
        joined = &mut task => joined?,
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, stopping after the current transaction.");
            cancel.store(true, Ordering::Relaxed);
            task.await?
        }
    };

    let frames = writer.finish().context("Failed to write output")?;
    match result {
        Ok(transactions) => {
            info!(transactions, frames, "Decoding finished");
            Ok(())
        }
        Err(DecodeError::Cancelled) => {
            warn!(frames, "Decoding cancelled");
            Ok(())
        }
        Err(e) => bail!("Decoding failed: {}", e),
    }
}

fn run_simulate(path: PathBuf, messages: usize, bit_rate: u32, sample_rate: u32) -> Result<()> {
    let config = DecoderConfig::new(bit_rate, sample_rate);
    config.validate().context("Invalid simulation settings")?;

    let mut generator = TrafficGenerator::new(&config);
    generator.negotiation(messages);
    let capture = generator.into_capture();
    capture
        .save(&path)
        .with_context(|| format!("Failed to write capture {:?}", path))?;

    info!(
        messages,
        transitions = capture.transitions.len(),
        duration_s = capture.duration_s(),
        "Wrote {:?}",
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdcc_lib::FrameKind;

    fn crc_frame() -> Frame {
        Frame::new(FrameKind::Crc32, 0xDEAD_BEEF, 0x1234_5678, 2_400, 2_431)
    }

    #[test]
    fn test_csv_columns() {
        let mut writer = FrameWriter::new(Vec::new(), OutputFormat::Csv, 2_400_000);
        writer.write_header().unwrap();
        writer.add_frame(crc_frame());
        writer.add_frame(Frame::new(FrameKind::Eop, 1, 0, 4_800, 4_840));
        writer.commit();

        let text = String::from_utf8(writer.out.clone()).unwrap();
        assert_eq!(
            text,
            "Time [s],Type,Data1,Data2\n\
             0.001000000,Crc32,0xDEADBEEF,0x12345678\n\
             0.002000000,Eop,0x1,0x0\n"
        );
        assert_eq!(writer.finish().unwrap(), 2);
    }

    #[test]
    fn test_frames_held_until_commit() {
        let mut writer = FrameWriter::new(Vec::new(), OutputFormat::Csv, 2_400_000);
        writer.write_header().unwrap();
        writer.add_frame(crc_frame());
        assert_eq!(writer.out, b"Time [s],Type,Data1,Data2\n");
        writer.commit();
        assert!(writer.out.ends_with(b"0x12345678\n"));
    }

    #[test]
    fn test_json_lines() {
        let mut writer = FrameWriter::new(Vec::new(), OutputFormat::Json, 2_400_000);
        writer.write_header().unwrap();
        writer.add_frame(crc_frame());
        writer.commit();

        let text = String::from_utf8(writer.out.clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(line["frame"]["kind"], "Crc32");
        assert_eq!(line["frame"]["data1"], 0xDEAD_BEEFu64);
        assert_eq!(line["frame"]["start_sample"], 2_400);
        assert_eq!(line["time_s"], 0.001);
        assert!(line["text"].as_str().unwrap().contains("MISMATCH"));
    }

    #[test]
    fn test_text_line_uses_frame_display() {
        let mut writer = FrameWriter::new(Vec::new(), OutputFormat::Text, 2_400_000);
        writer.add_frame(crc_frame());
        writer.commit();

        let text = String::from_utf8(writer.out.clone()).unwrap();
        assert_eq!(text, format!("{:>14.9}  {}\n", 0.001, crc_frame()));
    }
}
