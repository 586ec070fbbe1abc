mod settings;

use std::io::{self, BufReader};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use framepipe_core::channel::control_channel_adapter::ControlChannelAdapter;
use framepipe_core::channel::infrastructure::json_lines_transport::{spawn_reader, JsonLinesSink};
use framepipe_core::codec::infrastructure::data_url_decoder::DataUrlDecoder;
use framepipe_core::encoder::infrastructure::ffmpeg_launcher::FfmpegLauncher;
use framepipe_core::recording::event_loop::run_connection;
use framepipe_core::recording::streaming_controller::StreamingController;
use framepipe_core::shared::session_config::InputFormat;

use settings::Settings;

/// Records frames streamed by a producer into a video file using ffmpeg.
///
/// Control messages are newline-delimited JSON envelopes, read from stdin
/// and answered on stdout unless --listen is given.
#[derive(Parser)]
#[command(name = "framepipe")]
struct Cli {
    /// Accept producer connections on this TCP address (e.g. 127.0.0.1:9000).
    #[arg(long)]
    listen: Option<String>,

    /// Output video file (overwritten by every recording).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Path to the ffmpeg binary.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Image format the producer renders frames in: png or jpeg.
    #[arg(long)]
    input_format: Option<InputFormat>,

    /// H.264 CRF quality (0=lossless, 51=worst, default 18).
    #[arg(long)]
    crf: Option<u32>,

    /// x264 preset (ultrafast ... veryslow).
    #[arg(long)]
    preset: Option<String>,

    /// Seconds to wait for ffmpeg to finalize the file after the last frame.
    #[arg(long)]
    finish_timeout: Option<u64>,

    /// Prefix of the control message names.
    #[arg(long)]
    prefix: Option<String>,

    /// Ask ffmpeg to write a report file for each recording.
    #[arg(long)]
    report: bool,

    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    let launcher = FfmpegLauncher::new().with_program(&settings.ffmpeg);
    log::info!("Using encoder binary {}", launcher.program().display());
    let mut controller = StreamingController::new(
        Box::new(launcher),
        Box::new(DataUrlDecoder::new()),
        settings.controller_settings(),
    );
    // An unavailable encoder is reported to every producer that connects.
    if let Err(e) = controller.attach() {
        log::warn!("{e}");
    }

    let adapter = ControlChannelAdapter::with_prefix(&settings.message_prefix);
    match &cli.listen {
        Some(addr) => serve_tcp(addr, &mut controller, &adapter)?,
        None => serve_stdio(&mut controller, &adapter),
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(output) = &cli.output {
        settings.output = output.clone();
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        settings.ffmpeg = ffmpeg.clone();
    }
    if let Some(format) = cli.input_format {
        settings.input_format = format;
    }
    if let Some(crf) = cli.crf {
        settings.encoding.crf = crf;
    }
    if let Some(preset) = &cli.preset {
        settings.encoding.preset = preset.clone();
    }
    if let Some(secs) = cli.finish_timeout {
        settings.finish_timeout_secs = secs;
    }
    if let Some(prefix) = &cli.prefix {
        settings.message_prefix = prefix.clone();
    }
    if cli.report {
        settings.encoding.report = true;
    }
}

fn serve_stdio(controller: &mut StreamingController, adapter: &ControlChannelAdapter) {
    controller.connect(adapter.outbox(JsonLinesSink::new(io::stdout())));
    let inbound = spawn_reader(BufReader::new(io::stdin()));
    let outcome = run_connection(controller, adapter, inbound);
    log::info!("Input closed ({outcome:?})");
}

/// Serves producers one connection at a time; the probe result and settings
/// carry over between connections.
fn serve_tcp(
    addr: &str,
    controller: &mut StreamingController,
    adapter: &ControlChannelAdapter,
) -> io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    log::info!("Listening on {}", listener.local_addr()?);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Failed to accept connection: {e}");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                log::warn!("Dropping connection from {peer}: {e}");
                continue;
            }
        };

        log::info!("Producer connected from {peer}");
        controller.connect(adapter.outbox(JsonLinesSink::new(writer)));
        let outcome = run_connection(controller, adapter, spawn_reader(BufReader::new(stream)));
        log::info!("Connection from {peer} closed ({outcome:?})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "framepipe",
            "--output",
            "/tmp/a.mp4",
            "--input-format",
            "jpeg",
            "--crf",
            "23",
            "--preset",
            "veryfast",
            "--finish-timeout",
            "5",
            "--prefix",
            "sketch",
            "--report",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);

        assert_eq!(settings.output, PathBuf::from("/tmp/a.mp4"));
        assert_eq!(settings.input_format, InputFormat::Jpeg);
        assert_eq!(settings.encoding.crf, 23);
        assert_eq!(settings.encoding.preset, "veryfast");
        assert_eq!(settings.finish_timeout_secs, 5);
        assert_eq!(settings.message_prefix, "sketch");
        assert!(settings.encoding.report);
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let cli = Cli::parse_from(["framepipe"]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings, Settings::default());
        assert!(cli.listen.is_none());
    }

    #[test]
    fn test_unknown_input_format_is_rejected() {
        assert!(Cli::try_parse_from(["framepipe", "--input-format", "gif"]).is_err());
    }
}
