mod diagnostics_drain;
pub mod ffmpeg_launcher;
pub mod ffmpeg_process;
