use std::io::Read;
use std::thread::JoinHandle;

use crate::encoder::domain::encoder_event::{DiagnosticStream, EncoderEventSink};

const READ_CHUNK: usize = 8 * 1024;

/// Longest line kept before it is force-split; ffmpeg never gets close.
const MAX_LINE: usize = 64 * 1024;

/// Reads `stream` until EOF, forwarding every line to `sink`.
///
/// The encoder blocks as soon as its diagnostic pipe fills up, so this must
/// keep running for the whole lifetime of the process. ffmpeg redraws its
/// progress line with `\r`, so both `\r` and `\n` end a line.
pub(crate) fn spawn_drain<R>(
    mut stream: R,
    kind: DiagnosticStream,
    sink: EncoderEventSink,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    let name = match kind {
        DiagnosticStream::Stdout => "encoder stdout",
        DiagnosticStream::Stderr => "encoder stderr",
    };
    std::thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK];
        let mut line = Vec::new();
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("{name}: read failed, stopping drain: {e}");
                    break;
                }
            };
            for &byte in &chunk[..n] {
                if byte == b'\n' || byte == b'\r' {
                    flush_line(&mut line, kind, &sink);
                } else {
                    line.push(byte);
                    if line.len() >= MAX_LINE {
                        flush_line(&mut line, kind, &sink);
                    }
                }
            }
        }
        flush_line(&mut line, kind, &sink);
    })
}

fn flush_line(line: &mut Vec<u8>, kind: DiagnosticStream, sink: &EncoderEventSink) {
    if line.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(line).trim_end().to_string();
    line.clear();
    if !text.is_empty() {
        sink.diagnostic(kind, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::domain::encoder_event::EncoderEvent;
    use std::io::Cursor;

    fn drained_lines(input: &[u8]) -> Vec<String> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EncoderEventSink::new(1, tx);
        spawn_drain(Cursor::new(input.to_vec()), DiagnosticStream::Stderr, sink)
            .join()
            .unwrap();
        rx.try_iter()
            .map(|event| match event {
                EncoderEvent::Diagnostic { line, stream, .. } => {
                    assert_eq!(stream, DiagnosticStream::Stderr);
                    line
                }
                other => panic!("unexpected event {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_splits_on_newlines() {
        assert_eq!(drained_lines(b"one\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_splits_carriage_return_progress_lines() {
        let lines = drained_lines(b"frame=  1 fps=0.0\rframe=  2 fps=1.0\r\n");
        assert_eq!(lines, vec!["frame=  1 fps=0.0", "frame=  2 fps=1.0"]);
    }

    #[test]
    fn test_trailing_text_without_newline_is_flushed() {
        assert_eq!(drained_lines(b"partial"), vec!["partial"]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        assert_eq!(drained_lines(b"\n\n  \nx\n"), vec!["x"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let lines = drained_lines(b"ok \xff\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }
}
