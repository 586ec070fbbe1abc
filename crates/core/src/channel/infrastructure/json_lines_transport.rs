use std::io::{BufRead, Write};

use crossbeam_channel::Receiver;

use crate::channel::domain::envelope::{Envelope, EnvelopeSink};
use crate::shared::error::RecorderError;

/// Writes one JSON envelope per line and flushes after each.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EnvelopeSink for JsonLinesSink<W> {
    fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), RecorderError> {
        serde_json::to_writer(&mut self.writer, envelope)
            .map_err(|e| RecorderError::Transport(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| RecorderError::Transport(e.to_string()))
    }
}

/// Reads envelopes line by line on a dedicated thread.
///
/// The channel holds a single envelope, so a producer that floods the
/// connection is held back by the transport instead of piling up frames in
/// memory. Malformed lines are logged and skipped; the channel disconnects
/// at end of input.
pub fn spawn_reader<R: BufRead + Send + 'static>(reader: R) -> Receiver<Envelope> {
    let (tx, rx) = crossbeam_channel::bounded(1);

    std::thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Control channel read failed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => {
                    if tx.send(envelope).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("Skipping malformed control message: {e}"),
            }
        }
        log::debug!("Control channel reader finished");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_sink_writes_one_line_per_envelope() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.send_envelope(&Envelope::new("ssam:ffmpeg-reqframe", json!({})))
            .unwrap();
        sink.send_envelope(&Envelope::new("ssam:log", json!({"msg": "hi"})))
            .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Envelope = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, Envelope::new("ssam:log", json!({"msg": "hi"})));
    }

    #[test]
    fn test_reader_skips_malformed_lines() {
        let input = concat!(
            "{\"event\":\"ssam:ffmpeg\",\"data\":{\"fps\":30}}\n",
            "not json\n",
            "\n",
            "{\"event\":\"ssam:ffmpeg-done\"}\n",
        );
        let rx = spawn_reader(Cursor::new(input.as_bytes().to_vec()));
        let received: Vec<Envelope> = rx.iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].event, "ssam:ffmpeg");
        assert_eq!(received[1].event, "ssam:ffmpeg-done");
    }

    #[test]
    fn test_reader_disconnects_at_end_of_input() {
        let rx = spawn_reader(Cursor::new(Vec::new()));
        assert!(rx.recv().is_err());
    }
}
