use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;

use crate::codec::domain::frame_decoder::FrameDecoder;
use crate::shared::error::DecodeError;
use crate::shared::frame::Frame;

/// Decodes `data:<media type>[;param...];base64,<body>` payloads such as the
/// ones a browser canvas produces with `toDataURL()`.
///
/// No pixel conversion happens here; the producer must already render in the
/// format the encoder was configured for.
#[derive(Debug, Default)]
pub struct DataUrlDecoder;

impl DataUrlDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for DataUrlDecoder {
    fn decode(&self, sequence_index: u64, payload: &str) -> Result<Frame, DecodeError> {
        let (header, body) = payload
            .split_once(',')
            .ok_or(DecodeError::MissingSeparator)?;
        let media_type = parse_header(header)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(DecodeError::Empty);
        }
        if body.len() % 4 != 0 {
            return Err(DecodeError::InvalidLength(body.len()));
        }

        let data = STANDARD
            .decode(body)
            .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let detected = image::guess_format(&data).ok();
        if let (Some(declared), Some(detected)) = (ImageFormat::from_mime_type(media_type), detected)
        {
            if declared != detected {
                return Err(DecodeError::FormatMismatch {
                    declared: media_type.to_string(),
                    detected: format!("{detected:?}"),
                });
            }
        }

        Ok(Frame::new(data, detected, sequence_index))
    }
}

/// Validates `data:<media type>[;params];base64` and returns the media type.
fn parse_header(header: &str) -> Result<&str, DecodeError> {
    let rest = header
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| DecodeError::MalformedHeader(truncate(header)))?;

    let mut parts = rest.split(';');
    let media_type = parts.next().unwrap_or_default().trim();
    if !media_type.is_empty() && !media_type.contains('/') {
        return Err(DecodeError::MalformedHeader(truncate(header)));
    }

    let is_base64 = parts
        .last()
        .map(|p| p.trim().eq_ignore_ascii_case("base64"))
        .unwrap_or(false);
    if !is_base64 {
        return Err(DecodeError::NotBase64(truncate(header)));
    }
    Ok(media_type)
}

/// Keeps error messages short when the producer sends garbage.
fn truncate(text: &str) -> String {
    const MAX: usize = 64;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

    fn data_url(media_type: &str, bytes: &[u8]) -> String {
        format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn test_decodes_png_data_url() {
        let frame = DataUrlDecoder::new()
            .decode(12, &data_url("image/png", PNG_MAGIC))
            .unwrap();
        assert_eq!(frame.data(), PNG_MAGIC);
        assert_eq!(frame.format(), Some(ImageFormat::Png));
        assert_eq!(frame.index(), 12);
    }

    #[test]
    fn test_decodes_jpeg_data_url() {
        let frame = DataUrlDecoder::new()
            .decode(0, &data_url("image/jpeg", JPEG_MAGIC))
            .unwrap();
        assert_eq!(frame.format(), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_unknown_bytes_are_passed_through() {
        let frame = DataUrlDecoder::new()
            .decode(0, &data_url("image/png", b"not an image"))
            .unwrap();
        assert_eq!(frame.data(), b"not an image");
        assert_eq!(frame.format(), None);
    }

    #[test]
    fn test_extra_header_parameters_are_accepted() {
        let payload = format!(
            "data:image/png;name=frame.png;base64,{}",
            STANDARD.encode(PNG_MAGIC)
        );
        assert!(DataUrlDecoder::new().decode(0, &payload).is_ok());
    }

    #[test]
    fn test_format_mismatch_is_rejected() {
        let err = DataUrlDecoder::new()
            .decode(0, &data_url("image/png", JPEG_MAGIC))
            .unwrap_err();
        assert!(matches!(err, DecodeError::FormatMismatch { .. }));
    }

    #[rstest]
    #[case::no_comma("data:image/png;base64", DecodeError::MissingSeparator)]
    #[case::empty_body("data:image/png;base64,", DecodeError::Empty)]
    #[case::bad_length("data:image/png;base64,abcde", DecodeError::InvalidLength(5))]
    fn test_structural_errors(#[case] payload: &str, #[case] expected: DecodeError) {
        assert_eq!(DataUrlDecoder::new().decode(0, payload).unwrap_err(), expected);
    }

    #[rstest]
    #[case::missing_scheme("image/png;base64,AAAA")]
    #[case::bad_media_type("data:png;base64,AAAA")]
    fn test_malformed_header(#[case] payload: &str) {
        assert!(matches!(
            DataUrlDecoder::new().decode(0, payload),
            Err(DecodeError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_percent_encoded_payload_is_rejected() {
        assert!(matches!(
            DataUrlDecoder::new().decode(0, "data:image/png,AAAA"),
            Err(DecodeError::NotBase64(_))
        ));
    }

    #[test]
    fn test_invalid_base64_characters() {
        assert!(matches!(
            DataUrlDecoder::new().decode(0, "data:image/png;base64,ab!d"),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_long_headers_are_truncated_in_errors() {
        let header = format!("x{}", "y".repeat(200));
        let err = DataUrlDecoder::new()
            .decode(0, &format!("{header},AAAA"))
            .unwrap_err();
        match err {
            DecodeError::MalformedHeader(text) => assert!(text.len() < 80),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
