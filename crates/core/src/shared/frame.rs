use image::ImageFormat;

/// One decoded frame on its way to the encoder.
///
/// The bytes are an encoded still image (PNG, JPEG, ...) exactly as the
/// producer rendered it; the recorder never inspects pixels.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    format: Option<ImageFormat>,
    index: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, format: Option<ImageFormat>, index: u64) -> Self {
        Self {
            data,
            format,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Image container detected from the payload's magic bytes, if known.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Producer-assigned sequence index. Only used for diagnostics.
    pub fn index(&self) -> u64 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let frame = Frame::new(vec![1, 2, 3], Some(ImageFormat::Png), 7);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert_eq!(frame.format(), Some(ImageFormat::Png));
        assert_eq!(frame.index(), 7);
    }

    #[test]
    fn test_into_data_hands_over_buffer() {
        let frame = Frame::new(vec![9; 4], None, 0);
        let data = frame.into_data();
        assert_eq!(data, vec![9; 4]);
    }
}
