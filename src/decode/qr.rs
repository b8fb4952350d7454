//! QR decoding backed by rqrr.

use crate::decode::{Decoder, Detection};
use crate::errors::DecoderError;
use crate::formats::{FormatId, FormatSet};
use crate::types::{BoundingBox, Frame};

/// Decodes QR codes only; any other requested format is reported as a miss.
#[derive(Debug, Default, Clone)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for QrDecoder {
    fn name(&self) -> &str {
        "rqrr"
    }

    fn attempt_decode(
        &self,
        frame: &Frame,
        formats: &FormatSet,
    ) -> Result<Option<Detection>, DecoderError> {
        if !formats.contains(FormatId::QrCode) {
            return Ok(None);
        }

        let luma = frame.to_luma().ok_or_else(|| {
            DecoderError::new(format!(
                "frame {} has {} bytes, expected {}x{} {:?}",
                frame.sequence,
                frame.data.len(),
                frame.width,
                frame.height,
                frame.pixel_format
            ))
        })?;

        let (width, height) = (luma.width() as usize, luma.height() as usize);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let corners: Vec<(i32, i32)> =
                        grid.bounds.iter().map(|p| (p.x, p.y)).collect();
                    let mut detection = Detection::new(content, FormatId::QrCode);
                    if let Some(bbox) = BoundingBox::enclosing(&corners) {
                        detection = detection.with_bounding_box(bbox);
                    }
                    return Ok(Some(detection));
                }
                // A grid that fails to decode is a partial sighting, not a fault.
                Err(e) => log::debug!("QR grid decode failed: {:?}", e),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_video_frame;
    use crate::types::PixelFormat;

    #[test]
    fn test_blank_frame_is_a_miss() {
        let frame = Frame::new(vec![255u8; 64 * 64], 64, 64, PixelFormat::Luma8);
        let result = QrDecoder::new().attempt_decode(&frame, &FormatSet::all());
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_qr_disabled_skips_decode() {
        let frame = Frame::new(vec![0u8; 3], 64, 64, PixelFormat::Luma8);
        let formats = FormatSet::single(FormatId::Ean13);
        assert_eq!(QrDecoder::new().attempt_decode(&frame, &formats), Ok(None));
    }

    #[test]
    fn test_malformed_frame_is_a_fault() {
        let frame = Frame::new(vec![0u8; 3], 64, 64, PixelFormat::Luma8);
        assert!(QrDecoder::new()
            .attempt_decode(&frame, &FormatSet::all())
            .is_err());
    }

    #[test]
    fn test_gradient_frame_is_a_miss() {
        let frame = synthetic_video_frame(3, 64, 48);
        let result = QrDecoder::new().attempt_decode(&frame, &FormatSet::all());
        assert!(matches!(result, Ok(None)));
    }
}
