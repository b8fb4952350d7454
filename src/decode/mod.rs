//! Decoder capability
//!
//! The engine never looks inside a decoder: it hands over a frame and the
//! active format set, and gets back a detection, nothing, or a fault.

#[cfg(feature = "qr")]
pub mod qr;

#[cfg(feature = "qr")]
pub use qr::QrDecoder;

use crate::errors::DecoderError;
use crate::formats::{FormatId, FormatSet};
use crate::types::{BoundingBox, Frame};

/// Raw payload of one successful decode, before it becomes a `ScanResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub text: String,
    pub format: FormatId,
    pub bounding_box: Option<BoundingBox>,
}

impl Detection {
    pub fn new(text: impl Into<String>, format: FormatId) -> Self {
        Self {
            text: text.into(),
            format,
            bounding_box: None,
        }
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

pub trait Decoder: Send + Sync + 'static {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Try to find a code of one of `formats` in the frame.
    ///
    /// `Ok(None)` is an ordinary miss. `Err` is reserved for failures that
    /// make further decoding pointless.
    fn attempt_decode(
        &self,
        frame: &Frame,
        formats: &FormatSet,
    ) -> Result<Option<Detection>, DecoderError>;
}
