//! Decoder whose output is driven by the test instead of the pixels.

use crate::decode::{Decoder, Detection};
use crate::errors::DecoderError;
use crate::formats::{FormatId, FormatSet};
use crate::types::{BoundingBox, Frame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct ScriptState {
    in_view: Option<Detection>,
    fail_next: Option<String>,
    attempts: u64,
}

/// Reports whatever code the test has put "in view" on every frame.
#[derive(Clone, Default)]
pub struct ScriptedDecoder {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a code in front of the camera.
    pub fn show(&self, text: &str, format: FormatId) {
        self.lock().in_view = Some(Detection::new(text, format));
    }

    pub fn show_with_box(&self, text: &str, format: FormatId, bounding_box: BoundingBox) {
        self.lock().in_view = Some(Detection::new(text, format).with_bounding_box(bounding_box));
    }

    pub fn hide(&self) {
        self.lock().in_view = None;
    }

    /// Fail the next decode attempt with a decoder fault.
    pub fn fail_next(&self, message: &str) {
        self.lock().fail_next = Some(message.to_string());
    }

    pub fn attempts(&self) -> u64 {
        self.lock().attempts
    }
}

impl Decoder for ScriptedDecoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn attempt_decode(
        &self,
        _frame: &Frame,
        formats: &FormatSet,
    ) -> Result<Option<Detection>, DecoderError> {
        let mut state = self.lock();
        state.attempts += 1;

        if let Some(message) = state.fail_next.take() {
            return Err(DecoderError::new(message));
        }

        Ok(state
            .in_view
            .as_ref()
            .filter(|d| formats.contains(d.format))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_video_frame;

    #[test]
    fn test_respects_active_formats() {
        let decoder = ScriptedDecoder::new();
        let frame = synthetic_video_frame(0, 8, 8);
        decoder.show("SKU-1234", FormatId::Ean13);

        let qr_only = FormatSet::single(FormatId::QrCode);
        assert_eq!(decoder.attempt_decode(&frame, &qr_only).unwrap(), None);

        let all = FormatSet::all();
        let detection = decoder.attempt_decode(&frame, &all).unwrap().unwrap();
        assert_eq!(detection.text, "SKU-1234");
        assert_eq!(decoder.attempts(), 2);
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let decoder = ScriptedDecoder::new();
        let frame = synthetic_video_frame(0, 8, 8);
        decoder.fail_next("corrupt buffer");
        assert!(decoder.attempt_decode(&frame, &FormatSet::all()).is_err());
        assert!(decoder.attempt_decode(&frame, &FormatSet::all()).is_ok());
    }
}
