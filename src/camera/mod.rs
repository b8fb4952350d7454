//! Camera acquisition
//!
//! `CameraBackend` and `MediaStream` are the seam to the host's camera API.
//! `CameraSession` is the only owner of an acquired stream; everything else
//! sees it through a non-owning `StreamRef`.

pub mod session;

#[cfg(feature = "native")]
pub mod native;

pub use session::{CameraSession, StreamRef};

#[cfg(feature = "native")]
pub use native::NativeCamera;

use crate::errors::CameraError;
use crate::types::{DeviceDescriptor, Frame};

/// Platform camera API consumed by `CameraSession`.
///
/// Calls may block; the session runs them on the blocking pool under a timeout.
pub trait CameraBackend: Send + Sync + 'static {
    /// Whether the host has any camera capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Enumerate physical cameras, in a stable order.
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CameraError>;

    /// Open a live stream on the given device. Turns the camera indicator on.
    fn request_stream(&self, device: &DeviceDescriptor)
        -> Result<Box<dyn MediaStream>, CameraError>;
}

/// A live camera stream.
pub trait MediaStream: Send {
    /// Pull the most recent frame. `Ok(None)` means no frame is ready yet;
    /// an error means the stream has ended.
    fn capture_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Stop all tracks. Must be idempotent.
    fn stop(&mut self);
}
