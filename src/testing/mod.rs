//! Testing utilities for CrabScan
//!
//! Provides an in-memory camera backend, a scripted decoder and synthetic
//! frames so the scanner can be exercised without hardware.

pub mod mock_camera;
pub mod scripted_decoder;
pub mod synthetic_data;

pub use mock_camera::MockCamera;
pub use scripted_decoder::ScriptedDecoder;
pub use synthetic_data::synthetic_video_frame;
