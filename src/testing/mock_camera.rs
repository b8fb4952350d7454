//! In-memory camera backend with failure injection and live-stream accounting.

use crate::camera::{CameraBackend, MediaStream};
use crate::errors::CameraError;
use crate::testing::synthetic_data::synthetic_video_frame;
use crate::types::{DeviceDescriptor, Facing, Frame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

struct MockState {
    devices: Vec<DeviceDescriptor>,
    supported: bool,
    failure: Option<CameraError>,
    acquire_delay: Duration,
    enumerate_delay: Duration,
    end_after_frames: Option<u64>,
    live: usize,
    max_live: usize,
    acquisitions: usize,
    frames_captured: u64,
    acquired_devices: Vec<String>,
}

/// Cloneable handle; clones share the same simulated hardware.
#[derive(Clone)]
pub struct MockCamera {
    state: Arc<Mutex<MockState>>,
}

impl MockCamera {
    /// A rear camera followed by a front camera.
    pub fn new() -> Self {
        Self::with_devices(vec![
            DeviceDescriptor::new("0", "Mock Back Camera").with_facing(Facing::Rear),
            DeviceDescriptor::new("1", "Mock Front Camera").with_facing(Facing::Front),
        ])
    }

    pub fn single_device() -> Self {
        Self::with_devices(vec![
            DeviceDescriptor::new("0", "Mock Back Camera").with_facing(Facing::Rear)
        ])
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                supported: true,
                failure: None,
                acquire_delay: Duration::ZERO,
                enumerate_delay: Duration::ZERO,
                end_after_frames: None,
                live: 0,
                max_live: 0,
                acquisitions: 0,
                frames_captured: 0,
                acquired_devices: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following acquisition fail with `failure` (or succeed with `None`).
    pub fn set_failure(&self, failure: Option<CameraError>) {
        self.lock().failure = failure;
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().supported = supported;
    }

    pub fn set_acquire_delay(&self, delay: Duration) {
        self.lock().acquire_delay = delay;
    }

    pub fn set_enumerate_delay(&self, delay: Duration) {
        self.lock().enumerate_delay = delay;
    }

    /// Streams opened from now on end after delivering `frames` frames in total.
    pub fn end_stream_after(&self, frames: Option<u64>) {
        self.lock().end_after_frames = frames;
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.lock().devices = devices;
    }

    /// Streams currently open (camera indicator on).
    pub fn live_streams(&self) -> usize {
        self.lock().live
    }

    /// Highest number of simultaneously open streams ever observed.
    pub fn max_live_streams(&self) -> usize {
        self.lock().max_live
    }

    pub fn acquisitions(&self) -> usize {
        self.lock().acquisitions
    }

    pub fn frames_captured(&self) -> u64 {
        self.lock().frames_captured
    }

    pub fn acquired_devices(&self) -> Vec<String> {
        self.lock().acquired_devices.clone()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockCamera {
    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let delay = self.lock().enumerate_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(self.lock().devices.clone())
    }

    fn request_stream(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        let delay = self.lock().acquire_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.lock();
        if let Some(failure) = state.failure.clone() {
            return Err(failure);
        }
        if !state.devices.iter().any(|d| d.id == device.id) {
            return Err(CameraError::DeviceUnavailable(format!(
                "device {} disconnected",
                device.id
            )));
        }

        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.acquisitions += 1;
        state.acquired_devices.push(device.id.clone());

        Ok(Box::new(MockStream {
            state: self.state.clone(),
            device_id: device.id.clone(),
            end_after: state.end_after_frames,
            delivered: 0,
            stopped: false,
        }))
    }
}

struct MockStream {
    state: Arc<Mutex<MockState>>,
    device_id: String,
    end_after: Option<u64>,
    delivered: u64,
    stopped: bool,
}

impl MediaStream for MockStream {
    fn capture_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.stopped {
            return Err(CameraError::DeviceUnavailable("stream stopped".to_string()));
        }
        if self.end_after.is_some_and(|limit| self.delivered >= limit) {
            return Err(CameraError::DeviceUnavailable(format!(
                "device {} disconnected",
                self.device_id
            )));
        }

        self.delivered += 1;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames_captured += 1;

        Ok(Some(
            synthetic_video_frame(self.delivered, FRAME_WIDTH, FRAME_HEIGHT)
                .with_device(self.device_id.clone()),
        ))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.live = state.live.saturating_sub(1);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_accounting() {
        let mock = MockCamera::new();
        let device = mock.enumerate_devices().unwrap()[0].clone();

        let mut stream = mock.request_stream(&device).unwrap();
        assert_eq!(mock.live_streams(), 1);
        assert!(stream.capture_frame().unwrap().is_some());
        assert_eq!(mock.frames_captured(), 1);

        stream.stop();
        stream.stop();
        assert_eq!(mock.live_streams(), 0);
        assert!(stream.capture_frame().is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mock = MockCamera::new();
        mock.set_failure(Some(CameraError::PermissionDenied("denied".into())));
        let device = mock.enumerate_devices().unwrap()[0].clone();
        assert!(matches!(
            mock.request_stream(&device),
            Err(CameraError::PermissionDenied(_))
        ));
        assert_eq!(mock.live_streams(), 0);
    }

    #[test]
    fn test_stream_ends_after_limit() {
        let mock = MockCamera::new();
        mock.end_stream_after(Some(2));
        let device = mock.enumerate_devices().unwrap()[0].clone();
        let mut stream = mock.request_stream(&device).unwrap();
        assert!(stream.capture_frame().is_ok());
        assert!(stream.capture_frame().is_ok());
        assert!(stream.capture_frame().is_err());
    }

    #[test]
    fn test_dropped_stream_is_stopped() {
        let mock = MockCamera::new();
        let device = mock.enumerate_devices().unwrap()[0].clone();
        drop(mock.request_stream(&device).unwrap());
        assert_eq!(mock.live_streams(), 0);
    }
}
