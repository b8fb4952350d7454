use crate::camera::{CameraBackend, MediaStream};
use crate::errors::CameraError;
use crate::permissions::{check_permission, PermissionStatus};
use crate::types::{DeviceDescriptor, Facing, Frame, PixelFormat};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

/// Host cameras through nokhwa.
#[derive(Debug, Default, Clone)]
pub struct NativeCamera;

impl NativeCamera {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for NativeCamera {
    fn is_supported(&self) -> bool {
        cfg!(any(target_os = "windows", target_os = "macos", target_os = "linux"))
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            CameraError::DeviceUnavailable(format!("Failed to query cameras: {}", e))
        })?;

        Ok(cameras
            .into_iter()
            .map(|info| {
                let label = info.human_name();
                let device = DeviceDescriptor::new(info.index().to_string(), label.clone());
                match facing_from_label(&label) {
                    Some(facing) => device.with_facing(facing),
                    None => device,
                }
            })
            .collect())
    }

    fn request_stream(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        let index = device.id.parse::<u32>().map_err(|_| {
            CameraError::DeviceUnavailable(format!("Invalid device ID: {}", device.id))
        })?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = CallbackCamera::new(CameraIndex::Index(index), requested, |_| {})
            .map_err(|e| classify_open_failure(&device.id, e.to_string()))?;

        camera
            .open_stream()
            .map_err(|e| classify_open_failure(&device.id, e.to_string()))?;

        log::debug!("Opened stream on {} ({})", device.id, device.label);
        Ok(Box::new(NativeStream {
            camera,
            device_id: device.id.clone(),
            sequence: 0,
            stopped: false,
        }))
    }
}

struct NativeStream {
    camera: CallbackCamera,
    device_id: String,
    sequence: u64,
    stopped: bool,
}

impl MediaStream for NativeStream {
    fn capture_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.stopped {
            return Err(CameraError::DeviceUnavailable("stream stopped".to_string()));
        }
        if !self.camera.is_stream_open() {
            return Err(CameraError::DeviceUnavailable(format!(
                "camera {} stream closed",
                self.device_id
            )));
        }

        let buffer = self.camera.poll_frame().map_err(|e| {
            CameraError::DeviceUnavailable(format!("Failed to capture frame: {}", e))
        })?;
        let resolution = buffer.resolution();

        // A frame that fails to convert is skipped, the stream is still live.
        let rgb = match buffer.decode_image::<RgbFormat>() {
            Ok(rgb) => rgb,
            Err(e) => {
                log::debug!("Dropping undecodable frame from {}: {}", self.device_id, e);
                return Ok(None);
            }
        };

        self.sequence += 1;
        Ok(Some(
            Frame::new(
                rgb.into_raw(),
                resolution.width_x,
                resolution.height_y,
                PixelFormat::Rgb8,
            )
            .with_sequence(self.sequence)
            .with_device(self.device_id.clone()),
        ))
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera {}: {}", self.device_id, e);
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Guess the facing direction from the device label.
fn facing_from_label(label: &str) -> Option<Facing> {
    let label = label.to_lowercase();
    if ["front", "facetime", "user"].iter().any(|k| label.contains(k)) {
        Some(Facing::Front)
    } else if ["back", "rear", "environment"].iter().any(|k| label.contains(k)) {
        Some(Facing::Rear)
    } else {
        None
    }
}

fn classify_open_failure(device_id: &str, message: String) -> CameraError {
    match check_permission() {
        PermissionStatus::Denied | PermissionStatus::Restricted => {
            CameraError::PermissionDenied(format!("camera {}: {}", device_id, message))
        }
        _ => CameraError::DeviceUnavailable(format!("camera {}: {}", device_id, message)),
    }
}
