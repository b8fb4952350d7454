use crate::camera::{CameraBackend, MediaStream};
use crate::errors::CameraError;
use crate::types::{DeviceDescriptor, Facing, Frame, StreamInfo};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

type SharedStream = Arc<Mutex<Box<dyn MediaStream>>>;

/// Borrowed view of the held stream. Stops working once the session releases it.
#[derive(Clone)]
pub struct StreamRef {
    stream: Weak<Mutex<Box<dyn MediaStream>>>,
    id: Uuid,
}

impl StreamRef {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.stream.strong_count() == 0
    }

    /// Capture through the session-owned stream.
    pub fn capture_frame(&self) -> Result<Option<Frame>, CameraError> {
        let stream = self.stream.upgrade().ok_or_else(|| {
            CameraError::DeviceUnavailable("stream has been released".to_string())
        })?;
        let mut guard = stream.lock().unwrap_or_else(PoisonError::into_inner);
        guard.capture_frame()
    }
}

struct HeldStream {
    stream: SharedStream,
    info: StreamInfo,
}

/// Owns the camera hardware handle for one scanner.
///
/// At most one stream is held at a time; every acquisition releases the
/// previous stream first.
pub struct CameraSession {
    backend: Arc<dyn CameraBackend>,
    acquire_timeout: Duration,
    held: Option<HeldStream>,
    devices: Vec<DeviceDescriptor>,
    current: Option<usize>,
    /// Device and facing of the most recent acquisition, kept after release
    last: Option<(String, Facing)>,
}

impl CameraSession {
    pub fn new(backend: Arc<dyn CameraBackend>, acquire_timeout: Duration) -> Self {
        Self {
            backend,
            acquire_timeout,
            held: None,
            devices: Vec::new(),
            current: None,
            last: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.held.as_ref().map(|h| &h.info)
    }

    pub fn stream(&self) -> Option<StreamRef> {
        self.held.as_ref().map(|h| StreamRef {
            stream: Arc::downgrade(&h.stream),
            id: h.info.id,
        })
    }

    /// Enumerate available cameras and cache the list for switching.
    pub async fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let deadline = Instant::now() + self.acquire_timeout;
        self.enumerate(deadline).await
    }

    async fn enumerate(&mut self, deadline: Instant) -> Result<Vec<DeviceDescriptor>, CameraError> {
        if !self.backend.is_supported() {
            return Err(CameraError::NotSupported(
                "no camera capability on this host".to_string(),
            ));
        }

        let backend = self.backend.clone();
        let devices = run_bounded(
            deadline,
            "device enumeration",
            move || backend.enumerate_devices(),
            |_| {},
        )
        .await?;

        log::debug!("Enumerated {} camera device(s)", devices.len());
        self.devices = devices.clone();
        Ok(devices)
    }

    /// Acquire a camera for the requested facing direction.
    ///
    /// Any held stream is released first. On failure nothing is held.
    /// Enumeration and opening share one acquisition deadline.
    pub async fn acquire(&mut self, facing: Facing) -> Result<StreamInfo, CameraError> {
        self.release();
        let deadline = Instant::now() + self.acquire_timeout;

        let devices = self.enumerate(deadline).await?;
        let index = select_device(&devices, facing).ok_or_else(|| {
            CameraError::DeviceUnavailable("no camera devices found".to_string())
        })?;

        self.open(index, facing, deadline).await
    }

    /// Move to the next device in the cyclic device list, relative to the
    /// most recently acquired one.
    ///
    /// With a single device this re-acquires the same camera.
    pub async fn switch_camera(&mut self) -> Result<StreamInfo, CameraError> {
        let previous = self.last.clone();
        self.release();
        let deadline = Instant::now() + self.acquire_timeout;

        let devices = self.enumerate(deadline).await?;
        if devices.is_empty() {
            return Err(CameraError::DeviceUnavailable(
                "no camera devices found".to_string(),
            ));
        }

        let previous_index = previous
            .as_ref()
            .and_then(|(id, _)| devices.iter().position(|d| &d.id == id))
            .or(self.current.filter(|i| *i < devices.len()));
        let next = previous_index.map(|i| (i + 1) % devices.len()).unwrap_or(0);

        let previous_facing = previous.map(|(_, f)| f).unwrap_or_default();
        let facing = if previous_index == Some(next) {
            previous_facing
        } else {
            devices[next].facing.unwrap_or(previous_facing.opposite())
        };

        log::info!(
            "Switching camera to device {} ({} of {})",
            devices[next].id,
            next + 1,
            devices.len()
        );
        self.open(next, facing, deadline).await
    }

    /// Stop all tracks of the held stream. Safe to call when nothing is held.
    pub fn release(&mut self) {
        if let Some(held) = self.held.take() {
            let mut stream = held.stream.lock().unwrap_or_else(PoisonError::into_inner);
            stream.stop();
            log::info!(
                "Released camera {} (stream {})",
                held.info.device.id,
                held.info.id
            );
        }
    }

    async fn open(
        &mut self,
        index: usize,
        requested: Facing,
        deadline: Instant,
    ) -> Result<StreamInfo, CameraError> {
        let device = self.devices[index].clone();
        log::info!("Acquiring camera {} ({})", device.id, device.label);

        let backend = self.backend.clone();
        let target = device.clone();
        let stream = run_bounded(
            deadline,
            "camera acquisition",
            move || backend.request_stream(&target),
            |mut late: Box<dyn MediaStream>| {
                log::warn!("Camera opened after acquisition timed out, stopping it");
                late.stop();
            },
        )
        .await
        .map_err(|e| {
            log::warn!("Failed to acquire camera {}: {}", device.id, e);
            e
        })?;

        let info = StreamInfo {
            id: Uuid::new_v4(),
            facing: device.facing.unwrap_or(requested),
            device,
            acquired_at: Utc::now(),
        };
        self.held = Some(HeldStream {
            stream: Arc::new(Mutex::new(stream)),
            info: info.clone(),
        });
        self.current = Some(index);
        self.last = Some((info.device.id.clone(), info.facing));
        Ok(info)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Prefer a device reporting the requested facing, then one with unknown
/// facing, then whatever comes first.
fn select_device(devices: &[DeviceDescriptor], facing: Facing) -> Option<usize> {
    devices
        .iter()
        .position(|d| d.facing == Some(facing))
        .or_else(|| devices.iter().position(|d| d.facing.is_none()))
        .or(if devices.is_empty() { None } else { Some(0) })
}

/// Run a blocking backend call against a deadline. Work that finishes after
/// the deadline is handed to `on_late` so nothing acquired in the meantime leaks.
async fn run_bounded<T, F, L>(
    deadline: Instant,
    what: &'static str,
    work: F,
    on_late: L,
) -> Result<T, CameraError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CameraError> + Send + 'static,
    L: FnOnce(T) + Send + 'static,
{
    let started = Instant::now();
    let mut task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(CameraError::DeviceUnavailable(format!(
            "{} task failed: {}",
            what, e
        ))),
        Err(_) => {
            let waited = started.elapsed();
            log::warn!("{} timed out after {:?}", what, waited);
            tokio::spawn(async move {
                if let Ok(Ok(late)) = task.await {
                    on_late(late);
                }
            });
            Err(CameraError::DeviceUnavailable(format!(
                "{} timed out after {}ms",
                what,
                waited.as_millis()
            )))
        }
    }
}
