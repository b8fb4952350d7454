use crate::formats::FormatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Which physical camera a session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    #[default]
    Rear,
}

impl Facing {
    pub fn opposite(&self) -> Self {
        match self {
            Facing::Front => Facing::Rear,
            Facing::Rear => Facing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Rear => "rear",
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            other => Err(format!("Unknown facing direction: {}", other)),
        }
    }
}

/// A physical camera as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    /// Not every platform reports where a camera points.
    pub facing: Option<Facing>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            facing: None,
        }
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Luma8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// One video frame pulled from a live stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub device_id: String,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            sequence: 0,
            width,
            height,
            pixel_format,
            data,
            device_id: String::new(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// True when the buffer length matches the declared geometry.
    pub fn is_well_formed(&self) -> bool {
        let expected =
            self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel();
        self.width > 0 && self.height > 0 && self.data.len() == expected
    }

    /// Greyscale view of the frame for decoders. `None` if the buffer is malformed.
    pub fn to_luma(&self) -> Option<image::GrayImage> {
        if !self.is_well_formed() {
            return None;
        }
        match self.pixel_format {
            PixelFormat::Luma8 => {
                image::GrayImage::from_raw(self.width, self.height, self.data.clone())
            }
            PixelFormat::Rgb8 => {
                let rgb = image::RgbImage::from_raw(self.width, self.height, self.data.clone())?;
                Some(image::DynamicImage::ImageRgb8(rgb).to_luma8())
            }
        }
    }
}

/// Pixel region of a match, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Axis-aligned box enclosing a set of corner points, clamped to the frame origin.
    pub fn enclosing(points: &[(i32, i32)]) -> Option<Self> {
        let min_x = points.iter().map(|p| p.0).min()?.max(0);
        let min_y = points.iter().map(|p| p.1).min()?.max(0);
        let max_x = points.iter().map(|p| p.0).max()?.max(0);
        let max_y = points.iter().map(|p| p.1).max()?.max(0);
        Some(Self::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x) as u32,
            (max_y - min_y) as u32,
        ))
    }
}

/// One successful decode. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: Uuid,
    pub text: String,
    pub format: FormatId,
    pub format_name: String,
    pub timestamp: DateTime<Utc>,
    pub bounding_box: Option<BoundingBox>,
}

impl ScanResult {
    pub fn new(text: impl Into<String>, format: FormatId, bounding_box: Option<BoundingBox>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            format,
            format_name: format.display_name().to_string(),
            timestamp: Utc::now(),
            bounding_box,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Acquiring,
    Streaming,
    Scanning,
    Error,
}

impl ScanStatus {
    /// Statuses in which the camera stream must be held.
    pub fn holds_stream(&self) -> bool {
        matches!(self, ScanStatus::Streaming | ScanStatus::Scanning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Acquiring => "acquiring",
            ScanStatus::Streaming => "streaming",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Keep decoding after a match, subject to the suppression window
    #[default]
    Continuous,
    /// Stop after the first match
    SingleShot,
}

/// Snapshot-visible description of the held media stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: Uuid,
    pub device: DeviceDescriptor,
    pub facing: Facing,
    pub acquired_at: DateTime<Utc>,
}
