//! Blur masks and their time windows.
//!
//! A mask is a rectangle, a `[start, end]` window in seconds, and a blur
//! intensity. The same logical mask exists in two coordinate spaces over
//! its lifecycle, and each space has its own type:
//!
//! - [`DisplayMask`]: drawn by the editor, relative to the display container.
//! - [`VideoMask`]: produced by the coordinate mapper, native frame pixels.
//!
//! Both share the camelCase wire shape
//! `{id, x, y, width, height, startTime, endTime, intensity}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{DisplayRect, PixelRect};
use crate::record::ProcessingStatus;

/// Weakest accepted blur intensity.
pub const MIN_INTENSITY: u32 = 1;
/// Strongest accepted blur intensity.
pub const MAX_INTENSITY: u32 = 50;
/// Intensity given to freshly drawn masks.
pub const DEFAULT_INTENSITY: u32 = 20;

/// Errors raised when mask or record invariants are violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid mask rectangle: {message}")]
    InvalidRect { message: String },

    #[error("Invalid time window [{start}, {end}]")]
    InvalidTimeWindow { start: f64, end: f64 },

    #[error("Cannot move video from {from} to {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
}

/// Unique mask identifier (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskId(String);

impl MaskId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blur strength. Always within `[MIN_INTENSITY, MAX_INTENSITY]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Intensity(u32);

impl Intensity {
    /// Clamp `value` into the accepted range.
    pub fn new(value: u32) -> Self {
        Self(value.clamp(MIN_INTENSITY, MAX_INTENSITY))
    }

    /// Round and clamp a slider value. Non-finite input yields the default.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        let rounded = value.round().clamp(MIN_INTENSITY as f64, MAX_INTENSITY as f64);
        Self(rounded as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(DEFAULT_INTENSITY)
    }
}

impl From<u32> for Intensity {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Intensity> for u32 {
    fn from(value: Intensity) -> Self {
        value.0
    }
}

/// Inclusive time window in seconds with `0 <= start <= end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    start_secs: f64,
    end_secs: f64,
}

impl TimeWindow {
    /// Build a window, rejecting non-finite, negative, or inverted bounds.
    pub fn new(start_secs: f64, end_secs: f64) -> Result<Self, ModelError> {
        if !start_secs.is_finite()
            || !end_secs.is_finite()
            || start_secs < 0.0
            || end_secs < start_secs
        {
            return Err(ModelError::InvalidTimeWindow {
                start: start_secs,
                end: end_secs,
            });
        }
        Ok(Self {
            start_secs,
            end_secs,
        })
    }

    /// Clamp both bounds into `[0, duration]` and repair inversion by
    /// raising `end` to `start`.
    ///
    /// A non-finite or non-positive `duration_secs` means the duration is
    /// not known yet and leaves the upper bound open.
    pub fn clamped(start_secs: f64, end_secs: f64, duration_secs: f64) -> Self {
        let upper = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            f64::MAX
        };
        let start = finite_or_zero(start_secs).clamp(0.0, upper);
        let end = finite_or_zero(end_secs).clamp(0.0, upper).max(start);
        Self {
            start_secs: start,
            end_secs: end,
        }
    }

    /// `[playhead, min(playhead + len, duration)]`, clamped.
    pub fn starting_at(playhead_secs: f64, len_secs: f64, duration_secs: f64) -> Self {
        let start = finite_or_zero(playhead_secs);
        Self::clamped(start, start + len_secs.max(0.0), duration_secs)
    }

    pub fn start(&self) -> f64 {
        self.start_secs
    }

    pub fn end(&self) -> f64 {
        self.end_secs
    }

    pub fn len_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Inclusive on both ends.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t <= self.end_secs
    }

    /// Same window with `end` capped at `duration_secs`.
    pub fn capped_to(&self, duration_secs: f64) -> Self {
        Self::clamped(self.start_secs, self.end_secs, duration_secs)
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// A mask in display (container) space, owned by an edit session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMask", into = "WireMask")]
pub struct DisplayMask {
    pub id: MaskId,
    pub rect: DisplayRect,
    pub window: TimeWindow,
    pub intensity: Intensity,
}

impl DisplayMask {
    pub fn new(rect: DisplayRect, window: TimeWindow, intensity: Intensity) -> Self {
        Self {
            id: MaskId::generate(),
            rect,
            window,
            intensity,
        }
    }

    /// Whether the mask should be drawn at playback time `t`.
    pub fn is_visible_at(&self, t: f64) -> bool {
        self.window.contains(t)
    }
}

/// A mask in native video pixel space, ready for the filter graph.
///
/// Width and height are always at least one pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMask", into = "VideoMaskJson")]
pub struct VideoMask {
    id: MaskId,
    rect: PixelRect,
    window: TimeWindow,
    intensity: Intensity,
}

impl VideoMask {
    pub fn new(
        id: MaskId,
        rect: PixelRect,
        window: TimeWindow,
        intensity: Intensity,
    ) -> Result<Self, ModelError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(ModelError::InvalidRect {
                message: format!(
                    "video-space mask {id} has empty size {}x{}",
                    rect.width, rect.height
                ),
            });
        }
        Ok(Self {
            id,
            rect,
            window,
            intensity,
        })
    }

    pub fn id(&self) -> &MaskId {
        &self.id
    }

    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    /// Same mask with its window capped at `duration_secs`.
    pub fn with_window_capped(mut self, duration_secs: f64) -> Self {
        self.window = self.window.capped_to(duration_secs);
        self
    }
}

/// Shared camelCase JSON shape for masks on the wire and on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default = "default_wire_intensity")]
    pub intensity: f64,
}

fn default_wire_intensity() -> f64 {
    DEFAULT_INTENSITY as f64
}

/// Integer serialization of a [`VideoMask`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoMaskJson {
    id: String,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    start_time: f64,
    end_time: f64,
    intensity: u32,
}

impl TryFrom<WireMask> for DisplayMask {
    type Error = ModelError;

    fn try_from(wire: WireMask) -> Result<Self, Self::Error> {
        let rect = DisplayRect::new(wire.x, wire.y, wire.width, wire.height);
        if !rect.is_finite() || rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(ModelError::InvalidRect {
                message: format!(
                    "display mask needs finite positive size, got {}x{}",
                    wire.width, wire.height
                ),
            });
        }
        Ok(Self {
            id: wire.id.map(MaskId::new).unwrap_or_else(MaskId::generate),
            rect,
            window: TimeWindow::new(wire.start_time, wire.end_time)?,
            intensity: Intensity::from_f64(wire.intensity),
        })
    }
}

impl From<DisplayMask> for WireMask {
    fn from(mask: DisplayMask) -> Self {
        Self {
            id: Some(mask.id.0),
            x: mask.rect.x,
            y: mask.rect.y,
            width: mask.rect.width,
            height: mask.rect.height,
            start_time: mask.window.start(),
            end_time: mask.window.end(),
            intensity: mask.intensity.get() as f64,
        }
    }
}

impl TryFrom<WireMask> for VideoMask {
    type Error = ModelError;

    fn try_from(wire: WireMask) -> Result<Self, Self::Error> {
        let component = |name: &str, value: f64| -> Result<u32, ModelError> {
            if !value.is_finite() || value < 0.0 || value.round() > u32::MAX as f64 {
                return Err(ModelError::InvalidRect {
                    message: format!("{name} must be a non-negative pixel value, got {value}"),
                });
            }
            Ok(value.round() as u32)
        };

        let rect = PixelRect::new(
            component("x", wire.x)?,
            component("y", wire.y)?,
            component("width", wire.width)?,
            component("height", wire.height)?,
        );
        let id = wire.id.map(MaskId::new).unwrap_or_else(MaskId::generate);
        let window = TimeWindow::new(wire.start_time, wire.end_time)?;
        VideoMask::new(id, rect, window, Intensity::from_f64(wire.intensity))
    }
}

impl From<VideoMask> for VideoMaskJson {
    fn from(mask: VideoMask) -> Self {
        Self {
            id: mask.id.0,
            x: mask.rect.x,
            y: mask.rect.y,
            width: mask.rect.width,
            height: mask.rect.height,
            start_time: mask.window.start(),
            end_time: mask.window.end(),
            intensity: mask.intensity.get(),
        }
    }
}
