//! Display-space to video-space coordinate mapping.
//!
//! The preview element shows the video aspect-fit inside its container, so
//! a mismatch between the container and video aspect ratios leaves blank
//! bars. Masks are drawn relative to the container, bars included, and the
//! bar offset must be removed before scaling into native pixels.

use vidblur_mask_model::{
    ContainerSize, DisplayMask, DisplayRect, FrameSize, MaskId, PixelRect, VideoMask,
};

/// Aspect ratios closer than this (relative) are treated as equal.
const RATIO_TOLERANCE: f64 = 1e-9;

/// Errors raised while mapping masks into video space.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("Display container has unusable size {width}x{height}")]
    DegenerateContainer { width: f64, height: f64 },

    #[error("Video dimensions unknown ({width}x{height})")]
    MissingVideoMetadata { width: u32, height: u32 },

    #[error("Computed display scale {scale} is not usable")]
    DegenerateScale { scale: f64 },

    #[error("Mask {id} has a non-finite coordinate")]
    NonFiniteCoordinate { id: MaskId },
}

/// Where the video is actually drawn inside its container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub rendered_width: f64,
    pub rendered_height: f64,
    /// Horizontal bar width (pillarbox).
    pub offset_x: f64,
    /// Vertical bar height (letterbox).
    pub offset_y: f64,
    /// Display pixels per video pixel.
    pub scale: f64,
    video: FrameSize,
}

impl Letterbox {
    /// Compute the aspect-fit box of `video` inside `container`.
    pub fn compute(container: ContainerSize, video: FrameSize) -> Result<Self, TransformError> {
        if !container.is_usable() {
            return Err(TransformError::DegenerateContainer {
                width: container.width,
                height: container.height,
            });
        }
        let video_ratio = video
            .aspect_ratio()
            .ok_or(TransformError::MissingVideoMetadata {
                width: video.width,
                height: video.height,
            })?;
        let container_ratio = container.width / container.height;

        let (rendered_width, rendered_height, offset_x, offset_y) =
            if ratios_match(video_ratio, container_ratio) {
                (container.width, container.height, 0.0, 0.0)
            } else if video_ratio > container_ratio {
                // Wider than the container: bars above and below.
                let rendered_height = container.width / video_ratio;
                (
                    container.width,
                    rendered_height,
                    0.0,
                    (container.height - rendered_height) / 2.0,
                )
            } else {
                // Narrower: bars left and right.
                let rendered_width = container.height * video_ratio;
                (
                    rendered_width,
                    container.height,
                    (container.width - rendered_width) / 2.0,
                    0.0,
                )
            };

        let scale = rendered_width / video.width as f64;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TransformError::DegenerateScale { scale });
        }

        Ok(Self {
            rendered_width,
            rendered_height,
            offset_x,
            offset_y,
            scale,
            video,
        })
    }

    /// Map one display rectangle into the video frame.
    ///
    /// Position is clamped into `[0, W-1] x [0, H-1]` and size into
    /// `[1, W-x] x [1, H-y]`, so the result always lies inside the frame.
    /// The rectangle must be finite.
    pub fn to_video_rect(&self, rect: &DisplayRect) -> PixelRect {
        let max_x = (self.video.width - 1) as f64;
        let max_y = (self.video.height - 1) as f64;

        let x = ((rect.x - self.offset_x) / self.scale).round().clamp(0.0, max_x);
        let y = ((rect.y - self.offset_y) / self.scale).round().clamp(0.0, max_y);
        let w = (rect.width / self.scale)
            .round()
            .clamp(1.0, self.video.width as f64 - x);
        let h = (rect.height / self.scale)
            .round()
            .clamp(1.0, self.video.height as f64 - y);

        PixelRect::new(x as u32, y as u32, w as u32, h as u32)
    }
}

fn ratios_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATIO_TOLERANCE * a.abs().max(b.abs())
}

/// Map display-space masks into native video pixels.
///
/// Ids, time windows and intensities pass through unchanged. The whole
/// batch fails on the first non-finite mask.
pub fn map_to_video(
    masks: &[DisplayMask],
    container: ContainerSize,
    video: FrameSize,
) -> Result<Vec<VideoMask>, TransformError> {
    let letterbox = Letterbox::compute(container, video)?;
    tracing::debug!(
        masks = masks.len(),
        scale = letterbox.scale,
        offset_x = letterbox.offset_x,
        offset_y = letterbox.offset_y,
        "Mapping masks to video space"
    );

    masks
        .iter()
        .map(|mask| {
            if !mask.rect.is_finite() {
                return Err(TransformError::NonFiniteCoordinate {
                    id: mask.id.clone(),
                });
            }
            let rect = letterbox.to_video_rect(&mask.rect);
            VideoMask::new(mask.id.clone(), rect, mask.window, mask.intensity).map_err(|_| {
                TransformError::NonFiniteCoordinate {
                    id: mask.id.clone(),
                }
            })
        })
        .collect()
}
