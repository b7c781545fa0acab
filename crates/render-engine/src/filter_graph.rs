//! ffmpeg `filter_complex` construction for blur masks.
//!
//! Each mask adds three filters chained off the previous stage's output:
//! the stream is split, one branch is cropped to the mask rectangle and
//! box-blurred, and the blurred patch is overlaid back at the same
//! position only while `t` is inside the mask's window.

use std::fmt;

use vidblur_mask_model::{PixelRect, VideoMask};

/// Label of the decoder's first video stream.
pub const INPUT_LABEL: &str = "0:v";
/// Label of the final composited stream.
pub const OUTPUT_LABEL: &str = "vout";
/// Smallest crop side that still admits a boxblur radius of 1 on the
/// half-size chroma planes.
pub const MIN_BLUR_SIDE: u32 = 4;

/// Errors raised while building a filter graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterGraphError {
    #[error("No masks to render; use stream copy instead of an empty filter graph")]
    EmptyMaskList,
}

/// Blur parameters shared by all masks in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurSettings {
    /// Number of boxblur passes.
    pub power: u32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self { power: 2 }
    }
}

/// One `[in...]filter,filter[out...]` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    pub inputs: Vec<String>,
    pub filters: Vec<String>,
    pub outputs: Vec<String>,
}

impl FilterStage {
    fn new(inputs: &[&str], filters: Vec<String>, outputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            filters,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{label}]")?;
        }
        f.write_str(&self.filters.join(","))?;
        for label in &self.outputs {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

/// Ordered filter stages ending in [`OUTPUT_LABEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    stages: Vec<FilterStage>,
    output_label: String,
    mask_count: usize,
}

impl FilterGraph {
    /// Build a graph with default blur settings.
    pub fn build(masks: &[VideoMask]) -> Result<Self, FilterGraphError> {
        Self::build_with(masks, BlurSettings::default())
    }

    /// Build a graph, one split/crop/blur/overlay chain per mask in list order.
    pub fn build_with(masks: &[VideoMask], blur: BlurSettings) -> Result<Self, FilterGraphError> {
        if masks.is_empty() {
            return Err(FilterGraphError::EmptyMaskList);
        }

        let mut stages = Vec::with_capacity(masks.len() * 3);
        let mut input = INPUT_LABEL.to_string();

        for (i, mask) in masks.iter().enumerate() {
            let rect = blur_patch(mask.rect());
            let window = mask.window();
            let base = format!("base{i}");
            let src = format!("src{i}");
            let blurred = format!("blur{i}");
            let output = if i + 1 == masks.len() {
                OUTPUT_LABEL.to_string()
            } else {
                format!("v{}", i + 1)
            };

            let radius = blur_radius(mask.intensity().get(), rect.width, rect.height);

            stages.push(FilterStage::new(
                &[input.as_str()],
                vec!["split=2".to_string()],
                &[base.as_str(), src.as_str()],
            ));
            stages.push(FilterStage::new(
                &[src.as_str()],
                vec![
                    format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y),
                    format!("boxblur=luma_radius={radius}:luma_power={}", blur.power),
                ],
                &[blurred.as_str()],
            ));
            stages.push(FilterStage::new(
                &[base.as_str(), blurred.as_str()],
                vec![format!(
                    "overlay={}:{}:enable='between(t,{},{})'",
                    rect.x,
                    rect.y,
                    format_time(window.start()),
                    format_time(window.end())
                )],
                &[output.as_str()],
            ));

            input = output;
        }

        Ok(Self {
            stages,
            output_label: OUTPUT_LABEL.to_string(),
            mask_count: masks.len(),
        })
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn output_label(&self) -> &str {
        &self.output_label
    }

    pub fn mask_count(&self) -> usize {
        self.mask_count
    }

    /// The `-filter_complex` argument value.
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Radius limited so both the luma plane and the half-size 4:2:0 chroma
/// planes of the cropped patch stay within boxblur's bounds. Never below 1;
/// patches are at least [`MIN_BLUR_SIDE`] on each side.
pub fn blur_radius(intensity: u32, width: u32, height: u32) -> u32 {
    intensity.min(width.min(height) / 4).max(1)
}

/// The mask rectangle grown to at least [`MIN_BLUR_SIDE`] per side.
///
/// Growth keeps the far edge fixed and extends toward the origin, so a
/// patch that fits the frame still fits afterwards. Frames are assumed to
/// be at least `MIN_BLUR_SIDE` pixels on each side.
pub fn blur_patch(rect: PixelRect) -> PixelRect {
    let (x, width) = grow_span(rect.x, rect.width);
    let (y, height) = grow_span(rect.y, rect.height);
    PixelRect::new(x, y, width, height)
}

fn grow_span(start: u32, len: u32) -> (u32, u32) {
    if len >= MIN_BLUR_SIDE {
        return (start, len);
    }
    let end = start.saturating_add(len);
    (end.saturating_sub(MIN_BLUR_SIDE), MIN_BLUR_SIDE)
}

/// Seconds with up to millisecond precision and no trailing zeros.
fn format_time(secs: f64) -> String {
    let s = format!("{secs:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
