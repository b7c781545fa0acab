//! Mask timeline editor.
//!
//! Owns one edit session for one source video. A press/drag/release
//! gesture over the preview becomes a display-space mask whose time window
//! starts at the playhead. Masks can then be adjusted, deleted, and finally
//! mapped into video space for submission.

use vidblur_common::config::EditorDefaults;
use vidblur_common::playhead::format_playhead;
use vidblur_mask_model::{
    ContainerSize, DisplayMask, DisplayRect, FrameSize, Intensity, MaskId, Point2D, TimeWindow,
    VideoMask,
};

use crate::mapper::{map_to_video, TransformError};

/// Errors surfaced by the editor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("Add at least one blur mask before saving")]
    EmptyMaskList,

    #[error("Unknown mask: {id}")]
    UnknownMask { id: MaskId },

    #[error("Invalid mask rectangle: {message}")]
    InvalidRect { message: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Tunables for new masks and gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    /// Gestures narrower or shorter than this (display pixels) are discarded.
    pub min_drag_px: f64,
    pub default_window_secs: f64,
    pub default_intensity: Intensity,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self::from(&EditorDefaults::default())
    }
}

impl From<&EditorDefaults> for EditorSettings {
    fn from(defaults: &EditorDefaults) -> Self {
        Self {
            min_drag_px: defaults.min_drag_px,
            default_window_secs: defaults.default_window_secs,
            default_intensity: Intensity::new(defaults.default_intensity),
        }
    }
}

/// Pointer gesture state. Only one drawing gesture exists at a time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Drawing { anchor: Point2D, current: Point2D },
}

/// Result of finishing a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// A mask was created and selected.
    Committed(MaskId),
    /// The span was below the minimum size. Not an error.
    Discarded,
    /// No gesture was in progress.
    NotDrawing,
}

/// Partial edit applied by [`MaskTimelineEditor::update_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskUpdate {
    pub rect: Option<DisplayRect>,
    pub start_secs: Option<f64>,
    pub end_secs: Option<f64>,
    pub intensity: Option<u32>,
}

/// Edit session for one source video.
#[derive(Debug, Clone)]
pub struct MaskTimelineEditor {
    masks: Vec<DisplayMask>,
    selected: Option<MaskId>,
    state: DragState,
    duration_secs: f64,
    settings: EditorSettings,
}

impl MaskTimelineEditor {
    /// Start a session for a video of the given duration.
    ///
    /// A non-positive duration means it is not known yet; windows are then
    /// bounded below only until [`Self::set_duration`] is called.
    pub fn new(duration_secs: f64, settings: EditorSettings) -> Self {
        Self {
            masks: Vec::new(),
            selected: None,
            state: DragState::Idle,
            duration_secs,
            settings,
        }
    }

    /// Start a session with already-drawn masks (for example a reopened edit).
    /// Their windows are capped at `duration_secs`.
    pub fn with_masks(
        duration_secs: f64,
        settings: EditorSettings,
        masks: Vec<DisplayMask>,
    ) -> Self {
        let mut editor = Self::new(duration_secs, settings);
        editor.masks = masks;
        editor.set_duration(duration_secs);
        editor
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Update the duration once metadata is available. Existing windows
    /// are re-clamped.
    pub fn set_duration(&mut self, duration_secs: f64) {
        self.duration_secs = duration_secs;
        for mask in &mut self.masks {
            mask.window = mask.window.capped_to(duration_secs);
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn masks(&self) -> &[DisplayMask] {
        &self.masks
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn mask(&self, id: &MaskId) -> Option<&DisplayMask> {
        self.masks.iter().find(|m| &m.id == id)
    }

    /// Press: begin drawing at `pos`. A press while already drawing
    /// restarts the anchor.
    pub fn begin_drag(&mut self, pos: Point2D) {
        if !pos.is_finite() {
            tracing::debug!("Ignoring press with non-finite position");
            return;
        }
        self.state = DragState::Drawing {
            anchor: pos,
            current: pos,
        };
    }

    /// Move: track the pointer while drawing. No mask is created.
    pub fn update_drag(&mut self, pos: Point2D) {
        if let DragState::Drawing { current, .. } = &mut self.state {
            if pos.is_finite() {
                *current = pos;
            }
        }
    }

    /// Live preview rectangle while drawing.
    pub fn draft_rect(&self) -> Option<DisplayRect> {
        match self.state {
            DragState::Drawing { anchor, current } => {
                Some(DisplayRect::from_corners(anchor, current))
            }
            DragState::Idle => None,
        }
    }

    /// Release: commit a mask if the span is large enough.
    ///
    /// The new mask starts at the playhead and lasts the default window,
    /// capped at the video duration. Always returns to `Idle`.
    pub fn end_drag(&mut self, pos: Point2D, playhead_secs: f64) -> DragOutcome {
        let DragState::Drawing { anchor, current } = std::mem::take(&mut self.state) else {
            return DragOutcome::NotDrawing;
        };
        let end = if pos.is_finite() { pos } else { current };
        let rect = DisplayRect::from_corners(anchor, end);

        if !rect.meets_minimum(self.settings.min_drag_px) {
            tracing::debug!(
                width = rect.width,
                height = rect.height,
                min_px = self.settings.min_drag_px,
                "Discarded drag below minimum size"
            );
            return DragOutcome::Discarded;
        }

        let window = TimeWindow::starting_at(
            playhead_secs,
            self.settings.default_window_secs,
            self.duration_secs,
        );
        let mask = DisplayMask::new(rect, window, self.settings.default_intensity);
        let id = mask.id.clone();

        tracing::debug!(
            mask_id = %id,
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            start = %format_playhead(window.start()),
            end = %format_playhead(window.end()),
            "Committed mask"
        );

        self.masks.push(mask);
        self.selected = Some(id.clone());
        DragOutcome::Committed(id)
    }

    /// Pointer left the preview mid-gesture. Commits at the last known
    /// position, exactly like a release there.
    pub fn pointer_leave(&mut self, playhead_secs: f64) -> DragOutcome {
        match self.state {
            DragState::Drawing { current, .. } => self.end_drag(current, playhead_secs),
            DragState::Idle => DragOutcome::NotDrawing,
        }
    }

    /// Merge a partial edit into an existing mask.
    ///
    /// Intensity is clamped into range and the window into `[0, duration]`
    /// with `start <= end`.
    pub fn update_mask(&mut self, id: &MaskId, update: MaskUpdate) -> Result<(), EditorError> {
        if let Some(rect) = update.rect {
            if !rect.is_finite() || rect.width <= 0.0 || rect.height <= 0.0 {
                return Err(EditorError::InvalidRect {
                    message: format!("{}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y),
                });
            }
        }

        let duration = self.duration_secs;
        let mask = self
            .masks
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| EditorError::UnknownMask { id: id.clone() })?;

        if let Some(rect) = update.rect {
            mask.rect = rect;
        }
        if update.start_secs.is_some() || update.end_secs.is_some() {
            let start = update.start_secs.unwrap_or(mask.window.start());
            let end = update.end_secs.unwrap_or(mask.window.end());
            mask.window = TimeWindow::clamped(start, end, duration);
        }
        if let Some(intensity) = update.intensity {
            mask.intensity = Intensity::new(intensity);
        }
        Ok(())
    }

    /// Remove a mask. Returns whether it existed.
    pub fn delete_mask(&mut self, id: &MaskId) -> bool {
        let before = self.masks.len();
        self.masks.retain(|m| &m.id != id);
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        self.masks.len() != before
    }

    pub fn select(&mut self, id: &MaskId) -> Result<(), EditorError> {
        if self.mask(id).is_none() {
            return Err(EditorError::UnknownMask { id: id.clone() });
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&MaskId> {
        self.selected.as_ref()
    }

    /// Masks whose window contains `current_time`, in creation order.
    pub fn visible_masks(&self, current_time: f64) -> Vec<&DisplayMask> {
        self.masks
            .iter()
            .filter(|m| m.is_visible_at(current_time))
            .collect()
    }

    /// Map every mask into video space for submission.
    pub fn finish(
        &self,
        container: ContainerSize,
        video: FrameSize,
    ) -> Result<Vec<VideoMask>, EditorError> {
        if self.masks.is_empty() {
            return Err(EditorError::EmptyMaskList);
        }
        Ok(map_to_video(&self.masks, container, video)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidblur_mask_model::PixelRect;

    fn editor(duration: f64) -> MaskTimelineEditor {
        MaskTimelineEditor::new(duration, EditorSettings::default())
    }

    fn committed(outcome: DragOutcome) -> MaskId {
        match outcome {
            DragOutcome::Committed(id) => id,
            other => panic!("expected commit, got {other:?}"),
        }
    }

    fn draw(ed: &mut MaskTimelineEditor, from: (f64, f64), to: (f64, f64), t: f64) -> DragOutcome {
        ed.begin_drag(Point2D::new(from.0, from.1));
        ed.update_drag(Point2D::new(to.0, to.1));
        ed.end_drag(Point2D::new(to.0, to.1), t)
    }

    #[test]
    fn test_drag_commits_mask_at_playhead() {
        let mut ed = editor(30.0);
        let id = committed(draw(&mut ed, (300.0, 200.0), (100.0, 100.0), 4.0));

        let mask = ed.mask(&id).unwrap();
        assert_eq!(mask.rect, DisplayRect::new(100.0, 100.0, 200.0, 100.0));
        assert_eq!(mask.window.start(), 4.0);
        assert_eq!(mask.window.end(), 9.0);
        assert_eq!(mask.intensity.get(), 20);
        assert_eq!(ed.selected(), Some(&id));
        assert_eq!(ed.state(), DragState::Idle);
    }

    #[test]
    fn test_window_capped_at_duration() {
        let mut ed = editor(6.0);
        let id = committed(draw(&mut ed, (0.0, 0.0), (50.0, 50.0), 3.0));
        assert_eq!(ed.mask(&id).unwrap().window.end(), 6.0);
    }

    #[test]
    fn test_small_drag_is_discarded() {
        let mut ed = editor(10.0);
        assert_eq!(
            draw(&mut ed, (10.0, 10.0), (15.0, 200.0), 0.0),
            DragOutcome::Discarded
        );
        assert!(ed.is_empty());
        assert_eq!(ed.state(), DragState::Idle);
    }

    #[test]
    fn test_release_without_press() {
        let mut ed = editor(10.0);
        assert_eq!(
            ed.end_drag(Point2D::new(10.0, 10.0), 0.0),
            DragOutcome::NotDrawing
        );
        assert_eq!(ed.pointer_leave(0.0), DragOutcome::NotDrawing);
    }

    #[test]
    fn test_draft_rect_follows_pointer() {
        let mut ed = editor(10.0);
        assert!(ed.draft_rect().is_none());
        ed.begin_drag(Point2D::new(50.0, 50.0));
        ed.update_drag(Point2D::new(80.0, 20.0));
        assert_eq!(ed.draft_rect(), Some(DisplayRect::new(50.0, 20.0, 30.0, 30.0)));
        assert!(ed.is_empty());
    }

    #[test]
    fn test_second_press_restarts_anchor() {
        let mut ed = editor(10.0);
        ed.begin_drag(Point2D::new(0.0, 0.0));
        ed.begin_drag(Point2D::new(100.0, 100.0));
        let id = committed(ed.end_drag(Point2D::new(150.0, 150.0), 0.0));
        assert_eq!(ed.mask(&id).unwrap().rect.x, 100.0);
        assert_eq!(ed.masks().len(), 1);
    }

    #[test]
    fn test_pointer_leave_commits_at_last_position() {
        let mut ed = editor(10.0);
        ed.begin_drag(Point2D::new(10.0, 10.0));
        ed.update_drag(Point2D::new(110.0, 60.0));
        let id = committed(ed.pointer_leave(2.0));
        assert_eq!(
            ed.mask(&id).unwrap().rect,
            DisplayRect::new(10.0, 10.0, 100.0, 50.0)
        );
        assert_eq!(ed.state(), DragState::Idle);
    }

    #[test]
    fn test_update_mask_clamps() {
        let mut ed = editor(10.0);
        let id = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 1.0));

        ed.update_mask(
            &id,
            MaskUpdate {
                start_secs: Some(-3.0),
                end_secs: Some(42.0),
                intensity: Some(500),
                ..Default::default()
            },
        )
        .unwrap();
        let mask = ed.mask(&id).unwrap();
        assert_eq!(mask.window.start(), 0.0);
        assert_eq!(mask.window.end(), 10.0);
        assert_eq!(mask.intensity.get(), 50);

        // Moving start past end drags end along.
        ed.update_mask(
            &id,
            MaskUpdate {
                start_secs: Some(12.0),
                end_secs: Some(4.0),
                intensity: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        let mask = ed.mask(&id).unwrap();
        assert_eq!(mask.window.start(), 10.0);
        assert_eq!(mask.window.end(), 10.0);
        assert_eq!(mask.intensity.get(), 1);
    }

    #[test]
    fn test_update_unknown_mask() {
        let mut ed = editor(10.0);
        let missing = MaskId::new("nope");
        assert_eq!(
            ed.update_mask(&missing, MaskUpdate::default()),
            Err(EditorError::UnknownMask { id: missing })
        );
    }

    #[test]
    fn test_update_rejects_bad_rect() {
        let mut ed = editor(10.0);
        let id = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 1.0));
        let err = ed
            .update_mask(
                &id,
                MaskUpdate {
                    rect: Some(DisplayRect::new(0.0, 0.0, f64::NAN, 10.0)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EditorError::InvalidRect { .. }));
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut ed = editor(10.0);
        let first = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 0.0));
        let second = committed(draw(&mut ed, (50.0, 50.0), (90.0, 90.0), 0.0));
        assert_eq!(ed.selected(), Some(&second));

        ed.select(&first).unwrap();
        assert!(ed.delete_mask(&first));
        assert!(ed.selected().is_none());
        assert!(!ed.delete_mask(&first));
        assert_eq!(ed.masks().len(), 1);
    }

    #[test]
    fn test_visible_masks_by_time() {
        let mut ed = editor(30.0);
        let early = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 0.0));
        let late = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 10.0));

        let ids = |t: f64| -> Vec<MaskId> {
            ed.visible_masks(t).into_iter().map(|m| m.id.clone()).collect()
        };
        assert_eq!(ids(2.0), vec![early.clone()]);
        assert_eq!(ids(5.0), vec![early]);
        assert_eq!(ids(12.0), vec![late]);
        assert!(ids(20.0).is_empty());
    }

    #[test]
    fn test_set_duration_recaps_windows() {
        let mut ed = editor(0.0);
        let id = committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 2.0));
        assert_eq!(ed.mask(&id).unwrap().window.end(), 7.0);

        ed.set_duration(4.0);
        assert_eq!(ed.mask(&id).unwrap().window.end(), 4.0);
    }

    #[test]
    fn test_with_masks_caps_windows() {
        let long = DisplayMask::new(
            DisplayRect::new(0.0, 0.0, 50.0, 50.0),
            TimeWindow::new(2.0, 20.0).unwrap(),
            Intensity::default(),
        );
        let open =
            MaskTimelineEditor::with_masks(0.0, EditorSettings::default(), vec![long.clone()]);
        // Unknown duration leaves windows alone.
        assert_eq!(open.masks()[0].window.end(), 20.0);

        let late = DisplayMask::new(
            DisplayRect::new(10.0, 10.0, 50.0, 50.0),
            TimeWindow::new(12.0, 15.0).unwrap(),
            Intensity::default(),
        );
        let ed = MaskTimelineEditor::with_masks(10.0, EditorSettings::default(), vec![long, late]);

        let windows: Vec<_> = ed.masks().iter().map(|m| m.window).collect();
        assert_eq!(windows[0], TimeWindow::new(2.0, 10.0).unwrap());
        assert_eq!(windows[1], TimeWindow::new(10.0, 10.0).unwrap());
    }

    #[test]
    fn test_finish_requires_masks() {
        let ed = editor(10.0);
        assert_eq!(
            ed.finish(ContainerSize::new(800.0, 450.0), FrameSize::new(1920, 1080)),
            Err(EditorError::EmptyMaskList)
        );
    }

    #[test]
    fn test_finish_maps_to_video_space() {
        let mut ed = editor(10.0);
        committed(draw(&mut ed, (100.0, 50.0), (300.0, 150.0), 0.0));
        let out = ed
            .finish(ContainerSize::new(800.0, 450.0), FrameSize::new(1920, 1080))
            .unwrap();
        assert_eq!(out[0].rect(), PixelRect::new(240, 120, 480, 240));
    }

    #[test]
    fn test_finish_surfaces_transform_error() {
        let mut ed = editor(10.0);
        committed(draw(&mut ed, (0.0, 0.0), (40.0, 40.0), 0.0));
        let err = ed
            .finish(ContainerSize::new(0.0, 450.0), FrameSize::new(1920, 1080))
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Transform(TransformError::DegenerateContainer { .. })
        ));
    }

    #[test]
    fn test_settings_from_config_defaults() {
        let defaults = EditorDefaults {
            min_drag_px: 4.0,
            default_window_secs: 2.0,
            default_intensity: 99,
        };
        let settings = EditorSettings::from(&defaults);
        assert_eq!(settings.min_drag_px, 4.0);
        assert_eq!(settings.default_intensity.get(), 50);
    }
}
