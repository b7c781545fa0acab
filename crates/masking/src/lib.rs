//! vidblur Masking
//!
//! Pure, synchronous mask authoring:
//! - **Editor:** Drag/release gesture state machine producing display-space masks
//! - **Mapper:** Aspect-fit (letterbox/pillarbox) compensation into native video pixels
//!
//! Nothing here touches I/O or playback state. Callers pass the current
//! playhead and container size explicitly.

pub mod editor;
pub mod mapper;

pub use editor::{
    DragOutcome, DragState, EditorError, EditorSettings, MaskTimelineEditor, MaskUpdate,
};
pub use mapper::{map_to_video, Letterbox, TransformError};
