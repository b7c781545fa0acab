//! Property-based tests for the display-to-video mapper.
//!
//! Whatever the container, frame, or drawn rectangle, mapped masks must
//! land inside the native frame with at least one pixel of extent.

use proptest::prelude::*;
use vidblur_mask_model::{
    ContainerSize, DisplayMask, DisplayRect, FrameSize, Intensity, TimeWindow,
};
use vidblur_masking::{map_to_video, Letterbox};

fn display_mask(x: f64, y: f64, w: f64, h: f64) -> DisplayMask {
    DisplayMask::new(
        DisplayRect::new(x, y, w, h),
        TimeWindow::new(0.0, 1.0).unwrap(),
        Intensity::default(),
    )
}

proptest! {
    /// Mapped rectangles never leave the frame.
    #[test]
    fn mapped_masks_stay_in_frame(
        cw in 1.0f64..4000.0,
        ch in 1.0f64..4000.0,
        vw in 1u32..8000,
        vh in 1u32..8000,
        x in -5000.0f64..5000.0,
        y in -5000.0f64..5000.0,
        w in 0.0f64..8000.0,
        h in 0.0f64..8000.0,
    ) {
        let frame = FrameSize::new(vw, vh);
        let out = map_to_video(
            &[display_mask(x, y, w, h)],
            ContainerSize::new(cw, ch),
            frame,
        )
        .unwrap();

        let rect = out[0].rect();
        prop_assert!(rect.width >= 1);
        prop_assert!(rect.height >= 1);
        prop_assert!(rect.right() <= vw as u64);
        prop_assert!(rect.bottom() <= vh as u64);
    }

    /// Scale and offsets are always finite and non-negative.
    #[test]
    fn letterbox_is_finite(
        cw in 1.0f64..4000.0,
        ch in 1.0f64..4000.0,
        vw in 1u32..8000,
        vh in 1u32..8000,
    ) {
        let lb = Letterbox::compute(ContainerSize::new(cw, ch), FrameSize::new(vw, vh)).unwrap();
        prop_assert!(lb.scale.is_finite() && lb.scale > 0.0);
        prop_assert!(lb.offset_x.is_finite() && lb.offset_x >= -1e-9);
        prop_assert!(lb.offset_y.is_finite() && lb.offset_y >= -1e-9);
        prop_assert!(lb.rendered_width <= cw + 1e-6);
        prop_assert!(lb.rendered_height <= ch + 1e-6);
    }

    /// A container with the frame's own size maps rectangles onto themselves.
    #[test]
    fn identity_container_preserves_rects(
        vw in 16u32..4000,
        vh in 16u32..4000,
        fx in 0.0f64..1.0,
        fy in 0.0f64..1.0,
    ) {
        let x = (fx * (vw - 8) as f64).floor();
        let y = (fy * (vh - 8) as f64).floor();
        let out = map_to_video(
            &[display_mask(x, y, 8.0, 8.0)],
            ContainerSize::new(vw as f64, vh as f64),
            FrameSize::new(vw, vh),
        )
        .unwrap();

        let rect = out[0].rect();
        prop_assert_eq!(rect.x, x as u32);
        prop_assert_eq!(rect.y, y as u32);
        prop_assert_eq!(rect.width, 8);
        prop_assert_eq!(rect.height, 8);
    }
}
