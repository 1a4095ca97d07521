// ============================================================================
// MASK BRUSH — round-capped segment rasterizer for the mask surface
// ============================================================================

use image::{Rgba, RgbaImage};

/// Translucent red used to mark masked pixels: `rgba(255, 0, 0, 0.85)`.
pub const DEFAULT_MASK_COLOR: [u8; 4] = [255, 0, 0, 217];

/// Brush diameter used when nothing else is configured.
pub const DEFAULT_BRUSH_SIZE: u32 = 24;

/// Offset of the second endpoint of a tap, so a click without movement
/// still produces a visible dot.
pub const TAP_NUDGE: f32 = 0.5;

/// How a stroke segment combines with the pixels already on the mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOp {
    /// Paint the mask colour over existing content.
    SourceOver,
    /// Remove existing content under the brush.
    DestinationOut,
}

/// Brush settings driven by the editor controls. Changes apply to the next
/// segment only; already painted pixels are never touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushState {
    pub size: u32,
    pub erasing: bool,
}

impl Default for BrushState {
    fn default() -> Self {
        Self {
            size: DEFAULT_BRUSH_SIZE,
            erasing: false,
        }
    }
}

impl BrushState {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            erasing: false,
        }
    }

    /// Set the diameter, clamped to `1..=max_size`.
    pub fn set_size(&mut self, size: u32, max_size: u32) {
        self.size = size.clamp(1, max_size.max(1));
    }

    /// Flip eraser mode and return the new state (for the toggle affordance).
    pub fn toggle_eraser(&mut self) -> bool {
        self.erasing = !self.erasing;
        self.erasing
    }

    pub fn composite_op(&self) -> CompositeOp {
        if self.erasing {
            CompositeOp::DestinationOut
        } else {
            CompositeOp::SourceOver
        }
    }
}

/// Pixel-space rectangle touched by a segment (inclusive bounds).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// Rasterize one segment from `start` to `end` onto `target`.
///
/// The segment is a capsule of diameter `width` (round caps; consecutive
/// segments sharing an endpoint therefore also give round joins). Pixels are
/// sampled at their centres and edges get one pixel of anti-aliasing. Each
/// pixel is composited at most once per call, matching a single canvas
/// `stroke()`.
///
/// Returns the touched rectangle, or `None` when the capsule misses the
/// surface entirely.
pub fn stroke_segment(
    target: &mut RgbaImage,
    start: (f32, f32),
    end: (f32, f32),
    width: f32,
    color: [u8; 4],
    op: CompositeOp,
) -> Option<DirtyRect> {
    let (w, h) = target.dimensions();
    if w == 0 || h == 0 || !width.is_finite() || width <= 0.0 {
        return None;
    }
    let radius = width / 2.0;

    // Bounding box of the capsule, padded by the anti-aliasing fringe
    let lo_x = start.0.min(end.0) - radius - 1.0;
    let hi_x = start.0.max(end.0) + radius + 1.0;
    let lo_y = start.1.min(end.1) - radius - 1.0;
    let hi_y = start.1.max(end.1) + radius + 1.0;
    if hi_x < 0.0 || hi_y < 0.0 || lo_x >= w as f32 || lo_y >= h as f32 {
        return None;
    }
    let min_x = lo_x.floor().max(0.0) as u32;
    let min_y = lo_y.floor().max(0.0) as u32;
    let max_x = (hi_x.ceil() as u32).min(w - 1);
    let max_y = (hi_y.ceil() as u32).min(h - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let dist = distance_to_segment((px, py), start, end);
            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let dst = target.get_pixel_mut(x, y);
            *dst = match op {
                CompositeOp::SourceOver => source_over(*dst, color, coverage),
                CompositeOp::DestinationOut => destination_out(*dst, coverage),
            };
        }
    }

    Some(DirtyRect {
        min_x,
        min_y,
        max_x,
        max_y,
    })
}

/// Draw the dot that starts a stroke: a segment from `pos` to `pos` nudged
/// by half a pixel on both axes.
pub fn stamp_dot(
    target: &mut RgbaImage,
    pos: (f32, f32),
    width: f32,
    color: [u8; 4],
    op: CompositeOp,
) -> Option<DirtyRect> {
    stroke_segment(
        target,
        pos,
        (pos.0 + TAP_NUDGE, pos.1 + TAP_NUDGE),
        width,
        color,
        op,
    )
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let abx = b.0 - a.0;
    let aby = b.1 - a.1;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq < 1e-12 {
        0.0
    } else {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.0 + abx * t;
    let cy = a.1 + aby * t;
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Unpremultiplied source-over with the source alpha scaled by `coverage`.
fn source_over(dst: Rgba<u8>, color: [u8; 4], coverage: f32) -> Rgba<u8> {
    let sa = color[3] as f32 / 255.0 * coverage;
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (color[c] as f32 * sa + dst.0[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Destination-out at full strength: erased coverage leaves no alpha behind.
fn destination_out(dst: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let keep = 1.0 - coverage;
    let a = (dst.0[3] as f32 * keep).round().clamp(0.0, 255.0) as u8;
    if a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([dst.0[0], dst.0[1], dst.0[2], a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> RgbaImage {
        RgbaImage::new(w, h)
    }

    #[test]
    fn tap_paints_a_round_dot_of_brush_diameter() {
        let mut img = blank(64, 64);
        stamp_dot(&mut img, (32.0, 32.0), 24.0, DEFAULT_MASK_COLOR, CompositeOp::SourceOver);

        assert_eq!(img.get_pixel(32, 32).0, DEFAULT_MASK_COLOR);
        // Inside the radius along both axes
        assert!(img.get_pixel(32 + 10, 32).0[3] > 0);
        assert!(img.get_pixel(32, 32 - 11).0[3] > 0);
        // Well outside the radius
        assert_eq!(img.get_pixel(32 + 14, 32).0[3], 0);
        assert_eq!(img.get_pixel(32, 32 + 14).0[3], 0);
        // Corner of the bounding square is outside the circle
        assert_eq!(img.get_pixel(32 + 10, 32 + 10).0[3], 0);
    }

    #[test]
    fn segment_covers_the_path_between_endpoints() {
        let mut img = blank(100, 20);
        stroke_segment(
            &mut img,
            (10.0, 10.0),
            (90.0, 10.0),
            6.0,
            DEFAULT_MASK_COLOR,
            CompositeOp::SourceOver,
        );
        for x in 10..90 {
            assert_eq!(img.get_pixel(x, 9).0[3], 217, "gap at x={x}");
        }
        assert_eq!(img.get_pixel(50, 2).0[3], 0);
        assert_eq!(img.get_pixel(50, 17).0[3], 0);
    }

    #[test]
    fn eraser_clears_existing_paint() {
        let mut img = RgbaImage::from_pixel(40, 40, Rgba(DEFAULT_MASK_COLOR));
        stamp_dot(&mut img, (20.0, 20.0), 10.0, DEFAULT_MASK_COLOR, CompositeOp::DestinationOut);
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(2, 2).0, DEFAULT_MASK_COLOR);
    }

    #[test]
    fn repeated_paint_accumulates_alpha() {
        let mut img = blank(10, 10);
        let c = DEFAULT_MASK_COLOR;
        stamp_dot(&mut img, (5.0, 5.0), 4.0, c, CompositeOp::SourceOver);
        stamp_dot(&mut img, (5.0, 5.0), 4.0, c, CompositeOp::SourceOver);
        let p = img.get_pixel(5, 5).0;
        assert_eq!(&p[..3], &[255, 0, 0]);
        assert!(p[3] > 217);
    }

    #[test]
    fn off_surface_segment_is_skipped() {
        let mut img = blank(10, 10);
        let hit = stroke_segment(
            &mut img,
            (-50.0, -50.0),
            (-40.0, -45.0),
            4.0,
            DEFAULT_MASK_COLOR,
            CompositeOp::SourceOver,
        );
        assert!(hit.is_none());
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn brush_size_is_clamped() {
        let mut brush = BrushState::default();
        brush.set_size(0, 512);
        assert_eq!(brush.size, 1);
        brush.set_size(4096, 512);
        assert_eq!(brush.size, 512);
        assert!(brush.toggle_eraser());
        assert_eq!(brush.composite_op(), CompositeOp::DestinationOut);
    }
}
