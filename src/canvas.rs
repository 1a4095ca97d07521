use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Longest edge an outpaint enlargement may grow to. Never shrinks the image.
pub const MAX_CANVAS_EDGE: u32 = 16384;

/// Smallest outpaint scale; smaller values would crop the base image.
pub const MIN_OUTPAINT_SCALE: f64 = 1.0;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// EDIT MODE
// ============================================================================

/// Whether the mask marks regions inside the image or an added border.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Canvas at native size; only painted regions are regenerated.
    #[default]
    Inpaint,
    /// Canvas enlarged by the scale; the border is masked by default.
    Outpaint,
}

impl EditMode {
    pub fn all() -> &'static [EditMode] {
        &[EditMode::Inpaint, EditMode::Outpaint]
    }

    /// Wire value used in the `edit_mode` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Inpaint => "inpaint",
            EditMode::Outpaint => "outpaint",
        }
    }

    /// Parse a wire value. Anything other than `"outpaint"` is inpaint.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("outpaint") {
            EditMode::Outpaint
        } else {
            EditMode::Inpaint
        }
    }

    pub fn label(&self) -> String {
        match self {
            EditMode::Inpaint => t!("editor.mode.inpaint"),
            EditMode::Outpaint => t!("editor.mode.outpaint"),
        }
    }
}

// ============================================================================
// BASE IMAGE
// ============================================================================

/// Decoded source image owned by one editor session.
#[derive(Clone, Debug)]
pub struct BaseImage {
    pub pixels: RgbaImage,
    /// File name shown in the host form.
    pub name: String,
    /// Size of the encoded source file in bytes.
    pub byte_len: u64,
}

impl BaseImage {
    pub fn new(pixels: RgbaImage, name: impl Into<String>, byte_len: u64) -> Self {
        Self {
            pixels,
            name: name.into(),
            byte_len,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Caption for the upload preview, e.g. `photo.png / 12.5 KB`.
    pub fn file_meta(&self) -> String {
        format!("{} / {:.1} KB", self.name, self.byte_len as f64 / 1024.0)
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Canvas dimensions and where the base image sits inside them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub image_width: u32,
    pub image_height: u32,
}

impl CanvasLayout {
    /// Derive the canvas for an image of `image_width`×`image_height`.
    ///
    /// Inpaint always uses the native size. Outpaint sizes each axis to
    /// `round(dim * scale)`, capped at [`MAX_CANVAS_EDGE`] but never below the
    /// image itself, and centres the image at `round((canvas - dim) / 2)`.
    pub fn compute(image_width: u32, image_height: u32, mode: EditMode, scale: f64) -> Self {
        let (width, height) = match mode {
            EditMode::Inpaint => (image_width, image_height),
            EditMode::Outpaint => {
                let scale = sanitize_scale(scale);
                let axis = |dim: u32| {
                    let grown = (dim as f64 * scale).round().min(MAX_CANVAS_EDGE as f64) as u32;
                    grown.max(dim).max(1)
                };
                (axis(image_width), axis(image_height))
            }
        };
        let offset_x = ((width as f64 - image_width as f64) / 2.0).round() as i32;
        let offset_y = ((height as f64 - image_height as f64) / 2.0).round() as i32;
        Self {
            width,
            height,
            offset_x,
            offset_y,
            image_width,
            image_height,
        }
    }

    /// True when pixel `(x, y)` lies inside the placed base image.
    pub fn image_contains(&self, x: u32, y: u32) -> bool {
        let (x, y) = (x as i64, y as i64);
        let left = self.offset_x as i64;
        let top = self.offset_y as i64;
        x >= left
            && y >= top
            && x < left + self.image_width as i64
            && y < top + self.image_height as i64
    }
}

/// Scale actually used for outpaint: non-finite becomes 1, anything below
/// [`MIN_OUTPAINT_SCALE`] is raised to it.
pub fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() {
        scale.max(MIN_OUTPAINT_SCALE)
    } else {
        1.0
    }
}

// ============================================================================
// SURFACES + RENDER
// ============================================================================

/// The two stacked drawing surfaces of the editor.
#[derive(Clone, Debug)]
pub struct Surfaces {
    pub layout: CanvasLayout,
    /// White background with the base image composited at the offset.
    pub base: RgbaImage,
    /// User-editable mask, same dimensions as `base`.
    pub mask: RgbaImage,
}

impl Surfaces {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.layout.width, self.layout.height)
    }
}

/// Build both surfaces from scratch for the given mode and scale.
///
/// This is the only place canvas content is initialised; it discards any
/// previous strokes by construction.
pub fn render(image: &BaseImage, mode: EditMode, scale: f64, mask_color: [u8; 4]) -> Surfaces {
    let layout = CanvasLayout::compute(image.width(), image.height(), mode, scale);
    Surfaces {
        layout,
        base: render_base(image, &layout),
        mask: initial_mask(&layout, mode, mask_color),
    }
}

/// White canvas with the image drawn source-over at the layout offset.
pub fn render_base(image: &BaseImage, layout: &CanvasLayout) -> RgbaImage {
    let mut base = RgbaImage::from_pixel(layout.width, layout.height, WHITE);
    image::imageops::overlay(
        &mut base,
        &image.pixels,
        layout.offset_x as i64,
        layout.offset_y as i64,
    );
    base
}

/// Mask content right after a render or reset.
///
/// Inpaint: fully transparent. Outpaint: filled with `mask_color` except the
/// exact rectangle occupied by the base image.
pub fn initial_mask(layout: &CanvasLayout, mode: EditMode, mask_color: [u8; 4]) -> RgbaImage {
    match mode {
        EditMode::Inpaint => RgbaImage::from_pixel(layout.width, layout.height, TRANSPARENT),
        EditMode::Outpaint => {
            let mut mask = RgbaImage::from_pixel(layout.width, layout.height, Rgba(mask_color));
            let x0 = layout.offset_x.max(0) as u32;
            let y0 = layout.offset_y.max(0) as u32;
            let x1 = (layout.offset_x as i64 + layout.image_width as i64)
                .clamp(0, layout.width as i64) as u32;
            let y1 = (layout.offset_y as i64 + layout.image_height as i64)
                .clamp(0, layout.height as i64) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    mask.put_pixel(x, y, TRANSPARENT);
                }
            }
            mask
        }
    }
}

/// A mask pixel counts as masked as soon as it carries any alpha.
#[inline]
pub fn is_masked(pixel: &Rgba<u8>) -> bool {
    pixel.0[3] > 0
}

/// Flatten the mask over the base for on-screen display (the two stacked
/// canvases as the user sees them).
pub fn composite_overlay(surfaces: &Surfaces) -> RgbaImage {
    let mut out = surfaces.base.clone();
    out.par_chunks_mut(4)
        .zip(surfaces.mask.as_raw().par_chunks(4))
        .for_each(|(dst, src)| {
            let sa = src[3] as f32 / 255.0;
            if sa <= 0.0 {
                return;
            }
            let da = dst[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            for c in 0..3 {
                let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::brush::DEFAULT_MASK_COLOR;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> BaseImage {
        BaseImage::new(RgbaImage::from_pixel(w, h, Rgba(color)), "solid.png", 0)
    }

    #[test]
    fn layout_rounds_and_centres() {
        let l = CanvasLayout::compute(101, 50, EditMode::Outpaint, 1.5);
        // 151.5 rounds up, 75 exact
        assert_eq!((l.width, l.height), (152, 75));
        // (152 - 101) / 2 = 25.5 → 26; (75 - 50) / 2 = 12.5 → 13
        assert_eq!((l.offset_x, l.offset_y), (26, 13));
    }

    #[test]
    fn inpaint_ignores_scale() {
        let l = CanvasLayout::compute(40, 30, EditMode::Inpaint, 3.0);
        assert_eq!((l.width, l.height, l.offset_x, l.offset_y), (40, 30, 0, 0));
    }

    #[test]
    fn scale_below_one_is_raised() {
        let l = CanvasLayout::compute(40, 30, EditMode::Outpaint, 0.25);
        assert_eq!((l.width, l.height), (40, 30));
        assert_eq!(sanitize_scale(f64::NAN), 1.0);
        assert_eq!(sanitize_scale(f64::INFINITY), 1.0);
    }

    #[test]
    fn layout_sizes_for_many_scales() {
        // (image edge, scale text, expected canvas edge); expectations are
        // worked by hand from round(dim * scale) with halves rounding up
        let cases: &[(u32, &str, u32)] = &[
            (10, "1.05", 11),
            (50, "1.01", 51),
            (7, "1.5", 11),
            (333, "1.1", 366),
            (64, "2", 128),
            (1, "2.75", 3),
            (1, "1.25", 1),
        ];
        for &(dim, text, expected) in cases {
            let scale: f64 = text.parse().unwrap();
            let l = CanvasLayout::compute(dim, dim, EditMode::Outpaint, scale);
            assert_eq!((l.width, l.height), (expected, expected), "{dim}px @ {text}");
            let offset = ((expected - dim) as f64 / 2.0).round() as i32;
            assert_eq!((l.offset_x, l.offset_y), (offset, offset), "{dim}px @ {text}");
        }
    }

    #[test]
    fn oversized_images_are_never_cropped() {
        let l = CanvasLayout::compute(20000, 1, EditMode::Inpaint, 1.0);
        assert_eq!((l.width, l.height, l.offset_x), (20000, 1, 0));

        let l = CanvasLayout::compute(20000, 100, EditMode::Outpaint, 2.0);
        assert_eq!((l.width, l.height), (20000, 200));
        assert_eq!((l.offset_x, l.offset_y), (0, 50));

        let l = CanvasLayout::compute(10000, 10, EditMode::Outpaint, 2.0);
        assert_eq!(l.width, MAX_CANVAS_EDGE);

        let img = solid(20000, 1, [0, 0, 0, 255]);
        let s = render(&img, EditMode::Inpaint, 1.0, DEFAULT_MASK_COLOR);
        assert_eq!(s.dimensions(), (20000, 1));
        assert_eq!(s.base.get_pixel(19999, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn outpaint_mask_masks_only_the_border() {
        let img = solid(20, 10, [0, 0, 255, 255]);
        let s = render(&img, EditMode::Outpaint, 2.0, DEFAULT_MASK_COLOR);
        assert_eq!(s.dimensions(), (40, 20));
        for (x, y, p) in s.mask.enumerate_pixels() {
            assert_eq!(is_masked(p), !s.layout.image_contains(x, y), "at {x},{y}");
        }
    }

    #[test]
    fn inpaint_mask_starts_empty() {
        let img = solid(12, 9, [10, 20, 30, 255]);
        let s = render(&img, EditMode::Inpaint, 2.0, DEFAULT_MASK_COLOR);
        assert_eq!(s.dimensions(), (12, 9));
        assert!(s.mask.pixels().all(|p| !is_masked(p)));
    }

    #[test]
    fn base_is_white_around_the_centred_image() {
        let img = solid(4, 4, [0, 0, 0, 255]);
        let s = render(&img, EditMode::Outpaint, 2.0, DEFAULT_MASK_COLOR);
        assert_eq!(s.layout.offset_x, 2);
        assert_eq!(s.base.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(s.base.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(s.base.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(s.base.get_pixel(6, 6).0, [255, 255, 255, 255]);
    }

    #[test]
    fn transparent_source_pixels_show_white() {
        let img = solid(3, 3, [0, 0, 0, 0]);
        let s = render(&img, EditMode::Inpaint, 1.0, DEFAULT_MASK_COLOR);
        assert!(s.base.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn overlay_tints_masked_pixels() {
        let img = solid(4, 4, [255, 255, 255, 255]);
        let s = render(&img, EditMode::Outpaint, 2.0, DEFAULT_MASK_COLOR);
        let flat = composite_overlay(&s);
        let border = flat.get_pixel(0, 0).0;
        assert_eq!(border[0], 255);
        assert!(border[1] < 64);
        assert_eq!(flat.get_pixel(3, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn edit_mode_wire_values() {
        assert_eq!(EditMode::parse("outpaint"), EditMode::Outpaint);
        assert_eq!(EditMode::parse("OUTPAINT "), EditMode::Outpaint);
        assert_eq!(EditMode::parse("anything"), EditMode::Inpaint);
        assert_eq!(EditMode::Outpaint.as_str(), "outpaint");
    }

    #[test]
    fn file_meta_formats_kilobytes() {
        let img = BaseImage::new(RgbaImage::new(1, 1), "a.png", 2048 + 512);
        assert_eq!(img.file_meta(), "a.png / 2.5 KB");
    }
}
