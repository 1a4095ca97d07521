// ============================================================================
// MASK EDITOR — image/canvas state, pointer stroke state machine, export
// ============================================================================

use std::path::Path;
use uuid::Uuid;

use crate::canvas::{self, BaseImage, CanvasLayout, EditMode, Surfaces, sanitize_scale};
use crate::error::EditorError;
use crate::form::HostForm;
use crate::io::{self, ExportedPair};
use crate::ops::brush::{self, BrushState, DirtyRect};
use crate::settings::EditorSettings;

// -- Pointer input ------------------------------------------------------

/// On-screen bounding box of the displayed mask canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && y >= self.top && x < self.left + self.width && y < self.top + self.height
    }
}

/// A pointer event in client coordinates together with the canvas box it
/// was measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub client_x: f32,
    pub client_y: f32,
    pub bounds: ScreenRect,
}

impl Pointer {
    pub fn new(client_x: f32, client_y: f32, bounds: ScreenRect) -> Self {
        Self {
            client_x,
            client_y,
            bounds,
        }
    }

    /// Pointer already expressed in canvas pixels (box == canvas size).
    pub fn at_canvas(x: f32, y: f32, canvas_width: u32, canvas_height: u32) -> Self {
        Self::new(
            x,
            y,
            ScreenRect::new(0.0, 0.0, canvas_width as f32, canvas_height as f32),
        )
    }
}

/// Map client coordinates into canvas pixel space:
/// `(client - box.origin) / box.size * canvas.size` on each axis.
/// A degenerate box yields `None`.
pub fn map_to_canvas(pointer: &Pointer, canvas_width: u32, canvas_height: u32) -> Option<(f32, f32)> {
    let b = pointer.bounds;
    if !(b.width > 0.0 && b.height > 0.0) {
        return None;
    }
    let x = (pointer.client_x - b.left) / b.width * canvas_width as f32;
    let y = (pointer.client_y - b.top) / b.height * canvas_height as f32;
    if x.is_finite() && y.is_finite() {
        Some((x, y))
    } else {
        None
    }
}

// -- Editor state -------------------------------------------------------

/// Per-session drawing state.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    /// A pointer is down; `last` is the previous point in canvas pixels.
    Drawing { last: (f32, f32) },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// Transient, dismissible message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

/// The mask editor controller. One instance per host page; every mutation
/// goes through `&mut self`, so writes to the mask are serialised by the
/// caller's event loop.
pub struct MaskEditor {
    session_id: Uuid,
    base_image: Option<BaseImage>,
    mode: EditMode,
    scale: f64,
    brush: BrushState,
    max_brush_size: u32,
    mask_color: [u8; 4],
    surfaces: Option<Surfaces>,
    stroke: StrokeState,
    open: bool,
    status: Option<StatusMessage>,
    /// Bumped whenever surface pixels change, so views know to re-upload.
    revision: u64,
}

impl Default for MaskEditor {
    fn default() -> Self {
        Self::new(&EditorSettings::default())
    }
}

impl MaskEditor {
    pub fn new(settings: &EditorSettings) -> Self {
        let mut brush = BrushState::new(settings.default_brush_size);
        brush.set_size(brush.size, settings.max_brush_size);
        Self {
            session_id: Uuid::new_v4(),
            base_image: None,
            mode: settings.default_edit_mode,
            scale: sanitize_scale(settings.default_scale),
            brush,
            max_brush_size: settings.max_brush_size,
            mask_color: settings.mask_color,
            surfaces: None,
            stroke: StrokeState::Idle,
            open: false,
            status: None,
            revision: 0,
        }
    }

    // ---- accessors ----------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn base_image(&self) -> Option<&BaseImage> {
        self.base_image.as_ref()
    }

    pub fn has_base_image(&self) -> bool {
        self.base_image.is_some()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn brush(&self) -> BrushState {
        self.brush
    }

    pub fn mask_color(&self) -> [u8; 4] {
        self.mask_color
    }

    pub fn surfaces(&self) -> Option<&Surfaces> {
        self.surfaces.as_ref()
    }

    pub fn layout(&self) -> Option<CanvasLayout> {
        self.surfaces.as_ref().map(|s| s.layout)
    }

    pub fn stroke_state(&self) -> StrokeState {
        self.stroke
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.stroke, StrokeState::Drawing { .. })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True when the outpaint-only controls (scale) should be shown.
    pub fn shows_outpaint_controls(&self) -> bool {
        self.mode == EditMode::Outpaint
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn dismiss_status(&mut self) {
        self.status = None;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ---- base image ---------------------------------------------------------

    /// Decode `bytes` and, on success, make it the base image and open the
    /// editor. On failure the previous image stays in place.
    pub fn load_base_image(&mut self, bytes: &[u8], name: &str) -> Result<(), EditorError> {
        self.accept_decoded(io::decode_base_image(bytes, name))
    }

    /// Synchronous file variant of [`load_base_image`](Self::load_base_image).
    pub fn load_base_image_file(&mut self, path: &Path) -> Result<(), EditorError> {
        self.accept_decoded(io::load_base_image_sync(path))
    }

    /// Feed a finished decode into the editor.
    pub fn accept_decoded(&mut self, result: Result<BaseImage, EditorError>) -> Result<(), EditorError> {
        match result {
            Ok(image) => {
                self.session_id = Uuid::new_v4();
                log_info!(
                    "[{}] base image '{}' loaded ({}x{})",
                    self.session_id,
                    image.name,
                    image.width(),
                    image.height()
                );
                self.base_image = Some(image);
                self.open_editor()
            }
            Err(e) => {
                log_err!("[{}] base image load failed: {}", self.session_id, e);
                self.status = Some(StatusMessage::error(e.user_message()));
                Err(e)
            }
        }
    }

    /// The host's base-image field was cleared: drop everything derived from it.
    pub fn clear_base_image(&mut self) {
        if self.base_image.take().is_some() {
            log_info!("[{}] base image cleared", self.session_id);
        }
        self.surfaces = None;
        self.stroke = StrokeState::Idle;
        self.open = false;
        self.revision += 1;
    }

    // ---- presentation -------------------------------------------------------

    /// Render fresh surfaces and present the editor. Fails without a base image.
    pub fn open_editor(&mut self) -> Result<(), EditorError> {
        if self.base_image.is_none() {
            let e = EditorError::NoBaseImage;
            self.status = Some(StatusMessage::error(e.user_message()));
            log_warn!("[{}] open requested without a base image", self.session_id);
            return Err(e);
        }
        self.rerender();
        self.open = true;
        self.status = None;
        Ok(())
    }

    /// Hide the editor without exporting. Surfaces are kept until the next render.
    pub fn close_editor(&mut self) {
        self.stroke = StrokeState::Idle;
        self.open = false;
    }

    // ---- mode / scale -------------------------------------------------------

    pub fn set_edit_mode(&mut self, mode: EditMode) {
        if mode == self.mode {
            return;
        }
        log_info!(
            "[{}] edit mode {} -> {}",
            self.session_id,
            self.mode.as_str(),
            mode.as_str()
        );
        self.mode = mode;
        self.rerender();
    }

    /// Parse the scale field. Empty or non-numeric input means 1.0.
    pub fn set_scale(&mut self, text: &str) {
        let value = text.trim().parse::<f64>().unwrap_or(1.0);
        self.set_scale_value(value);
    }

    pub fn set_scale_value(&mut self, value: f64) {
        let scale = sanitize_scale(value);
        if value.is_finite() && scale != value {
            log_warn!(
                "[{}] outpaint scale {} raised to {}",
                self.session_id,
                value,
                scale
            );
        }
        if scale == self.scale {
            return;
        }
        self.scale = scale;
        if self.mode == EditMode::Outpaint {
            self.rerender();
        }
    }

    // ---- brush --------------------------------------------------------------

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush.set_size(size, self.max_brush_size);
    }

    /// Flip the eraser and return its new state.
    pub fn toggle_eraser(&mut self) -> bool {
        self.brush.toggle_eraser()
    }

    // ---- strokes ------------------------------------------------------------

    /// Idle → Drawing. Paints the tap dot at the pointer.
    pub fn begin_stroke(&mut self, pointer: &Pointer) {
        if !self.open {
            return;
        }
        let brush = self.brush;
        let color = self.mask_color;
        let Some(surfaces) = self.surfaces.as_mut() else {
            return;
        };
        let (w, h) = surfaces.dimensions();
        let Some(pos) = map_to_canvas(pointer, w, h) else {
            return;
        };
        let touched = brush::stamp_dot(
            &mut surfaces.mask,
            pos,
            brush.size as f32,
            color,
            brush.composite_op(),
        );
        self.stroke = StrokeState::Drawing { last: pos };
        self.note_touched(touched);
    }

    /// Drawing → Drawing. Connects the previous point to the pointer.
    /// Ignored while idle.
    pub fn continue_stroke(&mut self, pointer: &Pointer) {
        let StrokeState::Drawing { last } = self.stroke else {
            return;
        };
        let brush = self.brush;
        let color = self.mask_color;
        let Some(surfaces) = self.surfaces.as_mut() else {
            self.stroke = StrokeState::Idle;
            return;
        };
        let (w, h) = surfaces.dimensions();
        let Some(pos) = map_to_canvas(pointer, w, h) else {
            return;
        };
        let touched = brush::stroke_segment(
            &mut surfaces.mask,
            last,
            pos,
            brush.size as f32,
            color,
            brush.composite_op(),
        );
        self.stroke = StrokeState::Drawing { last: pos };
        self.note_touched(touched);
    }

    /// Drawing → Idle on pointer-up or pointer-leave.
    pub fn end_stroke(&mut self) {
        self.stroke = StrokeState::Idle;
    }

    // ---- reset / export -----------------------------------------------------

    /// Throw away all strokes and restore the mode's initial mask.
    pub fn reset_mask(&mut self) {
        if self.base_image.is_none() {
            return;
        }
        log_info!("[{}] mask reset", self.session_id);
        self.rerender();
    }

    /// Snapshot both surfaces into `form`, show the thumbnail, and close.
    /// Without a base image nothing is written and an error is reported.
    pub fn apply_and_export(&mut self, form: &mut HostForm) -> Result<ExportedPair, EditorError> {
        if self.base_image.is_none() {
            let e = EditorError::NoBaseImage;
            self.status = Some(StatusMessage::error(e.user_message()));
            return Err(e);
        }
        if self.surfaces.is_none() {
            self.rerender();
        }
        let Some(surfaces) = self.surfaces.as_ref() else {
            return Err(EditorError::NoBaseImage);
        };
        let pair = match ExportedPair::from_surfaces(surfaces) {
            Ok(pair) => pair,
            Err(e) => {
                log_err!("[{}] export failed: {}", self.session_id, e);
                self.status = Some(StatusMessage::error(e.user_message()));
                return Err(e);
            }
        };
        form.write_export(&pair, self.mode);
        log_info!(
            "[{}] exported {}x{} {} mask",
            self.session_id,
            pair.width,
            pair.height,
            self.mode.as_str()
        );
        self.status = Some(StatusMessage::info(t!(
            "status.exported",
            width = pair.width,
            height = pair.height
        )));
        self.close_editor();
        Ok(pair)
    }

    /// Bump the revision only when a segment actually landed on the surface.
    fn note_touched(&mut self, touched: Option<DirtyRect>) {
        if touched.is_some() {
            self.revision += 1;
        }
    }

    /// Re-derive both surfaces from the base image, mode and scale.
    /// Destroys any strokes on the mask.
    fn rerender(&mut self) {
        self.stroke = StrokeState::Idle;
        let Some(image) = self.base_image.as_ref() else {
            self.surfaces = None;
            return;
        };
        self.surfaces = Some(canvas::render(image, self.mode, self.scale, self.mask_color));
        self.revision += 1;
    }
}
