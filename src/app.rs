use crate::canvas::{self, EditMode};
use crate::editor::{MaskEditor, Pointer, ScreenRect, StatusKind, StatusMessage};
use crate::form::{GenerationMode, HostForm};
use crate::io::{self, DecodeJob, IMAGE_EXTENSIONS};
use crate::settings::EditorSettings;
use image::RgbaImage;

// ============================================================================
// TEXTURE CACHE — re-upload only when the source pixels changed
// ============================================================================

struct CachedTexture {
    handle: egui::TextureHandle,
    key: u64,
}

impl CachedTexture {
    fn sync(
        slot: &mut Option<CachedTexture>,
        ctx: &egui::Context,
        name: &str,
        key: u64,
        image: impl FnOnce() -> RgbaImage,
    ) {
        if slot.as_ref().is_some_and(|t| t.key == key) {
            return;
        }
        let color = rgba_to_color_image(&image());
        match slot {
            Some(tex) => {
                tex.handle.set(color, egui::TextureOptions::LINEAR);
                tex.key = key;
            }
            None => {
                *slot = Some(CachedTexture {
                    handle: ctx.load_texture(name, color, egui::TextureOptions::LINEAR),
                    key,
                });
            }
        }
    }
}

fn rgba_to_color_image(image: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [image.width() as usize, image.height() as usize],
        image.as_raw(),
    )
}

fn status_colors(kind: StatusKind) -> (egui::Color32, egui::Color32) {
    match kind {
        StatusKind::Info => (
            egui::Color32::from_rgb(224, 242, 254),
            egui::Color32::from_rgb(12, 74, 110),
        ),
        StatusKind::Error => (
            egui::Color32::from_rgb(254, 226, 226),
            egui::Color32::from_rgb(153, 27, 27),
        ),
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct MaskFEApp {
    settings: EditorSettings,
    editor: MaskEditor,
    form: HostForm,
    /// Background decode of the picked base file, if one is running.
    pending_decode: Option<DecodeJob>,
    /// Outcome of the last submit attempt.
    form_status: Option<StatusMessage>,
    /// Text of the outpaint scale field; committed on focus loss / Enter.
    scale_text: String,
    canvas_texture: Option<CachedTexture>,
    preview_texture: Option<CachedTexture>,
    preview_key: u64,
}

impl MaskFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = EditorSettings::load();
        let editor = MaskEditor::new(&settings);
        let scale_text = format!("{}", editor.scale());
        Self {
            settings,
            editor,
            form: HostForm::new(GenerationMode::InpaintOutpaint),
            pending_decode: None,
            form_status: None,
            scale_text,
            canvas_texture: None,
            preview_texture: None,
            preview_key: 0,
        }
    }

    // --- Base image field --------------------------------------------------

    fn pick_base_image(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Images", IMAGE_EXTENSIONS);
        if let Some(dir) = &self.settings.last_open_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };
        if let Some(parent) = path.parent() {
            self.settings.last_open_dir = Some(parent.to_path_buf());
            self.settings.save();
        }
        // A new file invalidates whatever was applied for the old one
        self.form.clear_edit_data();
        log_info!("decoding {}", path.display());
        self.pending_decode = Some(DecodeJob::spawn(path));
    }

    fn pick_mask_file(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Images", IMAGE_EXTENSIONS);
        if let Some(dir) = &self.settings.last_open_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };
        match std::fs::read(&path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "mask.png".to_string());
                log_info!("mask file attached: {}", path.display());
                self.form.attach_mask_file(name, bytes);
                self.form_status = None;
            }
            Err(e) => {
                let e = crate::error::EditorError::from(e);
                log_warn!("mask file read failed: {}", e);
                self.form_status = Some(StatusMessage::error(e.user_message()));
            }
        }
    }

    fn clear_base_image(&mut self) {
        self.pending_decode = None;
        self.form.clear_edit_data();
        self.editor.clear_base_image();
    }

    fn poll_decode(&mut self, ctx: &egui::Context) {
        let Some(job) = &self.pending_decode else {
            return;
        };
        match job.try_finish() {
            Some(done) => {
                self.pending_decode = None;
                if self.editor.accept_decoded(done.result).is_ok() {
                    self.scale_text = format!("{}", self.editor.scale());
                }
            }
            None => ctx.request_repaint(),
        }
    }

    // --- Panels --------------------------------------------------------------

    fn show_status_banner(ui: &mut egui::Ui, status: &StatusMessage) -> bool {
        let (fill, text) = status_colors(status.kind);
        let mut dismissed = false;
        egui::Frame::none()
            .fill(fill)
            .rounding(4.0)
            .inner_margin(egui::Margin::symmetric(10.0, 6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(text, status.text.as_str());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button(t!("status.dismiss")).clicked() {
                            dismissed = true;
                        }
                    });
                });
            });
        dismissed
    }

    fn show_form(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.heading(t!("app.title"));
        ui.add_space(8.0);

        // Generation mode
        let mut mode = self.form.mode;
        egui::ComboBox::from_label(t!("form.generation_mode"))
            .selected_text(mode.label())
            .show_ui(ui, |ui| {
                for m in GenerationMode::all() {
                    ui.selectable_value(&mut mode, *m, m.label());
                }
            });
        if mode != self.form.mode {
            self.form.set_generation_mode(mode);
            self.form_status = None;
        }
        ui.add_space(8.0);

        if self.form.mode == GenerationMode::InpaintOutpaint {
            ui.separator();
            ui.label(t!("form.base_image"));
            ui.horizontal(|ui| {
                if ui.button(t!("form.choose_file")).clicked() {
                    self.pick_base_image();
                }
                if let Some(meta) = self.editor.base_image().map(|img| img.file_meta()) {
                    ui.label(meta);
                    if ui.button(t!("form.clear")).clicked() {
                        self.clear_base_image();
                    }
                }
                if self.pending_decode.is_some() {
                    ui.spinner();
                    ui.label(t!("app.loading"));
                }
            });

            let can_open = self.editor.has_base_image() && self.pending_decode.is_none();
            if ui
                .add_enabled(can_open, egui::Button::new(t!("form.open_editor")))
                .clicked()
            {
                let _ = self.editor.open_editor();
            }

            ui.add_space(8.0);
            ui.label(t!("form.mask"));
            self.show_mask_preview(&ctx, ui);
            ui.horizontal(|ui| {
                if ui.button(t!("form.choose_mask")).clicked() {
                    self.pick_mask_file();
                }
                if let Some(upload) = &self.form.edit_mask_image {
                    ui.label(t!("form.mask_file", name = upload.name));
                }
            });

            ui.add_space(8.0);
            ui.label(t!("form.instruction"));
            ui.add(
                egui::TextEdit::multiline(&mut self.form.edit_instruction)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
        }

        ui.add_space(12.0);
        if ui.button(self.form.mode.submit_label()).clicked() {
            self.submit();
        }
    }

    fn show_mask_preview(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(preview) = self.form.mask_preview.clone() else {
            self.preview_texture = None;
            ui.weak(t!("form.no_mask"));
            return;
        };
        let key = self.preview_key;
        if !self.preview_texture.as_ref().is_some_and(|t| t.key == key) {
            match io::decode_data_url(&preview.data_url, "mask") {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    CachedTexture::sync(&mut self.preview_texture, ctx, "mask_preview", key, || rgba);
                }
                Err(e) => {
                    log_warn!("mask preview decode failed: {}", e);
                    return;
                }
            }
        }
        if let Some(tex) = &self.preview_texture {
            let max = egui::vec2(240.0, 240.0);
            let size = egui::vec2(preview.width as f32, preview.height as f32);
            let fit = (max.x / size.x).min(max.y / size.y).min(1.0);
            let (rect, _) = ui.allocate_exact_size(size * fit, egui::Sense::hover());
            ui.painter().rect_filled(rect, 0.0, egui::Color32::WHITE);
            ui.painter().image(
                tex.handle.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
            ui.weak(format!(
                "{} ({}×{})",
                self.form.mask_meta, preview.width, preview.height
            ));
        }
    }

    fn submit(&mut self) {
        if self.form.mode != GenerationMode::InpaintOutpaint {
            self.form_status = Some(StatusMessage::info(t!("form.ready")));
            return;
        }
        self.form_status = Some(match self.form.preflight() {
            Ok(sub) => {
                log_info!(
                    "edit request ready: {} {}x{}",
                    sub.edit_mode.as_str(),
                    sub.mask.width(),
                    sub.mask.height()
                );
                StatusMessage::info(t!("form.ready"))
            }
            Err(e) => {
                log_warn!("edit request rejected: {}", e);
                StatusMessage::error(e.user_message())
            }
        });
    }

    // --- Editor window -------------------------------------------------------

    fn show_editor_window(&mut self, ctx: &egui::Context) {
        if !self.editor.is_open() {
            return;
        }
        let mut open = true;
        let mut apply = false;
        egui::Window::new(t!("editor.title"))
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_size([720.0, 560.0])
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                self.show_editor_controls(ui);
                ui.separator();
                self.show_canvas(ui);
                ui.separator();
                ui.horizontal(|ui| {
                    ui.weak(t!("editor.hint"));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button(t!("editor.apply")).clicked() {
                            apply = true;
                        }
                        if ui.button(t!("editor.cancel")).clicked() {
                            self.editor.close_editor();
                        }
                    });
                });
            });
        if !open {
            self.editor.close_editor();
        }
        if apply && self.editor.apply_and_export(&mut self.form).is_ok() {
            self.preview_key += 1;
            self.form_status = None;
        }
    }

    fn show_editor_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for mode in EditMode::all() {
                if ui
                    .selectable_label(self.editor.mode() == *mode, mode.label())
                    .clicked()
                {
                    self.editor.set_edit_mode(*mode);
                }
            }

            if self.editor.shows_outpaint_controls() {
                ui.separator();
                ui.label(t!("editor.scale"));
                let resp =
                    ui.add(egui::TextEdit::singleline(&mut self.scale_text).desired_width(48.0));
                if resp.lost_focus() {
                    self.editor.set_scale(&self.scale_text);
                    self.scale_text = format!("{}", self.editor.scale());
                }
            }

            ui.separator();
            ui.label(t!("editor.brush_size"));
            let mut size = self.editor.brush().size;
            let max = self.settings.max_brush_size.max(1);
            if ui.add(egui::Slider::new(&mut size, 1..=max)).changed() {
                self.editor.set_brush_size(size);
            }

            let erasing = self.editor.brush().erasing;
            if ui.selectable_label(erasing, t!("editor.eraser")).clicked() {
                self.editor.toggle_eraser();
            }
            if ui.button(t!("editor.reset")).clicked() {
                self.editor.reset_mask();
            }
        });
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let revision = self.editor.revision();
        let Some(surfaces) = self.editor.surfaces() else {
            return;
        };
        let (w, h) = surfaces.dimensions();
        CachedTexture::sync(&mut self.canvas_texture, &ctx, "mask_canvas", revision, || {
            canvas::composite_overlay(surfaces)
        });
        let Some(tex) = &self.canvas_texture else {
            return;
        };

        let avail = ui.available_size() - egui::vec2(0.0, 40.0);
        let fit = (avail.x / w as f32).min(avail.y / h as f32).clamp(0.05, 1.0);
        let size = egui::vec2(w as f32 * fit, h as f32 * fit);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        ui.painter().image(
            tex.handle.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        if response.hovered() {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        let bounds = ScreenRect::new(rect.left(), rect.top(), rect.width(), rect.height());
        let (pressed, down, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else {
            self.editor.end_stroke();
            return;
        };
        let inside = bounds.contains(pos.x, pos.y);
        let pointer = Pointer::new(pos.x, pos.y, bounds);

        if pressed && inside && response.hovered() {
            self.editor.begin_stroke(&pointer);
        } else if self.editor.is_drawing() {
            if down && inside {
                self.editor.continue_stroke(&pointer);
            } else {
                // Pointer up or left the canvas
                self.editor.end_stroke();
            }
        }
    }

    fn show_language_picker(&mut self, ui: &mut egui::Ui) {
        let current = crate::i18n::current_language();
        let current_name = crate::i18n::LANGUAGES
            .iter()
            .find(|(code, _)| *code == current)
            .map(|(_, name)| *name)
            .unwrap_or("English");
        egui::ComboBox::from_id_source("language")
            .selected_text(current_name)
            .show_ui(ui, |ui| {
                for (code, name) in crate::i18n::LANGUAGES {
                    if ui.selectable_label(current == *code, *name).clicked() {
                        crate::i18n::set_language(code);
                        self.settings.language = code.to_string();
                        self.settings.save();
                    }
                }
            });
        ui.label(t!("app.language"));
    }
}

impl eframe::App for MaskFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll the background decode ---
        self.poll_decode(ctx);

        egui::TopBottomPanel::top("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    self.show_language_picker(ui);
                });
            });
            if let Some(status) = self.editor.status().cloned()
                && Self::show_status_banner(ui, &status)
            {
                self.editor.dismiss_status();
            }
            if let Some(status) = self.form_status.clone()
                && Self::show_status_banner(ui, &status)
            {
                self.form_status = None;
            }
        });

        // The editor window is modal: the form underneath is disabled while it is up
        let editor_open = self.editor.is_open();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!editor_open, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.show_form(ui);
                });
            });
        });

        self.show_editor_window(ctx);
    }
}
