use image::{Rgba, RgbaImage};
use maskfe::canvas::is_masked;
use maskfe::io::{decode_data_url, encode_png};
use maskfe::{
    EditMode, EditorError, GenerationMode, HostForm, MaskEditor, Pointer, ScreenRect, StatusKind,
};

fn photo(w: u32, h: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 7) as u8, (y * 11) as u8, 90, 255]));
    encode_png(&img).unwrap()
}

fn canvas_pointer(editor: &MaskEditor, x: f32, y: f32) -> Pointer {
    let (w, h) = editor.surfaces().unwrap().dimensions();
    Pointer::at_canvas(x, y, w, h)
}

#[test]
fn inpaint_session_end_to_end() {
    let mut editor = MaskEditor::default();
    editor.load_base_image(&photo(64, 48), "photo.png").unwrap();
    assert!(editor.is_open());

    editor.set_brush_size(10);
    editor.begin_stroke(&canvas_pointer(&editor, 8.0, 8.0));
    editor.continue_stroke(&canvas_pointer(&editor, 40.0, 30.0));
    editor.end_stroke();

    let mut form = HostForm::new(GenerationMode::InpaintOutpaint);
    let pair = editor.apply_and_export(&mut form).unwrap();
    assert!(!editor.is_open());
    assert_eq!((pair.width, pair.height), (64, 48));
    assert_eq!(editor.status().unwrap().kind, StatusKind::Info);

    let submission = form.preflight().unwrap();
    assert_eq!(submission.edit_mode, EditMode::Inpaint);
    assert_eq!(submission.mask.dimensions(), (64, 48));
    // Painted red reads as luma 76, untouched pixels as 0
    assert_eq!(submission.mask.get_pixel(24, 19).0, [76]);
    assert_eq!(submission.mask.get_pixel(60, 2).0, [0]);
    // Base is the photo itself in inpaint mode
    assert_eq!(submission.base.get_pixel(3, 2).0, [21, 22, 90]);
}

#[test]
fn outpaint_session_end_to_end() {
    let mut editor = MaskEditor::default();
    editor.set_edit_mode(EditMode::Outpaint);
    editor.set_scale("1.5");
    editor.load_base_image(&photo(40, 20), "wide.png").unwrap();

    let layout = editor.layout().unwrap();
    assert_eq!((layout.width, layout.height), (60, 30));
    assert_eq!((layout.offset_x, layout.offset_y), (10, 5));

    // Erase part of the border so that strip is kept
    editor.toggle_eraser();
    editor.begin_stroke(&canvas_pointer(&editor, 2.0, 2.0));
    editor.end_stroke();

    let mut form = HostForm::new(GenerationMode::InpaintOutpaint);
    let pair = editor.apply_and_export(&mut form).unwrap();
    let mask = decode_data_url(&pair.mask_data_url, "mask").unwrap().to_rgba8();
    let base = decode_data_url(&pair.base_data_url, "base").unwrap().to_rgba8();
    assert_eq!(mask.dimensions(), (60, 30));
    assert_eq!(base.dimensions(), (60, 30));

    assert!(!is_masked(mask.get_pixel(2, 2)));
    assert!(is_masked(mask.get_pixel(59, 29)));
    assert!(!is_masked(mask.get_pixel(30, 15)));
    // Border of the base is white, the image sits at the offset
    assert_eq!(base.get_pixel(0, 0).0, [255, 255, 255, 255]);
    assert_eq!(base.get_pixel(10, 5).0, [0, 0, 90, 255]);

    let fields = form.form_fields();
    assert!(fields.contains(&("edit_mode", "outpaint".to_string())));
}

#[test]
fn display_scaled_pointer_lands_on_canvas_pixels() {
    let mut editor = MaskEditor::default();
    editor.load_base_image(&photo(200, 100), "big.png").unwrap();
    editor.set_brush_size(2);
    // Canvas displayed at 2x on screen
    let bounds = ScreenRect::new(50.0, 50.0, 400.0, 200.0);
    editor.begin_stroke(&Pointer::new(250.0, 150.0, bounds));
    editor.end_stroke();
    let mask = &editor.surfaces().unwrap().mask;
    assert!(is_masked(mask.get_pixel(100, 50)));
    assert!(!is_masked(mask.get_pixel(200 - 1, 100 - 1)));
}

#[test]
fn broken_upload_keeps_session_usable() {
    let mut editor = MaskEditor::default();
    let err = editor.load_base_image(b"GIF89a-truncated", "broken.gif").unwrap_err();
    assert!(matches!(err, EditorError::ImageDecode(_)));
    assert!(!editor.has_base_image());

    let mut form = HostForm::new(GenerationMode::InpaintOutpaint);
    assert!(matches!(
        editor.apply_and_export(&mut form),
        Err(EditorError::NoBaseImage)
    ));
    assert!(matches!(form.preflight(), Err(EditorError::MissingMask)));

    editor.load_base_image(&photo(8, 8), "ok.png").unwrap();
    assert!(editor.apply_and_export(&mut form).is_ok());
    assert!(form.preflight().is_ok());
}

#[test]
fn new_base_file_invalidates_applied_mask() {
    let mut editor = MaskEditor::default();
    let mut form = HostForm::new(GenerationMode::InpaintOutpaint);
    editor.load_base_image(&photo(16, 16), "a.png").unwrap();
    editor.apply_and_export(&mut form).unwrap();
    assert!(form.has_mask());

    form.clear_edit_data();
    editor.load_base_image(&photo(32, 8), "b.png").unwrap();
    assert!(!form.has_mask());
    assert!(form.mask_preview.is_none());
    assert_eq!(editor.surfaces().unwrap().dimensions(), (32, 8));
}
