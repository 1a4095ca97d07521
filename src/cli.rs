// ============================================================================
// MaskFE CLI — headless mask authoring via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskfe --input photo.png --stroke "10,10 120,40" --mask-out mask.png
//   maskfe -i photo.png --mode outpaint --scale 1.5 --fields-json fields.json
//   maskfe -i photo.png --brush 60 --stroke "50,50" --erase "52,52" --base-out base.png
//
// Stroke coordinates are canvas pixels (the canvas is the outpaint-enlarged
// one when --mode outpaint is given). All --stroke paths are painted first,
// then all --erase paths, each in the order given.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::EditMode;
use crate::editor::{MaskEditor, Pointer};
use crate::form::{GenerationMode, HostForm};
use crate::io::write_png;
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskFE headless mask editor.
#[derive(Parser, Debug)]
#[command(
    name = "maskfe",
    about = "MaskFE headless inpaint/outpaint mask editor",
    long_about = "Load a base image, replay brush strokes onto the mask and export the\n\
                  mask/base PNG pair or the form fields an edit request submits.\n\n\
                  Example:\n  \
                  maskfe --input photo.png --stroke \"10,10 120,40\" --mask-out mask.png\n  \
                  maskfe -i photo.png --mode outpaint --scale 1.5 --fields-json -"
)]
pub struct CliArgs {
    /// Base image file (PNG, JPEG, WEBP, BMP, GIF).
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Edit mode.
    #[arg(short, long, value_enum, default_value_t = EditMode::Inpaint)]
    pub mode: EditMode,

    /// Outpaint canvas scale (values below 1 are raised to 1).
    #[arg(short, long, value_name = "FACTOR")]
    pub scale: Option<String>,

    /// Brush diameter in canvas pixels.
    #[arg(short, long, value_name = "PX")]
    pub brush: Option<u32>,

    /// Paint a stroke through the given points, e.g. "10,10 40,12 80,30".
    /// A single point paints a dot. Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub stroke: Vec<String>,

    /// Erase along the given points. Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub erase: Vec<String>,

    /// Edit instruction submitted with --fields-json.
    #[arg(long, value_name = "TEXT")]
    pub instruction: Option<String>,

    /// Write the mask surface as PNG.
    #[arg(long, value_name = "FILE")]
    pub mask_out: Option<PathBuf>,

    /// Write the composited base surface as PNG.
    #[arg(long, value_name = "FILE")]
    pub base_out: Option<PathBuf>,

    /// Write the submitted form fields as JSON ("-" for stdout).
    #[arg(long, value_name = "FILE")]
    pub fields_json: Option<PathBuf>,

    /// Print per-step information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the headless pipeline and return an OS exit code.
/// `0` = success, `1` = any step failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.mask_out.is_none() && args.base_out.is_none() && args.fields_json.is_none() {
        eprintln!("error: nothing to write. Pass --mask-out, --base-out or --fields-json.");
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    match run_inner(&args) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "done ({:.0}ms)",
                    start.elapsed().as_secs_f64() * 1000.0
                );
                if let Some(log) = crate::logger::log_path() {
                    println!("log: {}", log.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("cli: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

fn run_inner(args: &CliArgs) -> Result<(), String> {
    let strokes = parse_paths(&args.stroke)?;
    let erases = parse_paths(&args.erase)?;

    let settings = EditorSettings::load();
    let mut editor = MaskEditor::new(&settings);
    editor.set_edit_mode(args.mode);
    if let Some(scale) = &args.scale {
        editor.set_scale(scale);
    }
    if let Some(size) = args.brush {
        editor.set_brush_size(size);
    }

    // -- Step 1: Load ----------------------------------------------------
    editor
        .load_base_image_file(&args.input)
        .map_err(|e| format!("load failed: {}", e))?;

    let Some(layout) = editor.layout() else {
        return Err("editor has no canvas after load".to_string());
    };
    if args.verbose {
        println!(
            "{}: {}x{} image on {}x{} {} canvas, brush {}px",
            args.input.display(),
            layout.image_width,
            layout.image_height,
            layout.width,
            layout.height,
            editor.mode().as_str(),
            editor.brush().size
        );
    }

    // -- Step 2: Replay strokes ------------------------------------------
    replay(&mut editor, &strokes, layout.width, layout.height);
    if !erases.is_empty() {
        editor.toggle_eraser();
        replay(&mut editor, &erases, layout.width, layout.height);
        editor.toggle_eraser();
    }
    if args.verbose {
        println!("  {} stroke(s), {} erase(s)", strokes.len(), erases.len());
    }

    // -- Step 3: Export --------------------------------------------------
    if let Some(surfaces) = editor.surfaces() {
        if let Some(path) = &args.mask_out {
            write_png(&surfaces.mask, path).map_err(|e| format!("mask save failed: {}", e))?;
            report(args.verbose, "mask", path);
        }
        if let Some(path) = &args.base_out {
            write_png(&surfaces.base, path).map_err(|e| format!("base save failed: {}", e))?;
            report(args.verbose, "base", path);
        }
    }

    if let Some(path) = &args.fields_json {
        let mut form = HostForm::new(GenerationMode::InpaintOutpaint);
        if let Some(text) = &args.instruction {
            form.edit_instruction = text.clone();
        }
        editor
            .apply_and_export(&mut form)
            .map_err(|e| format!("export failed: {}", e))?;
        let submission = form
            .preflight()
            .map_err(|e| format!("export failed preflight: {}", e))?;
        if args.verbose {
            let (w, h) = submission.mask.dimensions();
            println!("  preflight ok: {}x{} {}", w, h, submission.edit_mode.as_str());
        }
        let json = serde_json::to_string_pretty(&form.to_json())
            .map_err(|e| format!("json encode failed: {}", e))?;
        if path.as_os_str() == "-" {
            println!("{}", json);
        } else {
            std::fs::write(path, json)
                .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
            report(args.verbose, "fields", path);
        }
    }

    Ok(())
}

/// Feed each path to the editor as begin / continue... / end.
fn replay(editor: &mut MaskEditor, paths: &[Vec<(f32, f32)>], width: u32, height: u32) {
    for path in paths {
        let mut points = path.iter();
        let Some(&(x, y)) = points.next() else {
            continue;
        };
        editor.begin_stroke(&Pointer::at_canvas(x, y, width, height));
        for &(x, y) in points {
            editor.continue_stroke(&Pointer::at_canvas(x, y, width, height));
        }
        editor.end_stroke();
    }
}

fn report(verbose: bool, what: &str, path: &Path) {
    if verbose {
        println!("  {} → {}", what, path.display());
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse every `"x,y x,y ..."` argument into a point list.
fn parse_paths(args: &[String]) -> Result<Vec<Vec<(f32, f32)>>, String> {
    args.iter().map(String::as_str).map(parse_points).collect()
}

/// Parse one whitespace-separated list of `x,y` pairs.
pub fn parse_points(text: &str) -> Result<Vec<(f32, f32)>, String> {
    let points = text
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("point '{}' is not x,y", pair))?;
            let x = x
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("bad x in '{}'", pair))?;
            let y = y
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("bad y in '{}'", pair))?;
            if !x.is_finite() || !y.is_finite() {
                return Err(format!("point '{}' is not finite", pair));
            }
            Ok((x, y))
        })
        .collect::<Result<Vec<_>, String>>()?;
    if points.is_empty() {
        return Err(format!("stroke '{}' has no points", text));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_lists() {
        assert_eq!(
            parse_points("10,20  30.5,4").unwrap(),
            vec![(10.0, 20.0), (30.5, 4.0)]
        );
        assert_eq!(parse_points("7,7").unwrap(), vec![(7.0, 7.0)]);
    }

    #[test]
    fn rejects_bad_points() {
        assert!(parse_points("").is_err());
        assert!(parse_points("10").is_err());
        assert!(parse_points("a,b").is_err());
        assert!(parse_points("1,inf").is_err());
    }

    #[test]
    fn clap_accepts_repeated_strokes() {
        let args = CliArgs::try_parse_from([
            "maskfe",
            "-i",
            "in.png",
            "--mode",
            "outpaint",
            "--stroke",
            "1,1 2,2",
            "--stroke",
            "5,5",
            "--erase",
            "1,1",
            "--mask-out",
            "m.png",
        ])
        .unwrap();
        assert_eq!(args.stroke.len(), 2);
        assert_eq!(args.erase.len(), 1);
        assert_eq!(args.mode, EditMode::Outpaint);
        assert!(args.fields_json.is_none());
        assert!(args.instruction.is_none());
    }

    #[test]
    fn clap_rejects_unknown_modes() {
        let err = CliArgs::try_parse_from(["maskfe", "-i", "in.png", "--mode", "outpiant"]);
        assert!(err.is_err());
        let args = CliArgs::try_parse_from(["maskfe", "-i", "in.png"]).unwrap();
        assert_eq!(args.mode, EditMode::Inpaint);
    }

    #[test]
    fn instruction_flag_is_captured() {
        let args = CliArgs::try_parse_from([
            "maskfe",
            "-i",
            "in.png",
            "--instruction",
            "extend the beach",
            "--fields-json",
            "-",
        ])
        .unwrap();
        assert_eq!(args.instruction.as_deref(), Some("extend the beach"));
    }

    #[test]
    fn replay_paints_and_erases() {
        let bytes = crate::io::encode_png(&image::RgbaImage::from_pixel(
            40,
            40,
            image::Rgba([0, 0, 0, 255]),
        ))
        .unwrap();
        let mut editor = MaskEditor::default();
        editor.load_base_image(&bytes, "cli.png").unwrap();
        editor.set_brush_size(6);
        replay(&mut editor, &[vec![(5.0, 5.0), (35.0, 5.0)]], 40, 40);
        editor.toggle_eraser();
        replay(&mut editor, &[vec![(20.0, 5.0)]], 40, 40);
        let mask = &editor.surfaces().unwrap().mask;
        assert!(mask.get_pixel(10, 5).0[3] > 0);
        assert_eq!(mask.get_pixel(20, 5).0[3], 0);
    }
}
