// GUI-subsystem binary: no console window is ever allocated by Windows.
// • GUI mode: nothing extra needed — no console to free.
// • CLI mode (--input/-i flag present): AttachConsole(ATTACH_PARENT_PROCESS) attaches to
//   the launching terminal so println!/eprintln! reach it.
#![windows_subsystem = "windows"]

use maskfe::app::MaskFEApp;
use maskfe::cli;
use maskfe::settings::EditorSettings;
use maskfe::{i18n, logger};

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        unsafe extern "system" {
            fn AttachConsole(dwProcessId: u32) -> i32;
        }
        const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
        unsafe {
            AttachConsole(ATTACH_PARENT_PROCESS);
        }
    }

    // Initialize session log (overwrites previous session log)
    logger::init();

    // Translations first so error messages resolve in both modes
    let settings = EditorSettings::load();
    i18n::init();
    i18n::set_language(&settings.effective_language());

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("MaskFE"),
        ..Default::default()
    };

    eframe::run_native(
        "MaskFE",
        options,
        Box::new(|cc| Box::new(MaskFEApp::new(cc))),
    )
}
