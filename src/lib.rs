//! MaskFE: inpaint/outpaint mask editor.
//!
//! The library holds the editor state machine, rendering, codecs and host
//! form handling; `main.rs` wires them to the eframe front end and the CLI.

#[macro_use]
pub mod i18n;
#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod editor;
pub mod error;
pub mod form;
pub mod io;
pub mod ops;
pub mod settings;

pub use canvas::{BaseImage, CanvasLayout, EditMode, Surfaces};
pub use editor::{MaskEditor, Pointer, ScreenRect, StatusKind, StatusMessage, StrokeState};
pub use error::EditorError;
pub use form::{GenerationMode, HostForm};
pub use io::ExportedPair;
