//! Vecta
//!
//! A 2D vector graphics engine that turns paths, strokes, glyphs and raster
//! images into draw calls on a fixed-function style GPU device, avoiding
//! redundant state changes and redundant geometry work.
//!
//! # Example
//!
//! ```
//! use vecta::{EngineConfig, RenderEngine};
//! use vecta::types::{Color, Path, Rect};
//! use vecta::gpu::HeadlessDevice;
//!
//! let device = HeadlessDevice::new(64, 64);
//! let mut engine = RenderEngine::new(device, EngineConfig::default()).unwrap();
//! let square = Path::rect(Rect::new(8.0, 8.0, 16.0, 16.0));
//!
//! engine.flush_pending_deletions();
//! engine.set_paint(Color::RED);
//! engine.fill(&square, true, true);
//! assert_eq!(engine.device().count_pixels(|p| p[0] == 255), 256);
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
mod paint;

pub use config::EngineConfig;
pub use context::{ClipEntry, ClipShape, ContextState};
pub use engine::{FlushReport, RenderEngine};
pub use error::{EngineError, Result};

pub use vecta_core as types;
pub use vecta_gpu as gpu;
pub use vecta_text as text;
