//! Boundary to the emulation engine that actually runs the game.
//!
//! The controller only talks to engines through [`Engine`] and builds them
//! through an [`EngineFactory`], so emulator cores can be swapped without
//! touching the round loop.

mod headless;

use std::{io, path::Path, path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::state::game::Action;

pub use self::headless::{HeadlessEngine, HeadlessEngineFactory};

/// Failures reported by an emulation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ROM file does not exist.
    #[error("ROM `{}` not found", path.display())]
    RomNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },
    /// The ROM file exists but cannot be used.
    #[error("ROM `{}` is invalid: {reason}", path.display())]
    InvalidRom {
        /// Path of the rejected ROM.
        path: PathBuf,
        /// Human readable explanation.
        reason: String,
    },
    /// Reading the ROM failed.
    #[error("failed to read ROM `{}`", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A saved state could not be produced or applied.
    #[error("engine state rejected: {0}")]
    State(String),
    /// The emulation itself failed.
    #[error("engine fault: {0}")]
    Fault(String),
}

/// Encoded image of the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// MIME type of `bytes`.
    pub content_type: &'static str,
    /// Encoded image payload.
    pub bytes: Vec<u8>,
}

/// Running emulation of a single ROM.
///
/// Engines are driven by exactly one task at a time; implementations do not
/// need internal synchronization.
pub trait Engine: Send {
    /// Press `action` and keep it held for `hold_ticks` engine steps.
    fn apply_action(&mut self, action: Action, hold_ticks: u32) -> Result<(), EngineError>;
    /// Run the emulation forward by `frames` frames.
    fn advance(&mut self, frames: u32, render: bool) -> Result<(), EngineError>;
    /// Image of the last rendered frame.
    fn current_frame(&self) -> Result<Frame, EngineError>;
    /// Serialize the complete internal state.
    fn save_state(&mut self) -> Result<Vec<u8>, EngineError>;
    /// Replace the internal state with a previously saved one.
    fn load_state(&mut self, state: &[u8]) -> Result<(), EngineError>;
}

/// Builds engines for ROM files.
pub trait EngineFactory: Send + Sync {
    /// Construct a fresh engine running the ROM at `rom_path`.
    fn construct(&self, rom_path: &Path) -> Result<Box<dyn Engine>, EngineError>;
}

/// Shared handle to the configured engine factory.
pub type SharedEngineFactory = Arc<dyn EngineFactory>;
