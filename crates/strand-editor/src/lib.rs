//! OpenStrand editor engine.
//!
//! The [`Controller`] owns the current canvas snapshot and turns gestures
//! and commands into new snapshots. Around it sit the undo history, the
//! derived layer-state view, project persistence and the auto-save task.

pub mod autosave;
pub mod commands;
pub mod config;
pub mod controller;
pub mod history;
pub mod input;
pub mod layer_state;
pub mod persist;
pub mod session;
pub mod shortcuts;

pub use autosave::{AutoSaveHandle, spawn_autosave};
pub use commands::EditorCommand;
pub use config::EditorConfig;
pub use controller::{Controller, Gesture, Mode};
pub use history::{UndoHistory, UndoState};
pub use input::GestureEvent;
pub use layer_state::{LayerState, LayerStateService};
pub use persist::{
    AUTOSAVE_KEY, FileStore, KeyValueStore, MemoryStore, PersistError, ProjectStore,
};
pub use session::EditorSession;
pub use shortcuts::{ShortcutAction, ShortcutMap};
