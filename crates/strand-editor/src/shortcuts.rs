//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic [`ShortcutAction`]s, which the
//! host turns into [`EditorCommand`]s. On macOS `meta` is ⌘; elsewhere
//! `ctrl` plays the same role.

use crate::commands::EditorCommand;
use crate::controller::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Modes ──
    ModeSelect,
    ModeMove,
    ModeAttach,
    ModeMask,
    ModeRotate,
    ModeAngleAdjust,
    ModeDraw,
    ModePan,

    // ── Edit ──
    Undo,
    Redo,
    DeleteStrand,
    AddLayer,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ResetView,
    ToggleGrid,
    ToggleShadows,
    ToggleControlPoints,
    Deselect,
}

impl ShortcutAction {
    pub fn command(self) -> EditorCommand {
        match self {
            Self::ModeSelect => EditorCommand::SetMode(Mode::Select),
            Self::ModeMove => EditorCommand::SetMode(Mode::Move),
            Self::ModeAttach => EditorCommand::SetMode(Mode::Attach),
            Self::ModeMask => EditorCommand::SetMode(Mode::Mask),
            Self::ModeRotate => EditorCommand::SetMode(Mode::Rotate),
            Self::ModeAngleAdjust => EditorCommand::SetMode(Mode::AngleAdjust),
            Self::ModeDraw => EditorCommand::SetMode(Mode::Draw),
            Self::ModePan => EditorCommand::SetMode(Mode::Pan),
            Self::Undo => EditorCommand::Undo,
            Self::Redo => EditorCommand::Redo,
            Self::DeleteStrand => EditorCommand::DeleteSelectedStrand,
            Self::AddLayer => EditorCommand::AddLayer,
            Self::ZoomIn => EditorCommand::ZoomIn,
            Self::ZoomOut => EditorCommand::ZoomOut,
            Self::ResetView => EditorCommand::ResetView,
            Self::ToggleGrid => EditorCommand::ToggleGrid,
            Self::ToggleShadows => EditorCommand::ToggleShadows,
            Self::ToggleControlPoints => EditorCommand::ToggleControlPoints,
            Self::Deselect => EditorCommand::DeselectAll,
        }
    }
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the logical key name (e.g. `"z"`, `"Delete"`). Returns
    /// `None` if the combo has no binding.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        _alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                "n" | "N" => Some(ShortcutAction::AddLayer),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ResetView),
                "'" => Some(ShortcutAction::ToggleGrid),
                _ => None,
            };
        }

        if shift {
            return match key {
                "s" | "S" => Some(ShortcutAction::ToggleShadows),
                "c" | "C" => Some(ShortcutAction::ToggleControlPoints),
                _ => None,
            };
        }

        match key {
            "v" | "V" => Some(ShortcutAction::ModeSelect),
            "m" | "M" => Some(ShortcutAction::ModeMove),
            "a" | "A" => Some(ShortcutAction::ModeAttach),
            "k" | "K" => Some(ShortcutAction::ModeMask),
            "r" | "R" => Some(ShortcutAction::ModeRotate),
            "e" | "E" => Some(ShortcutAction::ModeAngleAdjust),
            "d" | "D" => Some(ShortcutAction::ModeDraw),
            "h" | "H" | " " => Some(ShortcutAction::ModePan),
            "g" | "G" => Some(ShortcutAction::ToggleGrid),
            "Delete" | "Backspace" => Some(ShortcutAction::DeleteStrand),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }
}
