//! Editor session: controller + project files + auto-save slot.
//!
//! Every I/O operation reports a plain success flag. On failure the
//! in-memory canvas is left untouched and one user-facing message is kept
//! until the host takes it.

use crate::autosave::{AutoSaveHandle, spawn_autosave};
use crate::config::EditorConfig;
use crate::controller::Controller;
use crate::persist::{self, FileStore, KeyValueStore, ProjectStore};
use std::sync::Arc;
use strand_render::{export_svg, export_svg_cropped};

pub struct EditorSession<S: KeyValueStore + 'static = FileStore> {
    controller: Controller,
    projects: ProjectStore,
    slot: Arc<S>,
    autosave: Option<AutoSaveHandle>,
    message: Option<String>,
}

impl<S: KeyValueStore + 'static> EditorSession<S> {
    pub fn new(config: EditorConfig, projects: ProjectStore, slot: Arc<S>) -> Self {
        Self {
            controller: Controller::new(config),
            projects,
            slot,
            autosave: None,
            message: None,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn projects(&self) -> &ProjectStore {
        &self.projects
    }

    /// Last failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    fn fail(&mut self, message: String) -> bool {
        log::warn!("{message}");
        self.message = Some(message);
        false
    }

    pub async fn initialize(&mut self) -> bool {
        match self.projects.initialize().await {
            Ok(()) => true,
            Err(e) => self.fail(format!("Could not prepare the projects folder: {e}")),
        }
    }

    // ─── Named projects ─────────────────────────────────────────────────

    pub async fn save(&mut self, name: &str) -> bool {
        let snapshot = Arc::clone(self.controller.canvas());
        match self.projects.save(name, &snapshot).await {
            Ok(_) => true,
            Err(e) => self.fail(format!("Could not save \"{name}\": {e}")),
        }
    }

    pub async fn load(&mut self, name: &str) -> bool {
        match self.projects.load(name).await {
            Ok(canvas) => {
                self.controller.replace_canvas(canvas);
                log::info!("loaded project {name:?}");
                true
            }
            Err(e) => self.fail(format!("Could not open \"{name}\": {e}")),
        }
    }

    pub async fn list_projects(&mut self) -> Vec<String> {
        match self.projects.list().await {
            Ok(names) => names,
            Err(e) => {
                self.fail(format!("Could not list projects: {e}"));
                Vec::new()
            }
        }
    }

    pub async fn delete_project(&mut self, name: &str) -> bool {
        match self.projects.delete(name).await {
            Ok(()) => true,
            Err(e) => self.fail(format!("Could not delete \"{name}\": {e}")),
        }
    }

    pub async fn rename_project(&mut self, old: &str, new: &str) -> bool {
        match self.projects.rename(old, new).await {
            Ok(()) => true,
            Err(e) => self.fail(format!("Could not rename \"{old}\": {e}")),
        }
    }

    // ─── Export / import ────────────────────────────────────────────────

    /// Canvas-sized SVG under `exports/`.
    pub async fn export_svg(&mut self, name: &str, width: f64, height: f64) -> bool {
        let export = export_svg(self.controller.canvas(), width, height);
        self.write_svg(name, &export.svg).await
    }

    /// SVG cropped to the drawing with padding.
    pub async fn export_svg_cropped(&mut self, name: &str) -> bool {
        let export = export_svg_cropped(self.controller.canvas());
        self.write_svg(name, &export.svg).await
    }

    async fn write_svg(&mut self, name: &str, svg: &str) -> bool {
        match self.projects.save_svg(name, svg).await {
            Ok(_) => true,
            Err(e) => self.fail(format!("Could not export \"{name}\": {e}")),
        }
    }

    pub fn export_json(&mut self) -> Option<String> {
        match persist::export_json(self.controller.canvas()) {
            Ok(json) => Some(json),
            Err(e) => {
                self.fail(format!("Could not serialize the canvas: {e}"));
                None
            }
        }
    }

    pub fn import_json(&mut self, json: &str) -> bool {
        match persist::import_json(json) {
            Some(canvas) => {
                self.controller.replace_canvas(canvas);
                true
            }
            None => self.fail("The file is not a valid OpenStrand project".to_string()),
        }
    }

    // ─── Auto-save ──────────────────────────────────────────────────────

    /// Start the periodic task. Must be called inside a tokio runtime.
    pub fn start_autosave(&mut self) {
        let period = self.controller.config().autosave_period();
        self.autosave = Some(spawn_autosave(
            self.controller.subscribe(),
            Arc::clone(&self.slot),
            period,
        ));
    }

    pub fn stop_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.stop();
        }
    }

    pub fn is_autosaving(&self) -> bool {
        self.autosave.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn auto_save_now(&mut self) -> bool {
        let snapshot = Arc::clone(self.controller.canvas());
        match persist::auto_save(self.slot.as_ref(), &snapshot).await {
            Ok(()) => true,
            Err(e) => self.fail(format!("Auto-save failed: {e}")),
        }
    }

    /// Reload the auto-saved canvas. `false` when there is none.
    pub async fn restore_auto_save(&mut self) -> bool {
        match persist::load_auto_save(self.slot.as_ref()).await {
            Ok(Some(canvas)) => {
                self.controller.replace_canvas(canvas);
                true
            }
            Ok(None) => false,
            Err(e) => self.fail(format!("Could not read the auto-save: {e}")),
        }
    }

    pub async fn clear_auto_save(&mut self) -> bool {
        match persist::clear_auto_save(self.slot.as_ref()).await {
            Ok(()) => true,
            Err(e) => self.fail(format!("Could not clear the auto-save: {e}")),
        }
    }
}
