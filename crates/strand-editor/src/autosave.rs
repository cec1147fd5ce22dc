//! Periodic auto-save.
//!
//! A background task watches the controller's snapshot channel and writes
//! the latest canvas to the auto-save slot once per period. Dropping the
//! [`AutoSaveHandle`] stops the task; an interrupted write leaves the
//! previous slot value in place because back-ends write atomically.

use crate::persist::{KeyValueStore, auto_save};
use std::sync::Arc;
use std::time::Duration;
use strand_core::CanvasState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct AutoSaveHandle {
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AutoSaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the auto-save loop. The first save happens one `period` after
/// the call. The loop ends by itself once the controller is dropped.
pub fn spawn_autosave<S>(
    mut rx: watch::Receiver<Arc<CanvasState>>,
    store: Arc<S>,
    period: Duration,
) -> AutoSaveHandle
where
    S: KeyValueStore + 'static,
{
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if rx.has_changed().is_err() {
                log::debug!("canvas channel closed, auto-save stopping");
                break;
            }
            let snapshot = Arc::clone(&rx.borrow_and_update());
            match auto_save(store.as_ref(), &snapshot).await {
                Ok(()) => log::debug!("auto-saved {} strands", snapshot.strands().len()),
                Err(e) => log::warn!("auto-save failed: {e}"),
            }
        }
    });
    AutoSaveHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::controller::{Controller, Mode};
    use crate::input::GestureEvent;
    use crate::persist::{AUTOSAVE_KEY, MemoryStore, load_auto_save};
    use kurbo::Point;
    use pretty_assertions::assert_eq;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test(start_paused = true)]
    async fn saves_once_per_period() {
        init_logs();
        let config = EditorConfig::default();
        let mut controller = Controller::new(config.clone());
        let store = Arc::new(MemoryStore::new());
        let _handle = spawn_autosave(controller.subscribe(), Arc::clone(&store), config.autosave_period());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.get(AUTOSAVE_KEY).await.unwrap(), None);

        controller.set_mode(Mode::Attach);
        for event in GestureEvent::pan(Point::new(0.0, 0.0), Point::new(80.0, 0.0)) {
            controller.handle(event);
        }
        tokio::time::sleep(Duration::from_secs(21)).await;
        let saved = load_auto_save(store.as_ref()).await.unwrap().unwrap();
        assert_eq!(saved, **controller.canvas());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_loop() {
        init_logs();
        let controller = Controller::new(EditorConfig::default());
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_autosave(controller.subscribe(), Arc::clone(&store), Duration::from_secs(30));
        handle.stop();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.get(AUTOSAVE_KEY).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ends_when_the_controller_goes_away() {
        let controller = Controller::new(EditorConfig::default());
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_autosave(controller.subscribe(), store, Duration::from_secs(30));
        drop(controller);

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
    }
}
