//! Forward editor UI updates over a channel
//!
//! The editor is single-threaded; a UI running on another thread subscribes
//! through an [`UpdateReceiver`] and drains updates at its own pace.

use crossbeam_channel::{Receiver, Sender};
use log::debug;
use scribe_core::kernel::UpdateReason;
use scribe_core::surface::EditingSurface;
use scribe_core::{Editor, UiUpdate};
use std::time::Duration;

/// Receiving end of a UI-update bridge
#[derive(Debug, Clone)]
pub struct UpdateReceiver {
    rx: Receiver<UiUpdate>,
}

/// Subscribe a channel to `editor` and return its receiving end
///
/// Updates sent after the receiver is dropped are discarded.
pub fn attach<S: EditingSurface>(editor: &mut Editor<S>) -> UpdateReceiver {
    let (tx, rx) = crossbeam_channel::unbounded();
    editor.subscribe(forwarder(tx));
    UpdateReceiver { rx }
}

fn forwarder(tx: Sender<UiUpdate>) -> impl FnMut(&UiUpdate) + 'static {
    move |update| {
        if tx.send(update.clone()).is_err() {
            debug!("ui update dropped: receiver is gone");
        }
    }
}

impl UpdateReceiver {
    /// Try to receive one update (non-blocking)
    pub fn try_recv_update(&self) -> Option<UiUpdate> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for an update
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UiUpdate> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drain pending updates, keeping only the newest
    ///
    /// Returns the reasons of every drained update alongside it.
    pub fn latest(&self) -> Option<(Vec<UpdateReason>, UiUpdate)> {
        let mut reasons = Vec::new();
        let mut last = None;
        while let Ok(update) = self.rx.try_recv() {
            reasons.push(update.reason);
            last = Some(update);
        }
        last.map(|update| (reasons, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{
        CommandName, CommandState, CommandValue, Config, ContainerSurface, EnvOptions,
    };
    use std::thread;

    #[test]
    fn test_updates_cross_threads() {
        let mut editor = Editor::new(ContainerSurface::new(), Config::default());
        let receiver = attach(&mut editor);
        let consumer = {
            let receiver = receiver.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(update) = receiver.recv_timeout(Duration::from_secs(2)) {
                    let done = update.reason == UpdateReason::Destroyed;
                    seen.push((update.reason, update.snapshot.state(CommandName::Bold)));
                    if done {
                        break;
                    }
                }
                seen
            })
        };

        editor.start("<p>threads</p>").unwrap();
        editor.select_text(0, 7);
        editor.execute(CommandName::Bold, CommandValue::None, EnvOptions::default());
        editor.destroy();

        let seen = consumer.join().unwrap();
        assert_eq!(seen[0].0, UpdateReason::Started);
        assert!(seen.contains(&(
            UpdateReason::Command(CommandName::Bold),
            CommandState::Active
        )));
        assert_eq!(seen.last().map(|s| s.0), Some(UpdateReason::Destroyed));
    }

    #[test]
    fn test_latest_coalesces() {
        let mut editor = Editor::new(ContainerSurface::new(), Config::default());
        let receiver = attach(&mut editor);
        assert!(receiver.latest().is_none());

        editor.start("<p>one</p>").unwrap();
        editor.focus();
        editor.select_text(0, 3);
        let (reasons, update) = receiver.latest().unwrap();
        assert_eq!(
            reasons,
            vec![UpdateReason::Started, UpdateReason::Focus, UpdateReason::Selection]
        );
        assert_eq!(update.reason, UpdateReason::Selection);
        assert!(update.snapshot.has_selection);
        assert!(receiver.try_recv_update().is_none());
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let mut editor = Editor::new(ContainerSurface::new(), Config::default());
        drop(attach(&mut editor));
        editor.start("<p>alone</p>").unwrap();
        assert_eq!(editor.content().as_deref(), Some("<p>alone</p>"));
    }
}
