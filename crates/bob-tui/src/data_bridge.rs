//! Data bridge — connects the `ModeController` and render loop to TUI actions.
//!
//! Starts the controller, then forwards every status change, buffer
//! revision and rendered frame as an [`Action`] until cancelled.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bob_core::{DisplayList, ModeController};

use crate::action::{Action, Notification};

pub async fn spawn_data_bridge(
    controller: ModeController,
    mut frames: watch::Receiver<Arc<DisplayList>>,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    // Subscribe before starting so the startup transition is observed.
    let mut status = controller.subscribe();
    let mut revisions = controller.buffer().subscribe();

    if let Err(e) = controller.start().await {
        warn!(error = %e, "mode controller failed to start");
        let _ = action_tx.send(Action::Notify(Notification::error(format!(
            "startup failed: {e}"
        ))));
        return;
    }

    send_status(&controller, &action_tx);
    let _ = action_tx.send(Action::DetectionsUpdated(Arc::new(
        controller.buffer().snapshot(),
    )));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = status.changed() => {
                send_status(&controller, &action_tx);
            }
            Ok(()) = revisions.changed() => {
                let snapshot = controller.buffer().snapshot();
                let _ = action_tx.send(Action::DetectionsUpdated(Arc::new(snapshot)));
            }
            Ok(()) = frames.changed() => {
                let frame = Arc::clone(&frames.borrow_and_update());
                let _ = action_tx.send(Action::FrameRendered(frame));
            }
        }
    }

    debug!("data bridge stopped");
}

fn send_status(controller: &ModeController, action_tx: &mpsc::UnboundedSender<Action>) {
    let _ = action_tx.send(Action::StatusUpdated {
        status: controller.status(),
        frame: controller.frame_resource(),
    });
}
