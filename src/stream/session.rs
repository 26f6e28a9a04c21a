//! Async consumption of a decoded event stream

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::{SessionState, StreamAssembler, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("stream closed")]
    Closed,
    #[error("stream failed: {0}")]
    Failed(String),
}

pub type EventResult = Result<StreamEvent, TransportError>;

/// Caller side of the cooperative abort signal
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

pub fn abort_signal() -> (AbortHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, rx)
}

/// Drive `assembler` from `events` until the stream ends or `abort` fires.
///
/// Abort is checked before every read, so an event that has already been
/// received is always folded completely. Channel closure counts as the end
/// of the stream. A dropped abort handle never aborts.
pub async fn run_session(
    assembler: &mut StreamAssembler,
    mut events: mpsc::Receiver<EventResult>,
    mut abort: watch::Receiver<bool>,
) -> SessionState {
    let mut abort_live = true;

    loop {
        if assembler.state().is_terminal() {
            break;
        }
        if *abort.borrow() {
            assembler.abort();
            break;
        }

        tokio::select! {
            biased;

            changed = abort.changed(), if abort_live => {
                if changed.is_err() {
                    debug!("Abort handle dropped");
                    abort_live = false;
                }
            }
            next = events.recv() => match next {
                Some(Ok(event)) => assembler.apply(event),
                Some(Err(TransportError::Closed)) | None => assembler.finalize(),
                Some(Err(TransportError::Failed(reason))) => {
                    warn!(reason = %reason, "Transport failed");
                    assembler.fail(&reason);
                }
            },
        }
    }

    assembler.state()
}
