//! Cooperative pause/skip control for a running workflow.
//!
//! [`RunControl`] is the writer side held by the orchestrator session. Every
//! long-running step (a generation call, a rendezvous wait) receives an
//! [`Interrupt`] and races it against its own future, so a pause or skip
//! takes effect promptly instead of only at the next chapter boundary.

use crate::{FolioError, FolioResult};
use std::future::Future;
use tokio::sync::watch;

/// Current control flags of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    pub paused: bool,
    pub skip_requested: bool,
}

impl ControlState {
    /// In-flight work should stop when either flag is set.
    pub fn interrupting(&self) -> bool {
        self.paused || self.skip_requested
    }
}

/// Writer side of the control signal.
#[derive(Debug)]
pub struct RunControl {
    tx: watch::Sender<ControlState>,
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::default());
        Self { tx }
    }

    /// Set the pause flag. Returns `false` if the run was already paused.
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|state| {
            let changed = !state.paused;
            state.paused = true;
            changed
        })
    }

    /// Clear the pause flag. Returns `false` if the run was not paused.
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|state| {
            let changed = state.paused;
            state.paused = false;
            changed
        })
    }

    /// Ask the run to abandon the chapter in progress.
    pub fn request_skip(&self) {
        self.tx.send_modify(|state| state.skip_requested = true);
    }

    /// Consume a pending skip request, returning whether one was pending.
    pub fn take_skip(&self) -> bool {
        let mut was_set = false;
        self.tx.send_if_modified(|state| {
            was_set = state.skip_requested;
            state.skip_requested = false;
            was_set
        });
        was_set
    }

    pub fn state(&self) -> ControlState {
        *self.tx.borrow()
    }

    /// A reader handle that fires while the run is paused or a skip is pending.
    pub fn interrupt(&self) -> Interrupt {
        Interrupt {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Resolve once the pause flag is cleared (immediately if not paused).
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| !state.paused).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of the control signal, threaded into cancellable steps.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    rx: Option<watch::Receiver<ControlState>>,
}

impl Interrupt {
    /// An interrupt that never fires, for callers outside a workflow run.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_raised(&self) -> bool {
        self.rx
            .as_ref()
            .is_some_and(|rx| rx.borrow().interrupting())
    }

    /// Resolve when the interrupt fires. Never resolves for [`Interrupt::never`]
    /// or once the controlling run has gone away.
    pub async fn raised(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(ControlState::interrupting).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// Race `fut` against the interrupt; an interrupt wins with
    /// [`FolioError::Interrupted`] and drops `fut`.
    pub async fn guard<T, F>(&self, step: &str, fut: F) -> FolioResult<T>
    where
        F: Future<Output = FolioResult<T>>,
    {
        if self.is_raised() {
            return Err(FolioError::Interrupted(format!("{step} not started")));
        }
        let mut signal = self.clone();
        tokio::select! {
            biased;
            _ = signal.raised() => Err(FolioError::Interrupted(format!("{step} cancelled"))),
            result = fut => result,
        }
    }
}
