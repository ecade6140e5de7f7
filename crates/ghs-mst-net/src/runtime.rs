//! The dispatch loop.
//!
//! Owns the core [`Dispatcher`] and is the only task that touches process
//! state. Inbound messages arrive on a bounded queue fed by any number of
//! producer tasks; outbound messages go through the [`Transport`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use ghs_mst_core::{DispatchStats, Dispatcher, Message, ProcessState, ProcessSummary, Step};

use crate::error::Result;
use crate::transport::Transport;

/// Final state of a dispatch loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Process state when the loop stopped.
    pub summary: ProcessSummary,
    /// Dispatcher counters.
    pub stats: DispatchStats,
    /// Whether this process detected termination.
    pub halted: bool,
}

/// Single consumer of a process's incoming queue.
pub struct DispatchLoop<T: Transport> {
    dispatcher: Dispatcher,
    transport: Arc<T>,
    inbox: mpsc::Receiver<Message>,
    wake_on_start: bool,
}

impl<T: Transport> DispatchLoop<T> {
    /// Create a loop for `state`, reading from `inbox`.
    pub fn new(state: ProcessState, transport: Arc<T>, inbox: mpsc::Receiver<Message>) -> Self {
        Self {
            dispatcher: Dispatcher::new(state),
            transport,
            inbox,
            wake_on_start: false,
        }
    }

    /// Wake the process up spontaneously before reading the queue.
    pub fn wake_on_start(mut self, wake: bool) -> Self {
        self.wake_on_start = wake;
        self
    }

    /// Run until termination is detected, the queue closes, or `shutdown`
    /// becomes `true`.
    ///
    /// Only a failed spontaneous wakeup is an error; every per-message failure
    /// is logged and the message dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<LoopOutcome> {
        let id = self.transport.local_id();

        if self.wake_on_start {
            info!(process = %id, "waking up");
            let step = self.dispatcher.wakeup()?;
            self.transmit(step).await;
        }

        let mut watching = true;
        while !self.dispatcher.is_halted() {
            tokio::select! {
                changed = shutdown.changed(), if watching => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        info!(process = %id, "shutdown requested");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => watching = false,
                },
                next = self.inbox.recv() => match next {
                    Some(message) => {
                        let step = self.dispatcher.dispatch(message);
                        self.transmit(step).await;
                    }
                    None => {
                        debug!(process = %id, "incoming queue closed");
                        break;
                    }
                },
            }
        }

        let state = self.dispatcher.state();
        let outcome = LoopOutcome {
            summary: state.summary(),
            stats: self.dispatcher.stats(),
            halted: state.is_halted(),
        };
        info!(
            process = %id,
            halted = outcome.halted,
            branches = ?outcome.summary.branch_weights(),
            deferred = outcome.stats.deferred,
            dropped = outcome.stats.dropped,
            "dispatch loop stopped"
        );
        Ok(outcome)
    }

    async fn transmit(&self, step: Step) {
        for out in step.outgoing {
            if let Err(e) = self.transport.send(out.to, out.message).await {
                warn!(to = %out.to, message = %out.message, error = %e, "send failed, message dropped");
            }
        }
        if step.halted {
            info!(process = %self.transport.local_id(), "termination detected");
        }
    }
}
