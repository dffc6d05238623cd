//! Auto-hide timers for the transient overlays.
//!
//! Each overlay kind carries a generation counter.  Arming bumps the
//! generation and spawns a sleep task that reports back through the
//! core event channel; an expiry whose generation is no longer current
//! was superseded by a re-arm and must be ignored.  This gives
//! last-writer-wins semantics without tracking task handles.

use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

use crate::core::CoreEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Channel info banner after a channel starts.
    Info,
    /// Pending digit buffer awaiting resolution.
    NumberBuffer,
    /// Seek / pause progress bar.
    ProgressBar,
}

impl OverlayKind {
    pub fn delay(self) -> Duration {
        match self {
            OverlayKind::Info => Duration::from_millis(4000),
            OverlayKind::NumberBuffer => Duration::from_millis(2000),
            OverlayKind::ProgressBar => Duration::from_millis(3000),
        }
    }

    fn slot(self) -> usize {
        match self {
            OverlayKind::Info => 0,
            OverlayKind::NumberBuffer => 1,
            OverlayKind::ProgressBar => 2,
        }
    }
}

pub struct OverlayTimers {
    event_tx: mpsc::Sender<CoreEvent>,
    generations: [u64; 3],
}

impl OverlayTimers {
    pub fn new(event_tx: mpsc::Sender<CoreEvent>) -> Self {
        Self {
            event_tx,
            generations: [0; 3],
        }
    }

    /// (Re)start the auto-hide countdown for `kind`.  Any countdown
    /// already in flight becomes stale.
    pub fn arm(&mut self, kind: OverlayKind) -> u64 {
        let slot = &mut self.generations[kind.slot()];
        *slot += 1;
        let generation = *slot;

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(kind.delay()).await;
            let _ = tx
                .send(CoreEvent::OverlayExpired { kind, generation })
                .await;
        });
        debug!("overlay: armed {:?} gen={}", kind, generation);
        generation
    }

    /// Invalidate any in-flight countdown without starting a new one.
    pub fn cancel(&mut self, kind: OverlayKind) {
        self.generations[kind.slot()] += 1;
    }

    /// True iff `generation` is the latest arm for `kind`.
    pub fn is_current(&self, kind: OverlayKind, generation: u64) -> bool {
        self.generations[kind.slot()] == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timers() -> (OverlayTimers, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (OverlayTimers::new(tx), rx)
    }

    #[tokio::test]
    async fn test_rearm_supersedes_previous_generation() {
        let (mut t, _rx) = timers();
        let first = t.arm(OverlayKind::Info);
        let second = t.arm(OverlayKind::Info);
        assert!(!t.is_current(OverlayKind::Info, first));
        assert!(t.is_current(OverlayKind::Info, second));
    }

    #[tokio::test]
    async fn test_kinds_have_independent_generations() {
        let (mut t, _rx) = timers();
        let info = t.arm(OverlayKind::Info);
        let digits = t.arm(OverlayKind::NumberBuffer);
        t.arm(OverlayKind::NumberBuffer);
        assert!(t.is_current(OverlayKind::Info, info));
        assert!(!t.is_current(OverlayKind::NumberBuffer, digits));
    }

    #[tokio::test]
    async fn test_cancel_invalidates_without_new_timer() {
        let (mut t, _rx) = timers();
        let gen = t.arm(OverlayKind::ProgressBar);
        t.cancel(OverlayKind::ProgressBar);
        assert!(!t.is_current(OverlayKind::ProgressBar, gen));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_event_carries_arming_generation() {
        let (mut t, mut rx) = timers();
        let gen = t.arm(OverlayKind::NumberBuffer);
        tokio::time::advance(OverlayKind::NumberBuffer.delay()).await;
        match rx.recv().await {
            Some(CoreEvent::OverlayExpired { kind, generation }) => {
                assert_eq!(kind, OverlayKind::NumberBuffer);
                assert_eq!(generation, gen);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
