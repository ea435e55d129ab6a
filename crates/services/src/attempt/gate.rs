use std::sync::atomic::{AtomicU8, Ordering};

use quiz_core::model::AttemptStatus;
use tokio::sync::watch;

/// Result of trying to claim the submission of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// This caller moved the attempt to `Submitting` and owns the write.
    Won,
    /// Someone else got there first; carries the status observed instead of `Active`.
    Lost(AttemptStatus),
}

/// Lifecycle status of one attempt with compare-and-set transitions.
///
/// Every transition goes through a single atomic swap, so of any number of
/// concurrent submitters exactly one observes `Active -> Submitting`.
/// Observers are notified through a watch channel after each transition.
#[derive(Debug)]
pub struct SubmissionGate {
    status: AtomicU8,
    notify: watch::Sender<AttemptStatus>,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGate {
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = watch::channel(AttemptStatus::Created);
        Self {
            status: AtomicU8::new(AttemptStatus::Created.as_u8()),
            notify,
        }
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        // Only valid discriminants are ever stored.
        AttemptStatus::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(AttemptStatus::Failed)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttemptStatus> {
        self.notify.subscribe()
    }

    /// Move from `from` to `to` if the status is still `from`.
    ///
    /// # Errors
    ///
    /// Returns the status actually observed when it is not `from`, or `from`
    /// itself when the lifecycle does not allow `from -> to`.
    pub fn advance(&self, from: AttemptStatus, to: AttemptStatus) -> Result<(), AttemptStatus> {
        if !from.can_advance_to(to) {
            return Err(from);
        }
        match self.status.compare_exchange(
            from.as_u8(),
            to.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.notify.send_replace(to);
                Ok(())
            }
            Err(actual) => Err(AttemptStatus::from_u8(actual).unwrap_or(AttemptStatus::Failed)),
        }
    }

    /// Claim the attempt for submission.
    pub fn try_begin_submit(&self) -> GateOutcome {
        match self.advance(AttemptStatus::Active, AttemptStatus::Submitting) {
            Ok(()) => GateOutcome::Won,
            Err(observed) => GateOutcome::Lost(observed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn active_gate() -> SubmissionGate {
        let gate = SubmissionGate::new();
        gate.advance(AttemptStatus::Created, AttemptStatus::Active)
            .unwrap();
        gate
    }

    #[test]
    fn only_one_submitter_wins() {
        let gate = Arc::new(active_gate());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.try_begin_submit())
            })
            .collect();
        let outcomes: Vec<GateOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = outcomes.iter().filter(|o| **o == GateOutcome::Won).count();
        assert_eq!(winners, 1);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, GateOutcome::Won | GateOutcome::Lost(AttemptStatus::Submitting)))
        );
    }

    #[test]
    fn cannot_submit_before_activation() {
        let gate = SubmissionGate::new();
        assert_eq!(
            gate.try_begin_submit(),
            GateOutcome::Lost(AttemptStatus::Created)
        );
    }

    #[test]
    fn status_never_moves_backwards() {
        let gate = active_gate();
        assert_eq!(gate.try_begin_submit(), GateOutcome::Won);
        gate.advance(AttemptStatus::Submitting, AttemptStatus::Submitted)
            .unwrap();

        assert!(gate
            .advance(AttemptStatus::Submitted, AttemptStatus::Active)
            .is_err());
        assert_eq!(
            gate.advance(AttemptStatus::Submitting, AttemptStatus::Failed),
            Err(AttemptStatus::Submitted)
        );
        assert_eq!(gate.status(), AttemptStatus::Submitted);
    }

    #[test]
    fn subscribers_see_latest_status() {
        let gate = active_gate();
        let rx = gate.subscribe();
        assert_eq!(*rx.borrow(), AttemptStatus::Active);
        gate.try_begin_submit();
        assert_eq!(*rx.borrow(), AttemptStatus::Submitting);
    }
}
