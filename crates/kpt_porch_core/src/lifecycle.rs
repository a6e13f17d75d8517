//! The lifecycle state machine. `transition` is the only place lifecycle
//! moves; every other module treats `Lifecycle` read-only, and no call site
//! compares lifecycle by string.

use kpt_errors::{Error, ErrorKind};
use kpt_krm::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Propose,
    Reject,
    Approve,
    ProposeDelete,
    RejectDelete,
    ApproveDelete,
}

/// Applies `event` to `state`. `Ok(None)` means the revision is gone
/// (finalized deletion); every other success case carries the new state.
pub fn transition(state: Lifecycle, event: LifecycleEvent) -> Result<Option<Lifecycle>, Error> {
    use Lifecycle::*;
    use LifecycleEvent::*;

    match (state, event) {
        (Draft, Propose) => Ok(Some(Proposed)),
        (Proposed, Reject) => Ok(Some(Draft)),
        (Proposed, Approve) => Ok(Some(Published)),
        (Published, ProposeDelete) => Ok(Some(DeletionProposed)),
        (DeletionProposed, RejectDelete) => Ok(Some(Published)),
        (DeletionProposed, ApproveDelete) => Ok(None),
        (state, event) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("{state:?} does not accept {event:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_propose_reject_round_trips() {
        let proposed = transition(Lifecycle::Draft, LifecycleEvent::Propose).unwrap().unwrap();
        assert_eq!(proposed, Lifecycle::Proposed);
        let draft = transition(proposed, LifecycleEvent::Reject).unwrap().unwrap();
        assert_eq!(draft, Lifecycle::Draft);
    }

    #[test]
    fn approve_delete_finalizes() {
        let result = transition(Lifecycle::DeletionProposed, LifecycleEvent::ApproveDelete).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let err = transition(Lifecycle::Draft, LifecycleEvent::Approve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
