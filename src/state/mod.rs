//! State - records shared between passes.
//!
//! - [`transition`]: transition states, predefined transitions and the gating
//!   predicates the scheduler and commit phase consult

pub mod transition;

pub use transition::{
    can_commit_transition, get_first_transition_to_process, get_transition_from_fiber,
    is_custom_transition, predefined_deferred_transition, predefined_sync_transition,
    set_transition_complete, should_process_transition, start_transition, PendingState,
    Transition, TransitionKind, TransitionState,
};
