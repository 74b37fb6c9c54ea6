//! Lifecycle of one guarded request.
//!
//! ```text
//! Unresolved -> TenantResolved -> Authorized -> Executing -> Audited
//!      \              \               \             \
//!       +--------------+---------------+-------------+--> Rejected
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unresolved,
    TenantResolved,
    Authorized,
    Executing,
    Audited,
    Rejected,
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardState::Audited | GuardState::Rejected)
    }

    /// The state a successful step leads to. Terminal states have none.
    pub fn next(&self) -> Option<GuardState> {
        match self {
            GuardState::Unresolved => Some(GuardState::TenantResolved),
            GuardState::TenantResolved => Some(GuardState::Authorized),
            GuardState::Authorized => Some(GuardState::Executing),
            GuardState::Executing => Some(GuardState::Audited),
            GuardState::Audited | GuardState::Rejected => None,
        }
    }

    pub fn can_transition_to(&self, to: GuardState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == GuardState::Rejected || self.next() == Some(to)
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardState::Unresolved => "unresolved",
            GuardState::TenantResolved => "tenant_resolved",
            GuardState::Authorized => "authorized",
            GuardState::Executing => "executing",
            GuardState::Audited => "audited",
            GuardState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Tracks the state of one request and refuses illegal jumps.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: GuardState,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: GuardState::Unresolved,
        }
    }

    pub(crate) fn state(&self) -> GuardState {
        self.state
    }

    /// Move to the next state on the happy path.
    pub(crate) fn advance(&mut self) -> GuardState {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
        self.state
    }

    pub(crate) fn reject(&mut self) -> GuardState {
        if !self.state.is_terminal() {
            self.state = GuardState::Rejected;
        }
        self.state
    }
}
