//! The per-transaction state machine.
//!
//! A transaction is `Idle` until an authenticated sender is captured, and
//! goes back to `Idle` when it ends or is aborted. Resolution happens on the
//! way out of `Captured`, so there is no resolved state to keep.

use std::fmt;

use milter_alias_common::traits::fsm::FiniteStateMachine;
use ulid::Ulid;

use crate::session::SessionState;

/// Identifies one MTA connection, and so the transaction running on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Idle,
    Captured(SessionState),
}

#[derive(Debug)]
pub enum Event {
    /// An authenticated sender was named.
    Capture(SessionState),
    /// The message is complete.
    EndOfTransaction,
    /// The transaction or connection went away, or the sender turned out to
    /// be unauthenticated.
    Abort,
}

/// What a transition hands back to the caller.
#[derive(Debug, Default)]
pub struct Handoff {
    /// Set when a captured transaction ends and needs resolving.
    pub resolve: Option<SessionState>,
}

impl FiniteStateMachine for TransactionState {
    type Input = Event;
    type Context = Handoff;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        match (self, input) {
            // A second MAIL FROM replaces whatever the first one captured.
            (_, Event::Capture(session)) => Self::Captured(session),
            (Self::Captured(session), Event::EndOfTransaction) => {
                context.resolve = Some(session);
                Self::Idle
            }
            (Self::Idle, Event::EndOfTransaction) | (_, Event::Abort) => Self::Idle,
        }
    }
}
