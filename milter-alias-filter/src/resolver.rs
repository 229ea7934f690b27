//! Turns a captured list sender into the recipients it should fan out to.

use std::sync::Arc;

use dashmap::DashMap;
use milter_alias_common::{
    AddressSet, config::QueryDefinition, incoming, internal, traits::fsm::FiniteStateMachine,
};
use milter_alias_directory::{Directory, DirectoryError};
use milter_alias_tracing::traced;

use crate::{
    session::{SessionState, strip_angle_brackets},
    state::{Event, Handoff, TransactionId, TransactionState},
};

/// What the MTA should be told about the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    TemporaryFailure,
}

/// The outcome of ending a transaction.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolution {
    pub verdict: Verdict,
    /// Sorted, duplicate free, and none of them owned by the sender.
    pub recipients: AddressSet,
}

impl Resolution {
    const fn continue_with(recipients: AddressSet) -> Self {
        Self {
            verdict: Verdict::Continue,
            recipients,
        }
    }

    const fn unchanged() -> Self {
        Self::continue_with(AddressSet::new())
    }
}

pub struct Resolver<D> {
    directory: Arc<D>,
    list_query: QueryDefinition,
    account_query: QueryDefinition,
    transactions: DashMap<TransactionId, TransactionState>,
}

impl<D: Directory> Resolver<D> {
    pub fn new(
        directory: Arc<D>,
        list_query: QueryDefinition,
        account_query: QueryDefinition,
    ) -> Self {
        Self {
            directory,
            list_query,
            account_query,
            transactions: DashMap::new(),
        }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Number of transactions with a captured sender.
    pub fn pending(&self) -> usize {
        self.transactions.len()
    }

    /// Feeds `event` to the transaction's state machine.
    fn advance(&self, id: TransactionId, event: Event) -> Handoff {
        let mut handoff = Handoff::default();
        let state = self
            .transactions
            .remove(&id)
            .map_or_else(TransactionState::default, |(_, state)| state);

        match state.transition(event, &mut handoff) {
            TransactionState::Idle => {}
            captured @ TransactionState::Captured(_) => {
                self.transactions.insert(id, captured);
            }
        }

        handoff
    }

    /// Records the sender of a transaction.
    ///
    /// Nothing is kept unless `auth_account` is present and non-empty, and
    /// the sender is not the null reverse path.
    pub fn on_sender(
        &self,
        id: TransactionId,
        sender: &[u8],
        auth_account: Option<&[u8]>,
    ) -> Verdict {
        let Some(account) = auth_account.filter(|account| !account.is_empty()) else {
            incoming!(
                level = DEBUG,
                "[{id}] Unauthenticated sender {}, nothing to expand",
                String::from_utf8_lossy(sender)
            );
            self.advance(id, Event::Abort);
            return Verdict::Continue;
        };

        if strip_angle_brackets(sender).is_empty() {
            incoming!(level = DEBUG, "[{id}] Null sender, nothing to expand");
            self.advance(id, Event::Abort);
            return Verdict::Continue;
        }

        match SessionState::capture(sender, account) {
            Ok(session) => {
                incoming!(level = DEBUG, "[{id}] Captured {session:?}");
                self.advance(id, Event::Capture(session));
                Verdict::Continue
            }
            Err(err) => {
                internal!(level = ERROR, "[{id}] Unable to capture sender: {err}");
                self.advance(id, Event::Abort);
                Verdict::TemporaryFailure
            }
        }
    }

    /// Ends a transaction, working out which recipients to add.
    ///
    /// Directory failures are logged and leave the message untouched, so
    /// mail keeps flowing when the directory is unwell.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self), fields(transaction = %id)), timing(precision = "ms"))]
    pub async fn on_end_of_transaction(&self, id: TransactionId) -> Resolution {
        let Some(session) = self.advance(id, Event::EndOfTransaction).resolve else {
            return Resolution::unchanged();
        };

        match self.resolve(&session).await {
            Ok(recipients) => Resolution::continue_with(recipients),
            Err(err) if err.is_resource_exhaustion() => {
                internal!(level = ERROR, "[{id}] {err}");
                Resolution {
                    verdict: Verdict::TemporaryFailure,
                    recipients: AddressSet::new(),
                }
            }
            Err(err) => {
                internal!(
                    level = ERROR,
                    "[{id}] Not expanding {}: {err}",
                    String::from_utf8_lossy(&session.envelope_sender)
                );
                Resolution::unchanged()
            }
        }
    }

    /// Forgets the transaction without resolving it.
    pub fn on_abort(&self, id: TransactionId) {
        self.advance(id, Event::Abort);
        incoming!("[{id}] Transaction aborted");
    }

    async fn resolve(&self, session: &SessionState) -> Result<AddressSet, DirectoryError> {
        let mut members = self
            .directory
            .query(&self.list_query, &session.envelope_sender)
            .await?;

        if members.is_empty() {
            internal!(
                level = DEBUG,
                "{} is not a mailing list",
                String::from_utf8_lossy(&session.envelope_sender)
            );
            return Ok(members);
        }

        members.sort();

        let mut owned = self
            .directory
            .query(&self.account_query, &session.auth_account)
            .await?;
        owned.sort();

        members.subtract(&owned);

        internal!(
            level = INFO,
            "{} expands to {} recipients for {}",
            String::from_utf8_lossy(&session.envelope_sender),
            members.len(),
            String::from_utf8_lossy(&session.auth_account)
        );

        Ok(members)
    }
}
