//! The transaction context handed to units of work.

use commerce_types::{DomainEvent, RepositoryProvider, TransactionalConnection};
use uuid::Uuid;

/// A physical transaction as seen from inside a unit of work.
///
/// Wraps the connection's live handle together with the bookkeeping the
/// coordinator needs: how deeply the current invocation is nested, whether a
/// joined invocation has failed, and the events waiting for commit.
///
/// Forward it to [`RunOptions::joined`](super::RunOptions::joined) to make a
/// nested unit of work share this transaction.
pub struct TransactionManager<C: TransactionalConnection> {
    id: Uuid,
    handle: C::Handle,
    pub(super) depth: usize,
    rollback_only: bool,
    events: Vec<DomainEvent>,
}

impl<C: TransactionalConnection> TransactionManager<C> {
    pub(super) fn new(handle: C::Handle) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle,
            depth: 0,
            rollback_only: false,
            events: Vec::new(),
        }
    }

    /// Identifies the physical transaction in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 0 for the outermost invocation, +1 for each joined level.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_outermost(&self) -> bool {
        self.depth == 0
    }

    /// True once any joined unit of work has failed.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// The live database handle.
    pub fn handle(&mut self) -> &mut C::Handle {
        &mut self.handle
    }

    /// Queues an event to be published after the outermost commit.
    pub fn emit(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Events queued so far, in emission order.
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub(super) fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub(super) fn into_parts(self) -> (C::Handle, Vec<DomainEvent>, bool) {
        (self.handle, self.events, self.rollback_only)
    }
}

impl<C> TransactionManager<C>
where
    C: TransactionalConnection,
    C::Handle: RepositoryProvider,
{
    pub fn currencies(&mut self) -> <C::Handle as RepositoryProvider>::Currencies<'_> {
        self.handle.currencies()
    }

    pub fn customers(&mut self) -> <C::Handle as RepositoryProvider>::Customers<'_> {
        self.handle.customers()
    }

    pub fn customer_groups(&mut self) -> <C::Handle as RepositoryProvider>::CustomerGroups<'_> {
        self.handle.customer_groups()
    }
}
