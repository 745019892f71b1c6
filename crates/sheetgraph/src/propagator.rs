//! Live change propagation.
//!
//! Each [`CellChange`] moves through a fixed sequence of states:
//!
//! ```text
//! Received -> ImpactComputed -> GraphUpdated -> Notified
//!     \______________\_______________\_________> Failed
//! ```
//!
//! The impact set is captured *before* the graph is touched, so it reflects
//! the edges as they were when the change happened. Any store error moves
//! the event to `Failed`; it is logged and dropped, never retried. Transport
//! errors are logged and the event still ends in `Notified`.
//!
//! Events are serialized through a writer gate: one event is fully processed
//! before the next one starts.

use crate::domain::{CellAddress, CellChange, ImpactResult};
use crate::error::Result;
use crate::notify::NotificationTransport;
use crate::storage::{Deadline, GraphStore, UpsertSummary};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Default depth bound of the impact traversal.
pub const DEFAULT_IMPACT_DEPTH: usize = 10;

/// Processing state of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeState {
    /// Accepted, nothing done yet
    Received,
    /// Dependents captured under the old edges
    ImpactComputed,
    /// Cell written to the store
    GraphUpdated,
    /// Notification handed to the transport (terminal)
    Notified,
    /// A store step failed; the event was dropped (terminal)
    Failed,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::ImpactComputed => "IMPACT_COMPUTED",
            Self::GraphUpdated => "GRAPH_UPDATED",
            Self::Notified => "NOTIFIED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// What happened to a successfully processed change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    /// The notification that was produced
    pub impact: ImpactResult,
    /// Store-side effects of the update
    pub update: UpsertSummary,
    /// Whether the transport accepted the notification
    pub delivered: bool,
}

/// Applies change events to the store and publishes their impact.
pub struct ChangePropagator {
    store: Arc<dyn GraphStore>,
    transport: Arc<dyn NotificationTransport>,
    impact_depth: usize,
    traversal_timeout: Option<Duration>,
    writer_gate: Mutex<()>,
}

impl ChangePropagator {
    /// Create a propagator over a store and a transport.
    pub fn new(store: Arc<dyn GraphStore>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            store,
            transport,
            impact_depth: DEFAULT_IMPACT_DEPTH,
            traversal_timeout: None,
            writer_gate: Mutex::new(()),
        }
    }

    /// Override the impact traversal depth.
    #[must_use]
    pub fn with_impact_depth(mut self, depth: usize) -> Self {
        self.impact_depth = depth;
        self
    }

    /// Bound each impact traversal by a timeout.
    #[must_use]
    pub fn with_traversal_timeout(mut self, timeout: Duration) -> Self {
        self.traversal_timeout = Some(timeout);
        self
    }

    /// Process one change event to completion.
    ///
    /// # Errors
    ///
    /// Returns the store error that moved the event to [`ChangeState::Failed`].
    /// The event has been dropped by then.
    pub async fn process(&self, change: CellChange) -> Result<PropagationOutcome> {
        let _gate = self.writer_gate.lock().await;

        let address = CellAddress::parse(change.address.as_str());
        tracing::debug!(address = %address, state = %ChangeState::Received, "Change event");

        match self.run(change, &address).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    address = %address,
                    state = %ChangeState::Failed,
                    error = %e,
                    "Dropping change event"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, change: CellChange, address: &CellAddress) -> Result<PropagationOutcome> {
        let address = &self.stored_address(address, &change.sheet_name).await?;
        let deadline = self.traversal_timeout.map(Deadline::after);
        let affected_cells = self
            .store
            .traverse_dependents(address, self.impact_depth, deadline)
            .await?;
        tracing::debug!(
            address = %address,
            state = %ChangeState::ImpactComputed,
            affected = affected_cells.len(),
            "Change event"
        );

        let mut update = change.to_update();
        update.address = address.clone();
        let summary = self.store.upsert_cell(update).await?;
        tracing::debug!(address = %address, state = %ChangeState::GraphUpdated, "Change event");

        let impact = ImpactResult {
            changed_cell: address.clone(),
            old_value: change.old_value,
            new_value: change.new_value,
            affected_cells,
        };

        let delivered = match self.transport.broadcast(&impact).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Impact notification not delivered");
                false
            }
        };
        tracing::debug!(address = %address, state = %ChangeState::Notified, "Change event");

        Ok(PropagationOutcome {
            impact,
            update: summary,
            delivered,
        })
    }

    /// The address a changed cell is stored under.
    ///
    /// A bare address with a sheet name prefers the cell on that sheet, which
    /// is stored qualified when several sheets share the bare address.
    async fn stored_address(&self, address: &CellAddress, sheet_name: &str) -> Result<CellAddress> {
        if address.is_qualified() || sheet_name.is_empty() {
            return Ok(address.clone());
        }
        let on_sheet = self
            .store
            .get_cell(&address.qualified_with(sheet_name))
            .await?;
        Ok(on_sheet.map_or_else(|| address.clone(), |cell| cell.address))
    }

    /// Process change events from a channel until every sender is dropped.
    ///
    /// Failed events are logged and skipped. The task resolves to the number
    /// of events that reached [`ChangeState::Notified`].
    pub fn spawn_listener(self: Arc<Self>, mut events: mpsc::Receiver<CellChange>) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut notified = 0;
            while let Some(change) = events.recv().await {
                if self.process(change).await.is_ok() {
                    notified += 1;
                }
            }
            tracing::debug!(notified, "Change listener stopped");
            notified
        })
    }
}
