//! Ledger events published to anyone watching the state container.
//!
//! Events are broadcast to every subscriber; views re-read whatever they
//! display when an event arrives.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CAPACITY: usize = 256;

/// Something observable changed in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    /// The navigation stack moved
    NavigationChanged {
        /// Breadcrumb of the new position
        breadcrumb: String,
        /// Product of the ratios on the stack
        cumulative_ratio: f64,
    },

    /// A fund's balance or flags were written
    BalanceChanged {
        /// The changed fund
        fund_id: i64,
        /// Its name at the time of the change
        fund_name: String,
        /// Its new balance
        balance: f64,
    },

    /// An expense now occupies a slot
    ExpenseRecorded {
        /// The new expense
        expense_id: i64,
        /// The fund it was spent against
        fund_id: i64,
        /// Index of the occupied slot
        time_slot: i32,
    },

    /// An expense was removed and its balances credited back
    ExpenseRemoved {
        /// The removed expense
        expense_id: i64,
        /// Number of funds credited
        credited: usize,
        /// Number of funds left alone because they are frozen
        frozen: usize,
        /// Number of path segments that named no fund
        unresolved: usize,
    },

    /// A path segment of a removed expense named no existing fund, so its
    /// credit was skipped
    AncestorUnresolved {
        /// The removed expense
        expense_id: i64,
        /// Budget named by the segment; empty for the spent fund itself
        budget_name: String,
        /// Fund named by the segment
        fund_name: String,
    },

    /// Budgets or funds were created, renamed, moved, linked or deleted
    StructureChanged,

    /// The slot length changed
    SlotSizeChanged {
        /// New slot length
        minutes: i64,
    },
}

/// Typed publish/subscribe channel for `LedgerEvent`
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: LedgerEvent) {
        trace!("Emitting {:?}", event);
        let _ = self.sender.send(event);
    }

    /// Starts receiving every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}
