//! Change events emitted by the address space.
//!
//! Every successful write produces exactly one `ValueChange`, handed to the
//! registered hook before the write call returns. The hook runs under the
//! caller's store lock, so hooks observe changes for a node in revision
//! order with no gaps.

use std::sync::{Arc, Mutex};

use railgrid_core::{NodeId, Value};

/// A single observed value change on a variable node.
///
/// INVARIANT: `revision` is the revision produced by this write; revisions
/// for one node form a strictly increasing sequence matching write order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// The variable that changed.
    pub node: NodeId,
    /// Value before the write.
    pub old: Value,
    /// Value after the write.
    pub new: Value,
    /// Revision counter after the write.
    pub revision: u64,
}

/// Callback type invoked by the store on every successful write.
pub type ChangeHook = Box<dyn FnMut(&ValueChange) + Send>;

/// Simple change collector for testing and diagnostics.
#[derive(Clone, Default)]
pub struct ChangeCollector {
    changes: Arc<Mutex<Vec<ValueChange>>>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that records every change into this collector.
    pub fn hook(&self) -> ChangeHook {
        let collector = self.clone();
        Box::new(move |change| {
            collector.changes.lock().unwrap().push(change.clone());
        })
    }

    /// Drain and return all recorded changes.
    pub fn take(&self) -> Vec<ValueChange> {
        std::mem::take(&mut *self.changes.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.changes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
