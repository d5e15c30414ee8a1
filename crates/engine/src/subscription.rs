//! Interest registrations over variables and change-notification delivery.
//!
//! The engine is shared between the write path (dispatch) and the session
//! layer (create/subscribe/unsubscribe/delete), so it is `Clone` with a
//! single mutex inside. Sinks are mpsc senders owned by the subscribing
//! session; per-sink channel order is delivery order.
//!
//! Dispatch is driven synchronously from the store's change hook while the
//! store lock is held, which makes notifications for one node reach every
//! sink in global per-node revision order with no gaps.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use railgrid_core::NodeId;

use crate::error::SpaceError;
use crate::events::ValueChange;

/// Identifier of a subscription. Allocated from a per-engine monotonic
/// counter, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Subscription-local identifier of one variable's registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorHandle(u64);

impl MonitorHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Lifecycle of a subscription. `Deleted` is terminal; the id is never
/// reused afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Deleting,
    Deleted,
}

/// One delivered change notification, tagged with the handle it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subscription: SubscriptionId,
    pub handle: MonitorHandle,
    pub change: ValueChange,
}

struct Subscription {
    state: SubscriptionState,
    /// Declared check period. Delivery is push-per-write, so this is
    /// retained as a client-visible attribute rather than a poll timer.
    sampling_interval: Duration,
    next_handle: u64,
    handles: FxHashMap<MonitorHandle, NodeId>,
    sink: Sender<Notification>,
}

struct Inner {
    next_id: u64,
    subscriptions: FxHashMap<SubscriptionId, Subscription>,
    /// Reverse index: node -> registrations, in registration order.
    by_node: FxHashMap<NodeId, Vec<(SubscriptionId, MonitorHandle)>>,
}

/// Registry of live subscriptions and their monitored variables.
#[derive(Clone)]
pub struct SubscriptionEngine {
    inner: Arc<Mutex<Inner>>,
}

impl SubscriptionEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                subscriptions: FxHashMap::default(),
                by_node: FxHashMap::default(),
            })),
        }
    }

    /// Allocate a fresh subscription in `Active` state.
    pub fn create_subscription(
        &self,
        sampling_interval: Duration,
        sink: Sender<Notification>,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscriptions.insert(
            id,
            Subscription {
                state: SubscriptionState::Active,
                sampling_interval,
                next_handle: 1,
                handles: FxHashMap::default(),
                sink,
            },
        );
        id
    }

    /// Register interest in a node. The caller has already validated the
    /// node against the store.
    pub fn subscribe(
        &self,
        sub_id: SubscriptionId,
        node: NodeId,
    ) -> Result<MonitorHandle, SpaceError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = match inner.subscriptions.get_mut(&sub_id) {
            Some(sub) if sub.state == SubscriptionState::Active => sub,
            _ => return Err(SpaceError::SubscriptionNotFound(sub_id)),
        };
        let handle = MonitorHandle(sub.next_handle);
        sub.next_handle += 1;
        sub.handles.insert(handle, node.clone());
        inner.by_node.entry(node).or_default().push((sub_id, handle));
        Ok(handle)
    }

    /// Remove one registration. After this returns, no further
    /// notifications for the handle are delivered.
    pub fn unsubscribe(
        &self,
        sub_id: SubscriptionId,
        handle: MonitorHandle,
    ) -> Result<(), SpaceError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscriptions
            .get_mut(&sub_id)
            .ok_or(SpaceError::SubscriptionNotFound(sub_id))?;
        let node = sub
            .handles
            .remove(&handle)
            .ok_or(SpaceError::HandleNotFound { subscription: sub_id, handle })?;
        Self::drop_registration(&mut inner.by_node, &node, sub_id, handle);
        Ok(())
    }

    /// Tear a subscription down: release every remaining handle, then mark
    /// it deleted. Safe when handles were already removed individually.
    pub fn delete_subscription(&self, sub_id: SubscriptionId) -> Result<(), SpaceError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscriptions
            .get_mut(&sub_id)
            .ok_or(SpaceError::SubscriptionNotFound(sub_id))?;
        sub.state = SubscriptionState::Deleting;
        let handles: Vec<(MonitorHandle, NodeId)> = sub.handles.drain().collect();
        for (handle, node) in handles {
            Self::drop_registration(&mut inner.by_node, &node, sub_id, handle);
        }
        // Terminal: the entry goes away; the monotonic id counter
        // guarantees the id is never reused.
        inner.subscriptions.remove(&sub_id);
        Ok(())
    }

    fn drop_registration(
        by_node: &mut FxHashMap<NodeId, Vec<(SubscriptionId, MonitorHandle)>>,
        node: &NodeId,
        sub_id: SubscriptionId,
        handle: MonitorHandle,
    ) {
        if let Some(regs) = by_node.get_mut(node) {
            regs.retain(|(s, h)| !(*s == sub_id && *h == handle));
            if regs.is_empty() {
                by_node.remove(node);
            }
        }
    }

    /// Deliver a store-level change to every active registration on the
    /// node, exactly once per handle, in registration order.
    pub fn dispatch(&self, change: &ValueChange) {
        let inner = self.inner.lock().unwrap();
        let Some(regs) = inner.by_node.get(&change.node) else {
            return;
        };
        for (sub_id, handle) in regs {
            let Some(sub) = inner.subscriptions.get(sub_id) else {
                continue;
            };
            if sub.state != SubscriptionState::Active {
                continue;
            }
            let notification = Notification {
                subscription: *sub_id,
                handle: *handle,
                change: change.clone(),
            };
            if sub.sink.send(notification).is_err() {
                // Receiver gone: the owning session hung up. Teardown
                // happens through delete_subscription; just skip here.
                log::debug!("notification dropped for {sub_id} (sink disconnected)");
            }
        }
    }

    /// Declared sampling interval of a subscription.
    pub fn sampling_interval(&self, sub_id: SubscriptionId) -> Result<Duration, SpaceError> {
        let inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .get(&sub_id)
            .map(|s| s.sampling_interval)
            .ok_or(SpaceError::SubscriptionNotFound(sub_id))
    }

    /// Whether a subscription exists and accepts registrations.
    pub fn is_active(&self, sub_id: SubscriptionId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .get(&sub_id)
            .map(|s| s.state == SubscriptionState::Active)
            .unwrap_or(false)
    }

    /// Ids of all live subscriptions, ascending. Used by server teardown.
    pub fn active_ids(&self) -> Vec<SubscriptionId> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<SubscriptionId> = inner.subscriptions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of handles registered on a node, across all subscriptions.
    pub fn monitor_count(&self, node: &NodeId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.by_node.get(node).map(Vec::len).unwrap_or(0)
    }
}

impl Default for SubscriptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railgrid_core::Value;
    use std::sync::mpsc;

    fn change(node: &NodeId, old: i64, new: i64, revision: u64) -> ValueChange {
        ValueChange {
            node: node.clone(),
            old: Value::Int(old),
            new: Value::Int(new),
            revision,
        }
    }

    #[test]
    fn test_notification_per_handle_in_order() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        let handle = engine.subscribe(sub, node.clone()).unwrap();

        engine.dispatch(&change(&node, 0, 1, 1));
        engine.dispatch(&change(&node, 1, 7, 2));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.subscription, sub);
        assert_eq!(first.handle, handle);
        assert_eq!(first.change.new, Value::Int(1));
        assert_eq!(first.change.revision, 1);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.change.old, Value::Int(1));
        assert_eq!(second.change.new, Value::Int(7));
        assert_eq!(second.change.revision, 2);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_two_handles_two_notifications() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        let h1 = engine.subscribe(sub, node.clone()).unwrap();
        let h2 = engine.subscribe(sub, node.clone()).unwrap();
        assert_ne!(h1, h2);

        engine.dispatch(&change(&node, 0, 1, 1));

        let handles: Vec<MonitorHandle> =
            vec![rx.try_recv().unwrap().handle, rx.try_recv().unwrap().handle];
        assert_eq!(handles, vec![h1, h2]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_independent_subscriptions_each_notified() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        let sub_a = engine.create_subscription(Duration::from_millis(100), tx_a);
        let sub_b = engine.create_subscription(Duration::from_millis(250), tx_b);
        engine.subscribe(sub_a, node.clone()).unwrap();
        engine.subscribe(sub_b, node.clone()).unwrap();

        engine.dispatch(&change(&node, 0, 5, 1));

        assert_eq!(rx_a.try_recv().unwrap().subscription, sub_a);
        assert_eq!(rx_b.try_recv().unwrap().subscription, sub_b);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        let handle = engine.subscribe(sub, node.clone()).unwrap();

        engine.dispatch(&change(&node, 0, 1, 1));
        engine.unsubscribe(sub, handle).unwrap();
        engine.dispatch(&change(&node, 1, 2, 2));

        assert_eq!(rx.try_recv().unwrap().change.revision, 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.monitor_count(&node), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_handle() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, _rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        let handle = engine.subscribe(sub, node).unwrap();
        engine.unsubscribe(sub, handle).unwrap();

        let err = engine.unsubscribe(sub, handle).unwrap_err();
        assert_eq!(
            err,
            SpaceError::HandleNotFound { subscription: sub, handle }
        );
    }

    #[test]
    fn test_delete_releases_all_handles() {
        let engine = SubscriptionEngine::new();
        let left = NodeId::numeric(2, 2003);
        let right = NodeId::numeric(2, 2004);
        let (tx, rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        engine.subscribe(sub, left.clone()).unwrap();
        engine.subscribe(sub, right.clone()).unwrap();

        engine.delete_subscription(sub).unwrap();

        engine.dispatch(&change(&left, 0, 1, 1));
        engine.dispatch(&change(&right, 0, 1, 1));
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.monitor_count(&left), 0);
        assert_eq!(engine.monitor_count(&right), 0);
        assert!(!engine.is_active(sub));
    }

    #[test]
    fn test_delete_after_manual_unsubscribe() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, _rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        let handle = engine.subscribe(sub, node).unwrap();
        engine.unsubscribe(sub, handle).unwrap();

        // Delete with nothing left to release must still succeed.
        engine.delete_subscription(sub).unwrap();
        let err = engine.delete_subscription(sub).unwrap_err();
        assert_eq!(err, SpaceError::SubscriptionNotFound(sub));
    }

    #[test]
    fn test_subscribe_after_delete_rejected() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, _rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        engine.delete_subscription(sub).unwrap();

        let err = engine.subscribe(sub, node).unwrap_err();
        assert_eq!(err, SpaceError::SubscriptionNotFound(sub));
    }

    #[test]
    fn test_ids_never_reused() {
        let engine = SubscriptionEngine::new();
        let (tx, _rx) = mpsc::channel();
        let first = engine.create_subscription(Duration::from_millis(100), tx.clone());
        engine.delete_subscription(first).unwrap();
        let second = engine.create_subscription(Duration::from_millis(100), tx);
        assert_ne!(first, second);
        assert!(second.raw() > first.raw());
    }

    #[test]
    fn test_disconnected_sink_tolerated() {
        let engine = SubscriptionEngine::new();
        let node = NodeId::numeric(2, 2003);
        let (tx, rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        engine.subscribe(sub, node.clone()).unwrap();
        drop(rx);

        // Must not panic; the registration stays until deleted.
        engine.dispatch(&change(&node, 0, 1, 1));
        engine.delete_subscription(sub).unwrap();
    }

    #[test]
    fn test_sampling_interval_retained() {
        let engine = SubscriptionEngine::new();
        let (tx, _rx) = mpsc::channel();
        let sub = engine.create_subscription(Duration::from_millis(100), tx);
        assert_eq!(
            engine.sampling_interval(sub).unwrap(),
            Duration::from_millis(100)
        );
    }
}
