//! Authenticated sessions over the address-space core.
//!
//! A `Session` is what the transport layer drives per connected client.
//! The role decided at connect time is cached here; every write re-checks
//! it against the target variable. Subscriptions belong to exactly one
//! session; when the session closes, explicitly or by drop, they are
//! deleted and every handle is released.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use railgrid_core::{NodeId, Role, Value};
use railgrid_engine::{MonitorHandle, Notification, SpaceError, SubscriptionId};

use crate::error::RequestError;
use crate::server::Core;

pub struct Session {
    core: Arc<Core>,
    id: Uuid,
    username: Option<String>,
    role: Role,
    /// Subscriptions this session created and still owns.
    owned: Mutex<Vec<SubscriptionId>>,
    closed: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish()
    }
}

impl Session {
    pub(crate) fn new(core: Arc<Core>, username: Option<String>, role: Role) -> Self {
        let id = Uuid::new_v4();
        log::debug!(
            "session {id} opened for {} as {role}",
            username.as_deref().unwrap_or("<anonymous>")
        );
        Self {
            core,
            id,
            username,
            role,
            owned: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The role granted at connect time.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Read a variable's current value.
    pub fn read(&self, node: &NodeId) -> Result<Value, RequestError> {
        self.ensure_serving()?;
        Ok(self.core.read_value(node)?)
    }

    /// Read a variable's revision counter.
    pub fn revision(&self, node: &NodeId) -> Result<u64, RequestError> {
        self.ensure_serving()?;
        Ok(self.core.revision(node)?)
    }

    /// Write a variable. Returns the new revision; subscribers have been
    /// notified by the time this returns.
    pub fn write(&self, node: &NodeId, value: Value) -> Result<u64, RequestError> {
        self.ensure_serving()?;
        Ok(self.core.write_value(node, value, self.role)?)
    }

    /// Create a subscription owned by this session. The receiver yields
    /// notifications in per-node revision order.
    pub fn create_subscription(
        &self,
        sampling_interval: Duration,
    ) -> Result<(SubscriptionId, Receiver<Notification>), RequestError> {
        self.ensure_serving()?;
        let (tx, rx) = mpsc::channel();
        let sub = self.core.subs.create_subscription(sampling_interval, tx);
        self.owned.lock().unwrap().push(sub);
        Ok((sub, rx))
    }

    /// Register a data-change monitor on a variable node.
    pub fn subscribe(
        &self,
        sub: SubscriptionId,
        node: &NodeId,
    ) -> Result<MonitorHandle, RequestError> {
        self.ensure_serving()?;
        self.ensure_owned(sub)?;
        self.core.ensure_variable(node)?;
        Ok(self.core.subs.subscribe(sub, node.clone())?)
    }

    /// Remove one monitor. No further notifications for the handle arrive
    /// after this returns.
    pub fn unsubscribe(
        &self,
        sub: SubscriptionId,
        handle: MonitorHandle,
    ) -> Result<(), RequestError> {
        self.ensure_serving()?;
        self.ensure_owned(sub)?;
        Ok(self.core.subs.unsubscribe(sub, handle)?)
    }

    /// Delete a subscription, releasing all remaining handles.
    pub fn delete_subscription(&self, sub: SubscriptionId) -> Result<(), RequestError> {
        self.ensure_serving()?;
        self.ensure_owned(sub)?;
        self.core.subs.delete_subscription(sub)?;
        self.owned.lock().unwrap().retain(|s| *s != sub);
        Ok(())
    }

    /// Tear down everything this session owns. Idempotent; also runs on
    /// drop, covering implicit disconnects.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let owned: Vec<SubscriptionId> = std::mem::take(&mut *self.owned.lock().unwrap());
        for sub in owned {
            // Server teardown may have released it first.
            let _ = self.core.subs.delete_subscription(sub);
        }
        log::debug!("session {} closed", self.id);
    }

    fn ensure_serving(&self) -> Result<(), RequestError> {
        if self.core.is_stopped() {
            return Err(RequestError::ServerStopped);
        }
        Ok(())
    }

    /// Subscriptions are never shared across sessions; a foreign id is
    /// indistinguishable from an unknown one.
    fn ensure_owned(&self, sub: SubscriptionId) -> Result<(), RequestError> {
        if self.owned.lock().unwrap().contains(&sub) {
            Ok(())
        } else {
            Err(SpaceError::SubscriptionNotFound(sub).into())
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
