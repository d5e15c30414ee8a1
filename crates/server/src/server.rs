//! The server façade: composition root and lifecycle owner.
//!
//! `Server::start` assembles the address space, subscription engine, and
//! access gate; `run` blocks until cooperative cancellation; `shutdown`
//! tears every live subscription down before the space is released. The
//! teardown also runs from `Drop`, so every exit path reaches it.
//!
//! There is no global state: each `Server` instance is fully independent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use uuid::Uuid;

use railgrid_core::{NodeClass, NodeId, Role, Value};
use railgrid_engine::{AddressSpace, SpaceError, SubscriptionEngine};
use railgrid_gate::{AccessGate, CredentialGate};

use crate::config::{EndpointConfig, ServerConfig};
use crate::error::RequestError;
use crate::layout::{build_railway, RailwayNodes};
use crate::session::Session;

struct Lifecycle {
    stopping: bool,
    torn_down: bool,
}

/// Shared state behind every session and handle.
pub(crate) struct Core {
    /// Store-wide ordering lock. Writes mutate and notify under this lock,
    /// which yields the per-node revision-ordered notification stream.
    pub(crate) space: Mutex<AddressSpace>,
    pub(crate) subs: SubscriptionEngine,
    pub(crate) gate: Box<dyn AccessGate>,
    pub(crate) namespace: u16,
    pub(crate) nodes: RailwayNodes,
    pub(crate) endpoint: EndpointConfig,
    stopped: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_cv: Condvar,
}

impl Core {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn read_value(&self, node: &NodeId) -> Result<Value, SpaceError> {
        self.space.lock().unwrap().read_value(node)
    }

    pub(crate) fn revision(&self, node: &NodeId) -> Result<u64, SpaceError> {
        self.space.lock().unwrap().revision(node)
    }

    pub(crate) fn write_value(
        &self,
        node: &NodeId,
        value: Value,
        role: Role,
    ) -> Result<u64, SpaceError> {
        // The change hook dispatches to the subscription engine inside
        // write_value, before this lock is released.
        self.space.lock().unwrap().write_value(node, value, role)
    }

    /// Subscription targets must be existing variable nodes.
    pub(crate) fn ensure_variable(&self, node: &NodeId) -> Result<(), SpaceError> {
        let space = self.space.lock().unwrap();
        match space.node(node) {
            Some(n) if n.class() == NodeClass::Variable => Ok(()),
            _ => Err(SpaceError::NodeNotFound(node.clone())),
        }
    }

    fn signal_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut lifecycle = self.lifecycle.lock().unwrap();
        lifecycle.stopping = true;
        self.lifecycle_cv.notify_all();
    }

    /// Release every live subscription. Runs to completion exactly once;
    /// concurrent callers block until the first finishes.
    fn teardown(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if lifecycle.torn_down {
            return;
        }
        let live = self.subs.active_ids();
        for sub in &live {
            if let Err(e) = self.subs.delete_subscription(*sub) {
                log::debug!("teardown: {sub} already gone ({e})");
            }
        }
        lifecycle.torn_down = true;
        log::info!("server stopped ({} subscription(s) released)", live.len());
    }
}

/// Cloneable handle for tripping cancellation from another thread (for
/// example a signal handler). `run` wakes up, performs teardown, and
/// returns.
#[derive(Clone)]
pub struct ShutdownHandle {
    core: Arc<Core>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.core.signal_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }
}

/// A running in-process server instance.
pub struct Server {
    core: Arc<Core>,
    instance_id: Uuid,
}

impl Server {
    /// Register the namespace, build the railway address space, and wire
    /// the access gate. Construction errors are fatal: the server must not
    /// come up with a malformed address space.
    pub fn start(config: ServerConfig) -> Result<Server, SpaceError> {
        let mut space = AddressSpace::new();
        let namespace = space.register_namespace(config.namespace_uri());
        let nodes = build_railway(&mut space, namespace)?;

        let subs = SubscriptionEngine::new();
        let hook_subs = subs.clone();
        space.set_change_hook(Box::new(move |change| hook_subs.dispatch(change)));

        let gate: Box<dyn AccessGate> = match config.credentials {
            Some(table) => Box::new(CredentialGate::with_table(table)),
            None => Box::new(CredentialGate::open()),
        };

        let endpoint = config.endpoint;
        let server = Server {
            core: Arc::new(Core {
                space: Mutex::new(space),
                subs,
                gate,
                namespace,
                nodes,
                endpoint,
                stopped: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle { stopping: false, torn_down: false }),
                lifecycle_cv: Condvar::new(),
            }),
            instance_id: Uuid::new_v4(),
        };

        log::info!(
            "server '{}' ready at {} (instance {})",
            server.core.endpoint.server_name,
            server.core.endpoint.endpoint_url(),
            server.instance_id
        );
        Ok(server)
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.core.endpoint
    }

    /// Index the application namespace was registered at.
    pub fn namespace_index(&self) -> u16 {
        self.core.namespace
    }

    /// Ids of the fixed railway nodes.
    pub fn nodes(&self) -> &RailwayNodes {
        &self.core.nodes
    }

    /// Establish a session for an inbound connection. Consults the gate
    /// once; the granted role is cached on the session. Rejection is never
    /// fatal: the server keeps accepting other attempts.
    pub fn connect(
        &self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<Session, RequestError> {
        if self.core.is_stopped() {
            return Err(RequestError::ServerStopped);
        }
        let role = self.core.gate.authenticate(username, secret)?;
        Ok(Session::new(
            Arc::clone(&self.core),
            username.map(str::to_string),
            role,
        ))
    }

    /// Trusted session for the hosting process itself, bypassing the gate.
    pub fn local_session(&self) -> Result<Session, RequestError> {
        if self.core.is_stopped() {
            return Err(RequestError::ServerStopped);
        }
        Ok(Session::new(Arc::clone(&self.core), None, Role::Operator))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { core: Arc::clone(&self.core) }
    }

    pub fn is_running(&self) -> bool {
        !self.core.is_stopped()
    }

    /// Block the calling thread until cancellation is signalled, then run
    /// teardown and return. Individual session operations proceed from
    /// other threads while this waits.
    pub fn run(&self) {
        let mut lifecycle = self.core.lifecycle.lock().unwrap();
        while !lifecycle.stopping {
            lifecycle = self.core.lifecycle_cv.wait(lifecycle).unwrap();
        }
        drop(lifecycle);
        self.core.teardown();
    }

    /// Signal cancellation and run teardown inline. Idempotent; once
    /// teardown has begun it always runs to completion.
    pub fn shutdown(&self) {
        self.core.signal_stop();
        self.core.teardown();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
