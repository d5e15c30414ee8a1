//! `railgrid-gate` — the access control gate.
//!
//! Decides whether a presented identity may establish a session, and with
//! which role. Policy is injected into the server as an [`AccessGate`]
//! trait object, keeping authentication decoupled from session dispatch.
//!
//! Two policy shapes collapse into the one `role-or-rejected` contract:
//! the credential-table policy ([`CredentialGate`]) and ad-hoc
//! boolean-yielding predicates ([`PredicateGate`]).
//!
//! Secrets are compared as plaintext equality, preserving the configured
//! behavior this server replaces. That is a known weakness (no hashing, no
//! constant-time compare) recorded in DESIGN.md; nothing here logs or
//! echoes a secret.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use railgrid_core::Role;

/// Authentication failure. Deliberately carries no detail: callers must
/// not learn which half of username/secret was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejected;

impl fmt::Display for AuthRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication rejected")
    }
}

impl std::error::Error for AuthRejected {}

/// One configured account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub secret: String,
    pub role: Role,
}

/// Username -> credential map, set once from external configuration and
/// read-only at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialTable {
    users: HashMap<String, Credential>,
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(username, secret)` pairs, all as `Operator`
    /// (the write-capable default for configured accounts).
    pub fn from_pairs<I, U, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, S)>,
        U: Into<String>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (user, secret) in pairs {
            table.insert(user, secret);
        }
        table
    }

    /// Add an `Operator` account.
    pub fn insert(&mut self, username: impl Into<String>, secret: impl Into<String>) {
        self.insert_with_role(username, secret, Role::Operator);
    }

    /// Add an account with an explicit role.
    pub fn insert_with_role(
        &mut self,
        username: impl Into<String>,
        secret: impl Into<String>,
        role: Role,
    ) {
        self.users
            .insert(username.into(), Credential { secret: secret.into(), role });
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    fn lookup(&self, username: &str, secret: &str) -> Option<Role> {
        self.users
            .get(username)
            .filter(|cred| cred.secret == secret)
            .map(|cred| cred.role)
    }
}

/// The capability-providing component consulted once per inbound session.
///
/// Implementations must be cheap and side-effect free; the granted role is
/// cached on the session, there is no token issuance or expiry.
pub trait AccessGate: Send + Sync {
    /// Decide whether the presented identity may connect, and as what.
    fn authenticate(
        &self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<Role, AuthRejected>;
}

/// The credential-table policy.
///
/// With a non-empty table, only an exact username+secret match is admitted
/// (with that record's role); anything else (unknown user, wrong secret,
/// anonymous attempt) is rejected. With no table at all, every attempt
/// including anonymous is admitted with the write-capable
/// [`Role::Anonymous`], mirroring the open-access policy exactly.
pub struct CredentialGate {
    table: Option<CredentialTable>,
}

impl CredentialGate {
    /// Gate with configured accounts. An empty table behaves like
    /// [`CredentialGate::open`].
    pub fn with_table(table: CredentialTable) -> Self {
        let table = if table.is_empty() { None } else { Some(table) };
        Self { table }
    }

    /// Open-access gate: no accounts configured, anonymous allowed.
    pub fn open() -> Self {
        Self { table: None }
    }

    /// Whether this gate admits anonymous sessions.
    pub fn is_open(&self) -> bool {
        self.table.is_none()
    }
}

impl AccessGate for CredentialGate {
    fn authenticate(
        &self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<Role, AuthRejected> {
        let Some(table) = &self.table else {
            return Ok(Role::Anonymous);
        };
        let (Some(username), Some(secret)) = (username, secret) else {
            log::warn!("anonymous session rejected: credentials are configured");
            return Err(AuthRejected);
        };
        match table.lookup(username, secret) {
            Some(role) => {
                log::info!("user '{username}' authenticated as {role}");
                Ok(role)
            }
            None => {
                log::warn!("user '{username}' authentication failed");
                Err(AuthRejected)
            }
        }
    }
}

/// Adapter for boolean-yielding policies: the predicate's `true` maps to
/// the write-capable [`Role::Operator`]; everything else, anonymous
/// attempts included, rejects. Collapses ad-hoc yes/no user checks into
/// the same role-or-rejected contract as [`CredentialGate`].
pub struct PredicateGate<F> {
    check: F,
}

impl<F> PredicateGate<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

impl<F> AccessGate for PredicateGate<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn authenticate(
        &self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<Role, AuthRejected> {
        match (username, secret) {
            (Some(username), Some(secret)) if (self.check)(username, secret) => {
                Ok(Role::Operator)
            }
            _ => Err(AuthRejected),
        }
    }
}
