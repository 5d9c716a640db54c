//! Audit event records.
//!
//! Events are produced by an event source and only ever read by the
//! rendering pipeline.

use crate::id::{DirId, EventId, SecretId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action an actor performed on a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Entity was created
    Create,
    /// Entity was read
    Read,
    /// Entity was modified
    Update,
    /// Entity was deleted
    Delete,
}

impl Action {
    /// Wire name, e.g. `read`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account that performed the audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    /// A human account
    User {
        /// Account username
        username: String,
        /// Display name, if the account has one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_name: Option<String>,
    },
    /// A service account
    Service {
        /// Service identifier, e.g. `s-2PbNoKLzfdBp`
        service_id: String,
    },
    /// An actor kind this client does not know about
    #[serde(other)]
    Unknown,
}

impl Actor {
    /// Name shown in the AUTHOR column, `None` for unknown actors
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::User { username, .. } => Some(username),
            Self::Service { service_id } => Some(service_id),
            Self::Unknown => None,
        }
    }
}

/// Entity the audited action was performed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    /// A secret
    Secret {
        /// Secret the action touched
        id: SecretId,
    },
    /// One version of a secret
    SecretVersion {
        /// Secret the version belongs to
        id: SecretId,
        /// Version number
        version: u32,
    },
    /// The repository's secret key
    SecretKey,
    /// A directory
    Dir {
        /// Directory the action touched
        id: DirId,
    },
    /// The repository itself
    Repo,
    /// Membership of an account in the repository
    RepoMember {
        /// Member's username
        username: String,
    },
    /// A service account of the repository
    Service {
        /// Service identifier
        service_id: String,
    },
    /// A subject kind this client does not know about
    #[serde(other)]
    Unknown,
}

impl Subject {
    /// Wire name of the subject kind, used in event labels
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Secret { .. } => "secret",
            Self::SecretVersion { .. } => "secret_version",
            Self::SecretKey => "secret_key",
            Self::Dir { .. } => "dir",
            Self::Repo => "repo",
            Self::RepoMember { .. } => "repo_member",
            Self::Service { .. } => "service",
            Self::Unknown => "unknown",
        }
    }
}

/// A single audit log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier, generated if the record has none
    #[serde(default)]
    pub id: EventId,
    /// Who performed the action
    pub actor: Actor,
    /// What was done
    pub action: Action,
    /// What it was done to
    pub subject: Subject,
    /// Origin address of the request
    #[serde(default)]
    pub ip_address: String,
    /// When the action was logged
    pub logged_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event with a fresh id and no address
    #[must_use]
    pub fn new(actor: Actor, action: Action, subject: Subject, logged_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            actor,
            action,
            subject,
            ip_address: String::new(),
            logged_at,
        }
    }

    /// Set the origin address
    #[must_use]
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self
    }

    /// Label for the EVENT column, e.g. `read.secret`.
    ///
    /// `None` when the subject kind is unknown.
    pub fn action_label(&self) -> Option<String> {
        match self.subject {
            Subject::Unknown => None,
            ref subject => Some(format!("{}.{}", self.action, subject.kind())),
        }
    }
}
