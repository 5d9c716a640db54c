//! Audit tables: mapping events to rows.
//!
//! Both table variants share the same row assembly. The repository variant
//! adds an `EVENT SUBJECT` column whose cell is resolved against a directory
//! tree snapshot taken before rendering started.

use auditview_core::{AuditEvent, DirTree, Subject, TimeFormatter};
use serde::{Deserialize, Serialize};

/// One rendered table row, one cell per column
pub type Row = Vec<String>;

/// Table column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column header
    pub name: String,
    /// Maximum width in characters (`None` = unlimited)
    pub max_width: Option<usize>,
}

impl Column {
    /// Create a new column without a maximum width
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_width: None,
        }
    }

    /// Set maximum width
    #[must_use]
    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Errors mapping an event to a row
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// The event's actor is of a kind this client cannot display
    #[error("unknown actor type on audit event {event}")]
    UnknownActor {
        /// Offending event
        event: String,
    },

    /// The event's subject is of a kind this client cannot display
    #[error("unknown subject type on audit event {event}")]
    UnknownSubject {
        /// Offending event
        event: String,
    },

    /// The subject is not part of the directory tree snapshot
    #[error("{kind} {id} not found in directory tree")]
    SubjectNotFound {
        /// Kind of subject (`secret`, `dir`, ...)
        kind: &'static str,
        /// Subject identifier
        id: String,
    },
}

/// Maps audit events to table rows under a fixed column schema
#[derive(Debug, Clone)]
pub struct AuditTable {
    columns: Vec<Column>,
    time_formatter: TimeFormatter,
    /// Present for the repository variant only
    tree: Option<DirTree>,
}

impl AuditTable {
    /// Table for the audit log of a single secret
    #[must_use]
    pub fn for_secret(time_formatter: TimeFormatter) -> Self {
        Self {
            columns: base_columns(None),
            time_formatter,
            tree: None,
        }
    }

    /// Table for the audit log of a repository, resolving subjects in `tree`
    #[must_use]
    pub fn for_repo(tree: DirTree, time_formatter: TimeFormatter) -> Self {
        Self {
            columns: base_columns(Some(Column::new("EVENT SUBJECT"))),
            time_formatter,
            tree: Some(tree),
        }
    }

    /// Column names, in output order
    #[must_use]
    pub fn header(&self) -> Row {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    /// Column definitions, in output order
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Map an event to a row.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] if the actor or subject cannot be displayed;
    /// no partial row is produced.
    pub fn row(&self, event: &AuditEvent) -> Result<Row, MappingError> {
        let subject = match &self.tree {
            Some(tree) => Some(subject_label(event, tree)?),
            None => None,
        };
        self.assemble(event, subject)
    }

    fn assemble(&self, event: &AuditEvent, subject: Option<String>) -> Result<Row, MappingError> {
        let actor = event
            .actor
            .display_name()
            .ok_or_else(|| MappingError::UnknownActor {
                event: event.id.to_string(),
            })?;
        let action = event
            .action_label()
            .ok_or_else(|| MappingError::UnknownSubject {
                event: event.id.to_string(),
            })?;

        let mut row = Vec::with_capacity(self.columns.len());
        row.push(actor.to_string());
        row.push(action);
        row.extend(subject);
        row.push(event.ip_address.clone());
        row.push(self.time_formatter.format(event.logged_at));
        Ok(row)
    }
}

fn base_columns(middle: Option<Column>) -> Vec<Column> {
    let mut columns = vec![
        Column::new("AUTHOR").max_width(32),
        Column::new("EVENT").max_width(22),
    ];
    columns.extend(middle);
    columns.push(Column::new("IP ADDRESS").max_width(45));
    columns.push(Column::new("DATE").max_width(22));
    columns
}

fn subject_label(event: &AuditEvent, tree: &DirTree) -> Result<String, MappingError> {
    let not_found = |kind: &'static str, id: String| MappingError::SubjectNotFound { kind, id };
    match &event.subject {
        Subject::Secret { id } => tree
            .secret_path(*id)
            .ok_or_else(|| not_found("secret", id.to_string())),
        Subject::SecretVersion { id, version } => tree
            .secret_path(*id)
            .map(|path| format!("{}:{}", path, version))
            .ok_or_else(|| not_found("secret", id.to_string())),
        Subject::Dir { id } => tree
            .dir_path(*id)
            .ok_or_else(|| not_found("dir", id.to_string())),
        Subject::Repo => Ok(tree.root_path()),
        Subject::RepoMember { username } => Ok(username.clone()),
        Subject::Service { service_id } => Ok(service_id.clone()),
        Subject::SecretKey => Ok("-".to_string()),
        Subject::Unknown => Err(MappingError::UnknownSubject {
            event: event.id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditview_core::{Action, Actor, DirId, DirNode, SecretId, SecretNode, TreeSnapshot};
    use chrono::{DateTime, TimeZone, Utc};

    fn logged_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(subject: Subject) -> AuditEvent {
        AuditEvent::new(
            Actor::User {
                username: "dev1".to_string(),
                full_name: None,
            },
            Action::Read,
            subject,
            logged_at(),
        )
        .with_ip_address("127.0.0.1")
    }

    fn tree() -> (DirTree, SecretId, DirId) {
        let root = DirId::new();
        let prod = DirId::new();
        let secret = SecretId::new();
        let snapshot = TreeSnapshot {
            namespace: "acme".to_string(),
            root,
            dirs: vec![
                DirNode { id: root, name: "payments".to_string(), parent: None },
                DirNode { id: prod, name: "prod".to_string(), parent: Some(root) },
            ],
            secrets: vec![SecretNode { id: secret, name: "db_password".to_string(), dir: prod }],
        };
        (DirTree::from_snapshot(snapshot).unwrap(), secret, prod)
    }

    fn timestamps() -> TimeFormatter {
        TimeFormatter::new(true)
    }

    #[test]
    fn test_secret_table_header() {
        let table = AuditTable::for_secret(timestamps());
        assert_eq!(table.header(), vec!["AUTHOR", "EVENT", "IP ADDRESS", "DATE"]);
        let widths: Vec<_> = table.columns().iter().map(|c| c.max_width).collect();
        assert_eq!(widths, vec![Some(32), Some(22), Some(45), Some(22)]);
    }

    #[test]
    fn test_repo_table_header() {
        let (tree, _, _) = tree();
        let table = AuditTable::for_repo(tree, timestamps());
        assert_eq!(
            table.header(),
            vec!["AUTHOR", "EVENT", "EVENT SUBJECT", "IP ADDRESS", "DATE"]
        );
        assert_eq!(table.columns()[2].max_width, None);
    }

    #[test]
    fn test_secret_row() {
        let table = AuditTable::for_secret(timestamps());
        let row = table.row(&event(Subject::Secret { id: SecretId::new() })).unwrap();
        assert_eq!(
            row,
            vec!["dev1", "read.secret", "127.0.0.1", "2024-03-01T12:00:00Z"]
        );
    }

    #[test]
    fn test_repo_row_resolves_subject() {
        let (tree, secret, prod) = tree();
        let table = AuditTable::for_repo(tree, timestamps());

        let row = table.row(&event(Subject::Secret { id: secret })).unwrap();
        assert_eq!(row[2], "acme/payments/prod/db_password");
        assert_eq!(row.len(), table.columns().len());

        let row = table
            .row(&event(Subject::SecretVersion { id: secret, version: 4 }))
            .unwrap();
        assert_eq!(row[1], "read.secret_version");
        assert_eq!(row[2], "acme/payments/prod/db_password:4");

        let row = table.row(&event(Subject::Dir { id: prod })).unwrap();
        assert_eq!(row[2], "acme/payments/prod");

        let row = table.row(&event(Subject::Repo)).unwrap();
        assert_eq!(row[2], "acme/payments");

        let row = table
            .row(&event(Subject::RepoMember { username: "dev2".to_string() }))
            .unwrap();
        assert_eq!(row[2], "dev2");

        let row = table.row(&event(Subject::SecretKey)).unwrap();
        assert_eq!(row[2], "-");
    }

    #[test]
    fn test_unresolvable_subject() {
        let (tree, _, _) = tree();
        let table = AuditTable::for_repo(tree, timestamps());
        let err = table
            .row(&event(Subject::Secret { id: SecretId::new() }))
            .unwrap_err();
        assert!(matches!(err, MappingError::SubjectNotFound { kind: "secret", .. }));
    }

    #[test]
    fn test_unknown_actor() {
        let table = AuditTable::for_secret(timestamps());
        let mut event = event(Subject::Repo);
        event.actor = Actor::Unknown;
        let err = table.row(&event).unwrap_err();
        assert!(matches!(err, MappingError::UnknownActor { .. }));
    }

    #[test]
    fn test_unknown_subject() {
        let table = AuditTable::for_secret(timestamps());
        let err = table.row(&event(Subject::Unknown)).unwrap_err();
        assert!(matches!(err, MappingError::UnknownSubject { .. }));
        assert!(err.to_string().contains("unknown subject"));
    }

    #[test]
    fn test_service_actor() {
        let table = AuditTable::for_secret(timestamps());
        let mut event = event(Subject::Repo);
        event.actor = Actor::Service {
            service_id: "s-2PbNoKLzfdBp".to_string(),
        };
        assert_eq!(table.row(&event).unwrap()[0], "s-2PbNoKLzfdBp");
    }
}
