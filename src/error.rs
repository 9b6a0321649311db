//! Error types for directory reconciliation.
//!
//! Errors are layered the same way the calls are layered:
//!
//! - [`TransportError`] - a single HTTP exchange failed (after retries) or the
//!   remote answered with a status of 400 or above
//! - [`DirectoryError`] - a typed directory call failed, either in transport or
//!   while encoding/decoding the JSON:API documents
//! - [`FetchError`] - fatal; the scan phase could not read the state it needs
//! - [`ReconcileError`] - non-fatal; one apply sub-step failed for one identity
//!
//! A `409 Conflict` on a write is not an error at all: the directory already
//! holds the requested state, so it surfaces as
//! [`WriteOutcome::Conflict`](crate::directory::WriteOutcome).

use thiserror::Error;

/// Failure of a single request against the directory API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure that survived every retry attempt.
    #[error("failed to {method} {path}: {source}")]
    Network {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The directory answered with a client or server error status.
    #[error("failed to {method} {path}: {status}")]
    Remote {
        status: u16,
        method: String,
        path: String,
    },

    /// The request path could not be resolved against the API base URL.
    #[error("invalid request url for {path}: {message}")]
    InvalidUrl { path: String, message: String },
}

impl TransportError {
    /// HTTP status of a remote error, if the directory answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the directory reported `409 Conflict`.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Failure of a typed directory operation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body was not the document we expected.
    #[error("unable to decode response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request document could not be serialized.
    #[error("unable to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The tenant has no SSO connection to list identities from.
    #[error("unable to get SSO connection on group: {group_id}")]
    NoSsoConnection { group_id: String },
}

impl DirectoryError {
    /// Whether the underlying transport failure was a `409 Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_conflict())
    }
}

/// Fatal failure while gathering the state a reconciliation run depends on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unable to fetch identities of group {group_id}")]
    Identities {
        group_id: String,
        #[source]
        source: DirectoryError,
    },

    #[error("unable to fetch group memberships of user {user}")]
    GroupMemberships {
        user: String,
        #[source]
        source: DirectoryError,
    },

    #[error("unable to fetch org memberships of user {user}")]
    OrgMemberships {
        user: String,
        #[source]
        source: DirectoryError,
    },
}

/// Non-fatal failure of one apply sub-step for one provisioned identity.
///
/// These are logged and counted, never propagated out of the engine.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to update group membership of user {user}, group {group}: {source}")]
    GroupRoleUpdate {
        user: String,
        group: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to create group membership of user {user}, group {group}: {source}")]
    GroupMembershipCreate {
        user: String,
        group: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to get org memberships of user {user}: {source}")]
    OrgSnapshot {
        user: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to delete org membership of user {user}, org {org}: {source}")]
    OrgMembershipDelete {
        user: String,
        org: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to create org membership of user {user}, org {org}: {source}")]
    OrgMembershipCreate {
        user: String,
        org: String,
        #[source]
        source: DirectoryError,
    },
}

/// Invalid or incomplete API configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("you need to set the {0} environment variable")]
    MissingEnv(&'static str),

    #[error("{name} must be a boolean, got '{value}'")]
    InvalidBool { name: &'static str, value: String },

    #[error("invalid base url '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Invalid command line input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("groupID must be a valid UUID: {0}")]
    GroupId(String),

    #[error("{flag} must be a valid domain name: {value}")]
    Domain { flag: &'static str, value: String },

    #[error("email must be a valid email address: {0}")]
    Email(String),

    #[error("csvFile does not exist: {0}")]
    MissingCsv(String),

    #[error("CSV file is empty")]
    EmptyCsv,

    #[error("failed to read CSV file {path}: {source}")]
    CsvIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to set up run logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("logger already initialized: {0}")]
    AlreadyInitialized(#[from] log::SetLoggerError),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
