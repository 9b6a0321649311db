//! Membership reconciliation for SSO migrations.
//!
//! When a tenant moves to single sign-on, every person ends up with two
//! identities in the directory: the *source* identity on the old domain, which
//! holds the group role and org memberships, and a freshly *provisioned*
//! identity on the SSO domain, which holds only defaults. This crate finds each
//! source identity's provisioned counterpart and copies the group role and the
//! full set of org memberships across.
//!
//! # Core Components
//!
//! - [`transport`] - rate-limited, retrying egress to the directory API
//! - [`pagination`] - link-following collection fetches
//! - [`DirectoryClient`] - typed directory operations
//! - [`matching`] - source-domain and counterpart predicates
//! - [`MembershipReconciler`] - the scan / match / apply engine
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sso_membership::{ApiConfig, DirectoryClient, HttpTransport, MembershipReconciler};
//! use sso_membership::config::{MatchingPolicy, ReconcileConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&ApiConfig::from_env()?)?;
//! let client = DirectoryClient::new(transport);
//! let config = ReconcileConfig::new("example.com", "sso.example.com", MatchingPolicy::default());
//!
//! let summary = MembershipReconciler::new(&client, &config)
//!     .run_for_group("3f2b1c9e-8a7d-4e6f-9b0a-1c2d3e4f5a6b")
//!     .await?;
//! log::info!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod matching;
pub mod model;
pub mod pagination;
pub mod reconcile;
pub mod selection;
pub mod transport;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::{ApiConfig, MatchingPolicy, ReconcileConfig};
pub use directory::{DirectoryClient, WriteOutcome};
pub use error::{
    ConfigError, DirectoryError, DirectoryResult, FetchError, ReconcileError, TransportError,
    ValidationError,
};
pub use model::{GroupMembership, Identity, OrgMembership, Ref, SsoConnection};
pub use reconcile::{CorrespondenceRecord, MembershipReconciler, ReconcileSummary};
pub use transport::{DirectoryTransport, HttpTransport, InMemoryDirectory};
