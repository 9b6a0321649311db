//! Membership reconciliation between source and provisioned identities.
//!
//! A run is stateless: every invocation recomputes the correspondence between
//! source-domain identities and their SSO-provisioned counterparts from the
//! directory, then brings each counterpart's memberships in line with its
//! source.
//!
//! ```rust,no_run
//! use sso_membership::config::{MatchingPolicy, ReconcileConfig};
//! use sso_membership::directory::DirectoryClient;
//! use sso_membership::reconcile::MembershipReconciler;
//! use sso_membership::transport::InMemoryDirectory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DirectoryClient::new(InMemoryDirectory::new());
//! let config = ReconcileConfig::new("example.com", "sso.example.com", MatchingPolicy::default());
//!
//! let summary = MembershipReconciler::new(&client, &config)
//!     .run_for_group("3f2b1c9e-8a7d-4e6f-9b0a-1c2d3e4f5a6b")
//!     .await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod record;
pub mod summary;

pub use engine::MembershipReconciler;
pub use record::{CorrespondenceMap, CorrespondenceRecord, ProvisionedCounterpart};
pub use summary::ReconcileSummary;
