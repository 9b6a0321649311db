//! Domain and wire shapes exchanged with the directory API.
//!
//! The directory speaks JSON:API: collections arrive as `{data, links}` pages,
//! identities carry their profile under `attributes`, and memberships carry
//! typed pointers to other resources under `relationships`. The domain types
//! here flatten those documents into what matching and reconciliation need.

pub mod identity;
pub mod membership;
pub mod page;

pub use identity::{Identity, SsoConnection};
pub use membership::{
    GroupMembership, MembershipDocument, OrgMembership, Ref, RoleUpdateDocument,
    GROUP_MEMBERSHIP_TYPE, ORG_MEMBERSHIP_TYPE, USER_TYPE,
};
pub use page::{Links, Page};
