//! Identity matching policy.
//!
//! Pure predicates over [`Identity`] values. Two switches from
//! [`MatchingPolicy`] decide which attribute is consulted on each side:
//!
//! | switch                 | `false`                                   | `true`                         |
//! |------------------------|-------------------------------------------|--------------------------------|
//! | `match_by_username`    | email ends with `@domain` (and the username is a valid email) | username ends with `@domain` |
//! | `match_to_local_part`  | email equals `local@sso_domain`           | username equals `local`        |
//!
//! Absent attributes never match anything, and an absent attribute is not the
//! same as an empty one.
//!
//! Matching is first-match-wins in collection order. [`find_counterpart`] also
//! reports how many candidates matched so callers can surface ambiguity.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::{MatchingPolicy, ReconcileConfig};
use crate::model::Identity;

/// RFC 5322 addr-spec (dot-atom local part), as accepted by common mail
/// parsers. Single-label domains such as `bob@anything` are valid.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*$",
    )
    .expect("EMAIL_REGEX is a valid regex pattern")
});

/// Maximum allowed email length (RFC 5321).
const MAX_EMAIL_LENGTH: usize = 254;

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= MAX_EMAIL_LENGTH && EMAIL_REGEX.is_match(value)
}

/// Substring before the first `@`, if there is a non-empty one.
pub fn local_part(key: &str) -> Option<&str> {
    key.split_once('@')
        .map(|(local, _)| local)
        .filter(|local| !local.is_empty())
}

/// Email the counterpart of `key` is expected to carry on the SSO domain.
///
/// `None` when `key` is not a valid email or no SSO domain is configured.
pub fn provisioned_email(key: &str, sso_domain: &str) -> Option<String> {
    if sso_domain.is_empty() || !is_valid_email(key) {
        return None;
    }
    local_part(key).map(|local| format!("{local}@{sso_domain}"))
}

/// Attribute an identity is keyed by: username or email, per policy.
pub fn matching_key(identity: &Identity, policy: MatchingPolicy) -> Option<&str> {
    if policy.match_by_username {
        identity.username.as_deref()
    } else {
        identity.email.as_deref()
    }
}

/// Whether `identity` belongs to the pre-migration `domain`.
///
/// When matching by email, the username must itself be a valid email address.
/// Directories whose usernames are not emails would otherwise produce spurious
/// local-part matches later.
pub fn is_source_identity(identity: &Identity, domain: &str, match_by_username: bool) -> bool {
    if domain.is_empty() {
        return false;
    }
    let suffix = format!("@{domain}");

    if match_by_username {
        identity
            .username
            .as_deref()
            .is_some_and(|username| username.ends_with(&suffix))
    } else {
        identity
            .email
            .as_deref()
            .is_some_and(|email| email.ends_with(&suffix))
            && identity.username.as_deref().is_some_and(is_valid_email)
    }
}

/// Whether `identity` is the provisioned counterpart described by the
/// expected local part or expected email.
pub fn is_destination_identity(
    identity: &Identity,
    local_part: Option<&str>,
    provisioned_email: Option<&str>,
    match_to_local_part: bool,
) -> bool {
    let (candidate, expected) = if match_to_local_part {
        (identity.username.as_deref(), local_part)
    } else {
        (identity.email.as_deref(), provisioned_email)
    };
    matches!((candidate, expected), (Some(candidate), Some(expected)) if candidate == expected)
}

/// Identifier a counterpart of `key` is looked up by, for log lines.
pub fn counterpart_identifier(key: &str, config: &ReconcileConfig) -> Option<String> {
    if config.policy.match_to_local_part {
        local_part(key).map(str::to_string)
    } else {
        provisioned_email(key, &config.sso_domain)
    }
}

/// The first provisioned identity matching a source key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterpart<'a> {
    pub identity: &'a Identity,
    /// Number of identities in the collection that matched. Above 1 means the
    /// choice was ambiguous.
    pub candidates: usize,
}

impl Counterpart<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Find the provisioned counterpart of the source identity keyed by `key`.
///
/// The identity with id `source_id` is never a candidate, so a source that
/// already carries its SSO email cannot shadow the real counterpart.
pub fn find_counterpart<'a>(
    key: &str,
    source_id: Option<&str>,
    identities: &'a [Identity],
    config: &ReconcileConfig,
) -> Option<Counterpart<'a>> {
    let local = local_part(key);
    let email = provisioned_email(key, &config.sso_domain);
    let match_to_local_part = config.policy.match_to_local_part;

    let mut matches = identities.iter().filter(|identity| {
        source_id != Some(identity.id.as_str())
            && is_destination_identity(identity, local, email.as_deref(), match_to_local_part)
    });

    let first = matches.next()?;
    Some(Counterpart {
        identity: first,
        candidates: 1 + matches.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(match_by_username: bool, match_to_local_part: bool) -> ReconcileConfig {
        ReconcileConfig::new(
            "example.com",
            "sso.example.com",
            MatchingPolicy::new(match_by_username, match_to_local_part),
        )
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(is_valid_email("bob@anything"));
        assert!(!is_valid_email("bob"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("a..b@example.com"));
        assert!(!is_valid_email("alice@exa mple.com"));
    }

    #[test]
    fn test_local_part_and_provisioned_email() {
        assert_eq!(local_part("alice@example.com"), Some("alice"));
        assert_eq!(local_part("bob@anything"), Some("bob"));
        assert_eq!(local_part("no-at-sign"), None);
        assert_eq!(local_part("@example.com"), None);

        assert_eq!(
            provisioned_email("alice@example.com", "sso.example.com").as_deref(),
            Some("alice@sso.example.com")
        );
        assert_eq!(provisioned_email("alice@example.com", ""), None);
        assert_eq!(provisioned_email("not an email@x", "sso.example.com"), None);
    }

    #[test]
    fn test_source_by_email_requires_valid_username() {
        let valid = Identity::new("u1")
            .with_email("alice@example.com")
            .with_username("alice@example.com");
        assert!(is_source_identity(&valid, "example.com", false));

        let opaque_username = Identity::new("u2")
            .with_email("bob@example.com")
            .with_username("bob");
        assert!(!is_source_identity(&opaque_username, "example.com", false));

        let no_username = Identity::new("u3").with_email("carol@example.com");
        assert!(!is_source_identity(&no_username, "example.com", false));
    }

    #[test]
    fn test_source_by_username() {
        let identity = Identity::new("u1").with_username("bob@example.com");
        assert!(is_source_identity(&identity, "example.com", true));
        assert!(!is_source_identity(&identity, "example.com", false));
    }

    #[test]
    fn test_source_domain_is_anchored_at_at_sign() {
        let provisioned = Identity::new("u1")
            .with_email("alice@sso.example.com")
            .with_username("alice@sso.example.com");
        assert!(!is_source_identity(&provisioned, "example.com", false));
        assert!(is_source_identity(&provisioned, "sso.example.com", false));
        assert!(!is_source_identity(&provisioned, "", false));
    }

    #[test]
    fn test_destination_predicates() {
        let identity = Identity::new("p1")
            .with_email("alice@sso.example.com")
            .with_username("alice");

        assert!(is_destination_identity(&identity, None, Some("alice@sso.example.com"), false));
        assert!(!is_destination_identity(&identity, Some("alice"), None, false));
        assert!(is_destination_identity(&identity, Some("alice"), None, true));
        assert!(!is_destination_identity(&Identity::new("p2"), Some("alice"), None, true));
    }

    #[test]
    fn test_match_to_local_part_ignores_email() {
        let identities = vec![
            Identity::new("src").with_username("bob@anything"),
            Identity::new("dst")
                .with_username("bob")
                .with_email("unrelated@elsewhere.org"),
        ];
        let found = find_counterpart("bob@anything", Some("src"), &identities, &config(true, true)).unwrap();
        assert_eq!(found.identity.id, "dst");
        assert!(!found.is_ambiguous());
    }

    #[test]
    fn test_first_match_wins_and_counts_candidates() {
        let identities = vec![
            Identity::new("a").with_email("alice@example.com"),
            Identity::new("p1").with_email("alice@sso.example.com"),
            Identity::new("p2").with_email("alice@sso.example.com"),
        ];
        let found = find_counterpart("alice@example.com", Some("a"), &identities, &config(false, false)).unwrap();
        assert_eq!(found.identity.id, "p1");
        assert_eq!(found.candidates, 2);
        assert!(found.is_ambiguous());

        assert!(find_counterpart("zed@example.com", None, &identities, &config(false, false)).is_none());
    }

    #[test]
    fn test_source_identity_is_never_its_own_counterpart() {
        let identities = vec![
            Identity::new("src")
                .with_username("alice@example.com")
                .with_email("alice@sso.example.com"),
            Identity::new("dst").with_email("alice@sso.example.com"),
        ];
        let found =
            find_counterpart("alice@example.com", Some("src"), &identities, &config(true, false))
                .unwrap();
        assert_eq!(found.identity.id, "dst");
        assert_eq!(found.candidates, 1);

        let only_source = &identities[..1];
        assert!(
            find_counterpart("alice@example.com", Some("src"), only_source, &config(true, false))
                .is_none()
        );
    }

    #[test]
    fn test_counterpart_identifier_per_policy() {
        assert_eq!(
            counterpart_identifier("alice@example.com", &config(false, false)).as_deref(),
            Some("alice@sso.example.com")
        );
        assert_eq!(
            counterpart_identifier("alice@example.com", &config(false, true)).as_deref(),
            Some("alice")
        );
    }
}
