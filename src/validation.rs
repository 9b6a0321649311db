//! Checks on command line input, run before any request is made.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::matching::is_valid_email;

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}$").expect("DOMAIN_REGEX is a valid regex pattern")
});

/// Tenant group ids are UUIDs.
pub fn validate_group_id(group_id: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(group_id).map_err(|_| ValidationError::GroupId(group_id.to_string()))
}

/// `flag` names the option in the error message.
pub fn validate_domain(flag: &'static str, domain: &str) -> Result<(), ValidationError> {
    if DOMAIN_REGEX.is_match(domain) {
        Ok(())
    } else {
        Err(ValidationError::Domain {
            flag,
            value: domain.to_string(),
        })
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::Email(email.to_string()))
    }
}

pub fn validate_csv_path(path: &Path) -> Result<(), ValidationError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ValidationError::MissingCsv(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_must_be_uuid() {
        assert!(validate_group_id("3f2b1c9e-8a7d-4e6f-9b0a-1c2d3e4f5a6b").is_ok());
        let err = validate_group_id("not-a-uuid").unwrap_err();
        assert_eq!(err.to_string(), "groupID must be a valid UUID: not-a-uuid");
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("domain", "example.com").is_ok());
        assert!(validate_domain("ssoDomain", "sso.example.co.uk").is_ok());
        assert!(validate_domain("domain", "localhost").is_err());
        assert!(validate_domain("domain", "example.c0m").is_err());

        let err = validate_domain("ssoDomain", "bad domain").unwrap_err();
        assert_eq!(err.to_string(), "ssoDomain must be a valid domain name: bad domain");
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice").is_err());
    }

    #[test]
    fn test_csv_path_must_exist() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(validate_csv_path(file.path()).is_ok());

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_csv_path(dir.path()),
            Err(ValidationError::MissingCsv(_))
        ));
    }
}
