//! Narrowing the tenant's identities down to the ones a command acts on.
//!
//! Identities are selected by their *profile id*: the username when matching
//! by username and the identity has one, the email otherwise.

use log::{error, info, warn};
use std::io::Write;
use std::path::Path;

use crate::config::ReconcileConfig;
use crate::error::ValidationError;
use crate::matching::{
    counterpart_identifier, is_destination_identity, local_part, provisioned_email,
};
use crate::model::Identity;

/// Header of the identity listing written by `get-users`.
pub const IDENTITY_CSV_HEADER: [&str; 4] = ["username", "email", "name", "active"];

/// Username or email an identity is selected by.
pub fn profile_id(identity: &Identity, match_by_username: bool) -> Option<&str> {
    match (match_by_username, identity.username.as_deref()) {
        (true, Some(username)) => Some(username),
        _ => identity.email.as_deref(),
    }
}

/// Identities whose profile id ends with `@domain`.
pub fn filter_by_domain(
    identities: &[Identity],
    domain: &str,
    match_by_username: bool,
) -> Vec<Identity> {
    let suffix = format!("@{domain}");
    let selected: Vec<Identity> = identities
        .iter()
        .filter(|identity| {
            !domain.is_empty()
                && profile_id(identity, match_by_username).is_some_and(|id| id.ends_with(&suffix))
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        warn!("No users found matching domain: {}", domain);
    } else {
        info!("Filtered {} users matching domain: {}", selected.len(), domain);
    }
    selected
}

/// The first identity matching each identifier, in identifier order.
pub fn filter_by_identifiers(
    identifiers: &[String],
    identities: &[Identity],
    match_by_username: bool,
) -> Vec<Identity> {
    let selected: Vec<Identity> = identifiers
        .iter()
        .filter(|identifier| !identifier.is_empty())
        .filter_map(|identifier| {
            identities
                .iter()
                .find(|identity| profile_id(identity, match_by_username) == Some(identifier.as_str()))
                .cloned()
        })
        .collect();

    if selected.is_empty() {
        warn!("No users found matching identifiers: {:?}", identifiers);
    } else {
        info!("Filtered {} users matching identifiers", selected.len());
    }
    selected
}

/// Each listed source identity together with its provisioned counterpart.
///
/// At most two identities are kept per identifier. A warning names every
/// identifier for which fewer than two were found.
pub fn filter_with_counterparts(
    identifiers: &[String],
    identities: &[Identity],
    config: &ReconcileConfig,
) -> Vec<Identity> {
    let policy = config.policy;
    let mut selected = Vec::new();

    for identifier in identifiers {
        if identifier.is_empty() {
            continue;
        }
        let local = local_part(identifier);
        let email = provisioned_email(identifier, &config.sso_domain);
        if local.is_none() {
            error!("Invalid email address format: {}", identifier);
        }

        let found: Vec<&Identity> = identities
            .iter()
            .filter(|identity| {
                profile_id(identity, policy.match_by_username) == Some(identifier.as_str())
                    || is_destination_identity(
                        identity,
                        local,
                        email.as_deref(),
                        policy.match_to_local_part,
                    )
            })
            .take(2)
            .collect();

        if found.len() < 2 {
            warn!(
                "Email {} not found in SSO with a corresponding User: {}",
                identifier,
                counterpart_identifier(identifier, config)
                    .as_deref()
                    .unwrap_or("<none>")
            );
        }
        selected.extend(found.into_iter().cloned());
    }
    selected
}

/// First column of every row, blank cells skipped.
///
/// Malformed rows are logged and skipped.
pub fn read_identifiers(path: impl AsRef<Path>) -> Result<Vec<String>, ValidationError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ValidationError::CsvIo {
            path: path.display().to_string(),
            source: e.into(),
        })?;

    let mut identifiers = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                if let Some(first) = record.get(0).filter(|cell| !cell.is_empty()) {
                    identifiers.push(first.to_string());
                }
            }
            Err(err) => error!("Failed to read record in CSV file: {}", err),
        }
    }
    Ok(identifiers)
}

/// Write one CSV line with every field quoted.
pub fn write_quoted_record<W: Write, I, F>(writer: W, fields: I) -> csv::Result<()>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv_writer.write_record(fields)?;
    csv_writer.flush()?;
    Ok(())
}

/// `username,email,name,active` columns of an identity; absent values are empty.
pub fn identity_record(identity: &Identity) -> [String; 4] {
    [
        identity.username.clone().unwrap_or_default(),
        identity.email.clone().unwrap_or_default(),
        identity.display_name.clone().unwrap_or_default(),
        identity.active.map(|active| active.to_string()).unwrap_or_default(),
    ]
}

/// Header plus one quoted line per identity.
pub fn write_identities<W: Write>(mut writer: W, identities: &[Identity]) -> csv::Result<()> {
    write_quoted_record(&mut writer, IDENTITY_CSV_HEADER)?;
    for identity in identities {
        write_quoted_record(&mut writer, identity_record(identity))?;
    }
    Ok(())
}
