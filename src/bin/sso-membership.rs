//! # sso-membership
//!
//! Command line front end for membership reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! export SSO_API_TOKEN=...
//!
//! # Copy group roles and org memberships to the SSO-provisioned users
//! sso-membership sync <GROUP_ID> --domain example.com --sso-domain sso.example.com
//!
//! # List users as quoted CSV
//! sso-membership get-users <GROUP_ID> --domain example.com > users.csv
//!
//! # Remove users from the SSO connection
//! sso-membership delete-users <GROUP_ID> --csv-file-path users.csv
//! ```
//!
//! Every run also writes its log to `sso-membership_run_<timestamp>.log`.

use clap::{ArgGroup, Args, Parser, Subcommand};
use log::{error, info};
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sso_membership::config::{ApiConfig, MatchingPolicy, ReconcileConfig};
use sso_membership::directory::DirectoryClient;
use sso_membership::error::{FetchError, ValidationError};
use sso_membership::logging;
use sso_membership::model::Identity;
use sso_membership::reconcile::MembershipReconciler;
use sso_membership::selection::{
    filter_by_domain, filter_by_identifiers, filter_with_counterparts, read_identifiers,
    write_identities,
};
use sso_membership::transport::HttpTransport;
use sso_membership::validation::{
    validate_csv_path, validate_domain, validate_email, validate_group_id,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Reconcile memberships of SSO-provisioned users with their pre-migration accounts.
#[derive(Parser, Debug)]
#[command(name = "sso-membership", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Directory the run log file is written to
    #[arg(long, global = true, env = "SSO_LOG_DIR", default_value = ".")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy group role and org memberships to the provisioned users
    Sync(SyncArgs),
    /// Print the selected users as CSV
    GetUsers(SelectArgs),
    /// Delete the selected users from the SSO connection
    DeleteUsers(SelectArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Tenant group id (UUID)
    group_id: String,

    /// Pre-migration email domain
    #[arg(long)]
    domain: String,

    /// Domain the SSO users were provisioned under
    #[arg(long, alias = "ssoDomain")]
    sso_domain: String,

    /// Only synchronize the users listed in the first column of this CSV file
    #[arg(long, alias = "csvFilePath")]
    csv_file_path: Option<PathBuf>,

    /// Identify pre-migration users by username instead of email
    #[arg(long, alias = "matchByUserName")]
    match_by_username: bool,

    /// Find provisioned users by username equal to the email local part
    #[arg(long, alias = "matchToLocalPart")]
    match_to_local_part: bool,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("selector")
        .required(true)
        .args(["domain", "email", "csv_file_path"])
))]
struct SelectArgs {
    /// Tenant group id (UUID)
    group_id: String,

    /// Select users of this domain
    #[arg(long)]
    domain: Option<String>,

    /// Select the user with this email (or username)
    #[arg(long)]
    email: Option<String>,

    /// Select the users listed in the first column of this CSV file
    #[arg(long, alias = "csvFilePath")]
    csv_file_path: Option<PathBuf>,

    /// Identify users by username instead of email
    #[arg(long, alias = "matchByUserName")]
    match_by_username: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match logging::init(cli.debug, &cli.log_dir) {
        Ok(path) => info!("Logging to {}", path.display()),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    let result = match cli.command {
        Command::Sync(args) => sync(args).await,
        Command::GetUsers(args) => get_users(args).await,
        Command::DeleteUsers(args) => delete_users(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", report(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

/// An error followed by its chain of sources.
fn report(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn client() -> CliResult<DirectoryClient<HttpTransport>> {
    let config = ApiConfig::from_env()?;
    Ok(DirectoryClient::new(HttpTransport::new(&config)?))
}

async fn fetch_identities(
    client: &DirectoryClient<HttpTransport>,
    group_id: &str,
) -> Result<Vec<Identity>, FetchError> {
    client
        .fetch_identities(group_id)
        .await
        .map_err(|source| FetchError::Identities {
            group_id: group_id.to_string(),
            source,
        })
}

fn read_csv_identifiers(path: &Path) -> Result<Vec<String>, ValidationError> {
    let identifiers = read_identifiers(path)?;
    if identifiers.is_empty() {
        return Err(ValidationError::EmptyCsv);
    }
    Ok(identifiers)
}

async fn sync(args: SyncArgs) -> CliResult<()> {
    validate_group_id(&args.group_id)?;
    validate_domain("domain", &args.domain)?;
    validate_domain("ssoDomain", &args.sso_domain)?;
    let identifiers = match &args.csv_file_path {
        Some(path) => {
            validate_csv_path(path)?;
            Some(read_csv_identifiers(path)?)
        }
        None => None,
    };

    let config = ReconcileConfig::new(
        &args.domain,
        &args.sso_domain,
        MatchingPolicy::new(args.match_by_username, args.match_to_local_part),
    );
    let client = client()?;

    let mut identities = fetch_identities(&client, &args.group_id).await?;
    if let Some(identifiers) = identifiers {
        identities = filter_with_counterparts(&identifiers, &identities, &config);
    }

    MembershipReconciler::new(&client, &config)
        .run(&args.group_id, &identities)
        .await?;
    Ok(())
}

fn validate_selection(args: &SelectArgs) -> Result<(), ValidationError> {
    validate_group_id(&args.group_id)?;
    if let Some(domain) = &args.domain {
        validate_domain("domain", domain)?;
    }
    if let Some(email) = &args.email {
        validate_email(email)?;
    }
    if let Some(path) = &args.csv_file_path {
        validate_csv_path(path)?;
    }
    Ok(())
}

async fn select(
    client: &DirectoryClient<HttpTransport>,
    args: &SelectArgs,
) -> CliResult<Vec<Identity>> {
    let identities = fetch_identities(client, &args.group_id).await?;

    let selected = if let Some(domain) = &args.domain {
        filter_by_domain(&identities, domain, args.match_by_username)
    } else if let Some(email) = &args.email {
        filter_by_identifiers(&[email.clone()], &identities, args.match_by_username)
    } else if let Some(path) = &args.csv_file_path {
        let identifiers = read_csv_identifiers(path)?;
        filter_by_identifiers(&identifiers, &identities, args.match_by_username)
    } else {
        identities
    };
    Ok(selected)
}

async fn get_users(args: SelectArgs) -> CliResult<()> {
    validate_selection(&args)?;
    let client = client()?;
    let identities = select(&client, &args).await?;

    if identities.is_empty() {
        error!("No users found matching the specified criteria");
        return Ok(());
    }
    write_identities(io::stdout().lock(), &identities)?;
    Ok(())
}

async fn delete_users(args: SelectArgs) -> CliResult<()> {
    validate_selection(&args)?;
    let client = client()?;
    let identities = select(&client, &args).await?;

    if identities.is_empty() {
        info!("No users found matching the specified criteria, no Users to delete");
        return Ok(());
    }

    let connection = client.sso_connection(&args.group_id).await?;
    info!("SSO Connection Name: {}", connection.label());
    info!("Deleting {} users", identities.len());

    for identity in &identities {
        match client
            .delete_identity(&args.group_id, &connection.id, &identity.id)
            .await
        {
            Ok(()) => info!("Deleted User: {}", identity),
            Err(err) => error!("Failed to delete User: {}: {}", identity, err),
        }
    }
    Ok(())
}
