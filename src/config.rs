use crate::migration::MigrationOptions;
use crate::storage::firestore::{EMULATOR_TOKEN, FIRESTORE_HOST, documents_url};
use crate::types::{DEFAULT_BALANCE, SeedMode};
use crate::user_source::{AuthUserSource, IDENTITY_TOOLKIT_HOST};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UserSourceKind {
    /// A `firebase auth:export` JSON file
    File,
    /// Firebase Auth, listed through the Identity Toolkit API
    Auth,
}

/// Backfill per-user profile documents into Firestore
#[derive(Debug, Parser)]
#[command(name = "seed-profiles")]
pub struct Settings {
    /// Firebase / Google Cloud project id
    #[arg(long = "project", env = "FIREBASE_PROJECT_ID")]
    pub project_id: String,

    /// Firestore database id
    #[arg(long, env = "FIRESTORE_DATABASE", default_value = "(default)")]
    pub database: String,

    /// Collection holding one profile document per user id
    #[arg(long, env = "PROFILE_COLLECTION", default_value = "users")]
    pub collection: String,

    /// overwrite | merge | upsert
    #[arg(long, env = "SEED_MODE", default_value_t = SeedMode::Upsert)]
    pub mode: SeedMode,

    #[arg(long, value_enum, default_value_t = UserSourceKind::File)]
    pub source: UserSourceKind,

    /// Path to the user export when `--source file`
    #[arg(long, env = "USERS_FILE", default_value = "users.json")]
    pub users_file: PathBuf,

    /// Starting balance written to new profiles
    #[arg(long, env = "SEED_BALANCE", default_value_t = DEFAULT_BALANCE)]
    pub balance: f64,

    /// OAuth2 access token, e.g. from `gcloud auth print-access-token`
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub firestore_emulator_host: Option<String>,

    #[arg(long, env = "FIREBASE_AUTH_EMULATOR_HOST")]
    pub auth_emulator_host: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Report what would be written without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            bail!("Project id must not be empty");
        }
        if self.collection.trim_matches('/').is_empty() {
            bail!("Collection must not be empty");
        }
        if !self.balance.is_finite() || self.balance < 0.0 {
            bail!("Balance must be a non-negative number, got {}", self.balance);
        }
        Ok(())
    }

    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }

    pub fn firestore_documents_url(&self) -> String {
        let host = match &self.firestore_emulator_host {
            Some(host) => format!("http://{}", host),
            None => FIRESTORE_HOST.to_string(),
        };
        documents_url(&host, &self.project_id, &self.database)
    }

    pub fn firestore_token(&self) -> Option<String> {
        match &self.firestore_emulator_host {
            Some(_) => Some(EMULATOR_TOKEN.to_string()),
            None => self.access_token.clone(),
        }
    }

    pub fn auth_source(&self, client: Client) -> Result<AuthUserSource> {
        let (base_url, token) = match &self.auth_emulator_host {
            Some(host) => (
                format!("http://{}/identitytoolkit.googleapis.com", host),
                EMULATOR_TOKEN.to_string(),
            ),
            None => (
                IDENTITY_TOOLKIT_HOST.to_string(),
                self.access_token
                    .clone()
                    .context("--source auth needs an access token (GOOGLE_OAUTH_ACCESS_TOKEN)")?,
            ),
        };
        Ok(AuthUserSource::new(
            client,
            base_url,
            self.project_id.clone(),
            token,
        ))
    }

    pub fn migration_options(&self, migration_time: DateTime<Utc>) -> MigrationOptions {
        MigrationOptions {
            collection: self.collection.trim_matches('/').to_string(),
            mode: self.mode,
            balance: self.balance,
            migration_time,
            dry_run: self.dry_run,
        }
    }
}
