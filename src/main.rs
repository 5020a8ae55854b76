//! Backfill a profile document for every user in a Firebase project.
//!
//! Usage:
//!   FIREBASE_PROJECT_ID=my-project GOOGLE_OAUTH_ACCESS_TOKEN=$(gcloud auth print-access-token) \
//!     cargo run --bin seed-profiles -- --users-file users.json
//!
//! Add --dry-run to see what would be written without making changes, and
//! --mode overwrite|merge|upsert to pick how documents are written (default upsert).

use anyhow::{Result, bail};
use chrono::Utc;
use clap::Parser;
use profile_seed::config::{Settings, UserSourceKind};
use profile_seed::migration::Migrator;
use profile_seed::storage::FirestoreStorage;
use profile_seed::types::UserRecord;
use profile_seed::user_source::{JsonFileSource, UserSource};
use reqwest::Client;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::parse();
    settings.validate()?;

    println!("🚀 Starting user migration and profile seeding...");
    println!("Project: {}", settings.project_id);
    println!("Collection: {}", settings.collection);
    println!(
        "Mode: {}{}",
        settings.mode,
        if settings.dry_run { " (DRY RUN)" } else { "" }
    );
    println!();

    let client = settings.http_client()?;

    let users = match load_users(&settings, &client).await {
        Ok(users) => users,
        Err(e) => {
            println!("❌ {:#}", e);
            std::process::exit(1);
        }
    };
    println!("📊 Processing {} users...", users.len());

    let storage = Arc::new(FirestoreStorage::new(
        client,
        settings.firestore_documents_url(),
        settings.firestore_token(),
    ));
    let migrator = Migrator::new(storage, settings.migration_options(Utc::now()));

    let report = migrator.run(&users).await;

    println!();
    println!("{}", report);

    if report.failed > 0 {
        error!(failed = report.failed, "Some profiles were not seeded");
        bail!("{} of {} users failed to migrate", report.failed, report.total());
    }

    Ok(())
}

async fn load_users(settings: &Settings, client: &Client) -> Result<Vec<UserRecord>> {
    match settings.source {
        UserSourceKind::File => {
            JsonFileSource::new(settings.users_file.clone())
                .list_users()
                .await
        }
        UserSourceKind::Auth => settings.auth_source(client.clone())?.list_users().await,
    }
}
