//! Business logic for seeding profile documents.
//!
//! One write per user for `overwrite` and `merge`; a read followed by at most
//! one write for `upsert`. Users are processed sequentially in input order and
//! a failure for one user never stops the run.

use crate::storage::document::{profile_fields, value_to_json};
use crate::storage::{Fields, Storage, Value};
use crate::types::{SeedMode, SeedOutcome, UserProfile, UserRecord};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Field paths written by `merge`. Anything else on the document is left alone.
pub const PROFILE_FIELD_MASK: [&str; 6] = [
    "userId",
    "balance",
    "migrated",
    "createdAt",
    "savedStrategies",
    "generationHistory",
];
const BALANCE_FIELD_MASK: [&str; 2] = ["balance", "migrated"];
const BALANCE_FIELD: &str = "balance";

pub struct MigrationOptions {
    pub collection: String,
    pub mode: SeedMode,
    pub balance: f64,
    pub migration_time: DateTime<Utc>,
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub written: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl MigrationReport {
    fn record(&mut self, outcome: SeedOutcome) {
        match outcome {
            SeedOutcome::Written => self.written += 1,
            SeedOutcome::Created => self.created += 1,
            SeedOutcome::Updated => self.updated += 1,
            SeedOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.created + self.updated + self.skipped + self.failed
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✨ Migration Complete!")?;
        if self.written > 0 {
            writeln!(f, "✅ Written: {}", self.written)?;
        }
        writeln!(f, "🆕 Created: {}", self.created)?;
        writeln!(f, "🆙 Updated: {}", self.updated)?;
        write!(f, "⏭️ Skipped: {}", self.skipped)?;
        if self.failed > 0 {
            write!(f, "\n❌ Failed: {}", self.failed)?;
        }
        Ok(())
    }
}

pub struct Migrator<S> {
    storage: Arc<S>,
    options: MigrationOptions,
}

impl<S: Storage> Migrator<S> {
    pub fn new(storage: Arc<S>, options: MigrationOptions) -> Self {
        Self { storage, options }
    }

    /// Seed every user, printing one status line each.
    pub async fn run(&self, users: &[UserRecord]) -> MigrationReport {
        let mut report = MigrationReport::default();

        for user in users {
            match self.seed_user(user).await {
                Ok(outcome) => {
                    println!("{}", self.status_line(user, outcome));
                    report.record(outcome);
                }
                Err(e) => {
                    warn!(uid = %user.local_id, error = %e, "Failed to seed profile");
                    println!("{}", self.failure_line(user, &e));
                    report.failed += 1;
                }
            }
        }

        info!(
            written = report.written,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Migration finished"
        );
        report
    }

    pub async fn seed_user(&self, user: &UserRecord) -> Result<SeedOutcome> {
        // The id is used exactly as exported; only a blank one is rejected.
        let uid = user.local_id.as_str();
        if uid.trim().is_empty() {
            bail!("Missing localId");
        }

        match self.options.mode {
            SeedMode::Overwrite => {
                if !self.options.dry_run {
                    self.storage
                        .set_document(&self.options.collection, uid, &self.profile_fields(uid))
                        .await?;
                }
                Ok(SeedOutcome::Written)
            }
            SeedMode::Merge => {
                if !self.options.dry_run {
                    self.storage
                        .merge_document(
                            &self.options.collection,
                            uid,
                            &self.profile_fields(uid),
                            &PROFILE_FIELD_MASK,
                        )
                        .await?;
                }
                Ok(SeedOutcome::Written)
            }
            SeedMode::Upsert => self.upsert(uid).await,
        }
    }

    async fn upsert(&self, uid: &str) -> Result<SeedOutcome> {
        let collection = &self.options.collection;

        let Some(existing) = self.storage.get_document(collection, uid).await? else {
            if !self.options.dry_run {
                self.storage
                    .set_document(collection, uid, &self.profile_fields(uid))
                    .await?;
            }
            return Ok(SeedOutcome::Created);
        };

        if existing.has_field(BALANCE_FIELD) {
            let balance = existing
                .fields
                .get(BALANCE_FIELD)
                .map(value_to_json)
                .unwrap_or_default();
            debug!(uid = %uid, balance = %balance, "Profile already seeded");
            return Ok(SeedOutcome::Skipped);
        }

        if !self.options.dry_run {
            let fields = Fields::from([
                (
                    BALANCE_FIELD.to_string(),
                    Value::DoubleValue(self.options.balance),
                ),
                ("migrated".to_string(), Value::BooleanValue(true)),
            ]);
            self.storage
                .update_document(collection, uid, &fields, &BALANCE_FIELD_MASK)
                .await?;
        }
        Ok(SeedOutcome::Updated)
    }

    fn profile_fields(&self, uid: &str) -> Fields {
        profile_fields(&UserProfile::seeded(
            uid,
            self.options.balance,
            self.options.migration_time,
        ))
    }

    pub fn failure_line(&self, user: &UserRecord, error: &anyhow::Error) -> String {
        format!("❌ Failed {}: {:#}", user.display_email(), error)
    }

    pub fn status_line(&self, user: &UserRecord, outcome: SeedOutcome) -> String {
        let email = user.display_email();
        let uid = &user.local_id;

        if self.options.dry_run {
            return match (outcome, self.options.mode) {
                (SeedOutcome::Written, SeedMode::Overwrite) => {
                    format!("[DRY RUN] Would overwrite profile for {} ({})", email, uid)
                }
                (SeedOutcome::Written, _) => format!("[DRY RUN] Would seed {} ({})", email, uid),
                (SeedOutcome::Created, _) => {
                    format!("[DRY RUN] Would create profile for {} ({})", email, uid)
                }
                (SeedOutcome::Updated, _) => {
                    format!("[DRY RUN] Would update balance for {} ({})", email, uid)
                }
                (SeedOutcome::Skipped, _) => {
                    format!("⏩ User {} already has a profile. Skipping.", email)
                }
            };
        }

        match (outcome, self.options.mode) {
            (SeedOutcome::Written, SeedMode::Overwrite) => format!("✅ Success: {}", email),
            (SeedOutcome::Written, _) => format!("✅ Seeded {}", email),
            (SeedOutcome::Created, _) => format!("✅ Created profile for {} ({})", email, uid),
            (SeedOutcome::Updated, _) => format!("🆙 Updated balance for {} ({})", email, uid),
            (SeedOutcome::Skipped, _) => {
                format!("⏩ User {} already has a profile. Skipping.", email)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::InMemoryStorage;
    use chrono::TimeZone;

    const COLLECTION: &str = "users";

    fn migration_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn migrator(storage: InMemoryStorage, mode: SeedMode) -> Migrator<InMemoryStorage> {
        migrator_with(storage, mode, false)
    }

    fn migrator_with(
        storage: InMemoryStorage,
        mode: SeedMode,
        dry_run: bool,
    ) -> Migrator<InMemoryStorage> {
        Migrator::new(
            Arc::new(storage),
            MigrationOptions {
                collection: COLLECTION.to_string(),
                mode,
                balance: 1000.0,
                migration_time: migration_time(),
                dry_run,
            },
        )
    }

    fn user(uid: &str) -> UserRecord {
        UserRecord::new(uid, Some(format!("{}@example.com", uid).as_str()))
    }

    fn seeded_fields(uid: &str) -> Fields {
        profile_fields(&UserProfile::seeded(uid, 1000.0, migration_time()))
    }

    fn legacy_profile(uid: &str) -> Fields {
        Fields::from([
            ("userId".to_string(), Value::StringValue(uid.to_string())),
            ("displayName".to_string(), Value::StringValue("Ann".to_string())),
        ])
    }

    #[tokio::test]
    async fn upsert_creates_missing_profile() {
        let m = migrator(InMemoryStorage::new(), SeedMode::Upsert);
        let outcome = m.seed_user(&user("u1")).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Created);
        assert_eq!(m.storage.get(COLLECTION, "u1"), Some(seeded_fields("u1")));
    }

    #[tokio::test]
    async fn upsert_backfills_balance_and_keeps_other_fields() {
        let storage =
            InMemoryStorage::new().with_document(COLLECTION, "u1", legacy_profile("u1"));
        let m = migrator(storage, SeedMode::Upsert);
        let outcome = m.seed_user(&user("u1")).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Updated);
        let doc = m.storage.get(COLLECTION, "u1").unwrap();
        assert_eq!(doc["balance"], Value::DoubleValue(1000.0));
        assert_eq!(doc["migrated"], Value::BooleanValue(true));
        assert_eq!(doc["displayName"], Value::StringValue("Ann".to_string()));
        assert!(!doc.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn upsert_skips_profile_with_balance() {
        let existing = Fields::from([("balance".to_string(), Value::IntegerValue(12))]);
        let storage = InMemoryStorage::new().with_document(COLLECTION, "u1", existing.clone());
        let m = migrator(storage, SeedMode::Upsert);
        let outcome = m.seed_user(&user("u1")).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Skipped);
        assert_eq!(m.storage.write_count(), 0);
        assert_eq!(m.storage.get(COLLECTION, "u1"), Some(existing));
    }

    #[tokio::test]
    async fn upsert_treats_null_balance_as_present() {
        let existing = Fields::from([("balance".to_string(), Value::NullValue(()))]);
        let storage = InMemoryStorage::new().with_document(COLLECTION, "u1", existing);
        let m = migrator(storage, SeedMode::Upsert);

        assert_eq!(
            m.seed_user(&user("u1")).await.unwrap(),
            SeedOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn upsert_is_idempotent_across_runs() {
        let m = migrator(InMemoryStorage::new(), SeedMode::Upsert);
        let users = vec![user("u1"), user("u2")];

        let first = m.run(&users).await;
        let second = m.run(&users).await;

        assert_eq!(first.created, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.created + second.updated, 0);
        assert_eq!(m.storage.write_count(), 2);
    }

    #[tokio::test]
    async fn overwrite_replaces_whole_document() {
        let storage =
            InMemoryStorage::new().with_document(COLLECTION, "u1", legacy_profile("u1"));
        let m = migrator(storage, SeedMode::Overwrite);
        let outcome = m.seed_user(&user("u1")).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Written);
        assert_eq!(m.storage.get(COLLECTION, "u1"), Some(seeded_fields("u1")));
        assert_eq!(m.storage.read_count(), 0);
    }

    #[tokio::test]
    async fn merge_writes_profile_fields_and_keeps_others() {
        let storage =
            InMemoryStorage::new().with_document(COLLECTION, "u1", legacy_profile("u1"));
        let m = migrator(storage, SeedMode::Merge);
        m.seed_user(&user("u1")).await.unwrap();

        let doc = m.storage.get(COLLECTION, "u1").unwrap();
        for field in PROFILE_FIELD_MASK {
            assert_eq!(doc.get(field), seeded_fields("u1").get(field));
        }
        assert_eq!(doc["displayName"], Value::StringValue("Ann".to_string()));
        assert_eq!(m.storage.read_count(), 0);
    }

    #[tokio::test]
    async fn failure_for_one_user_does_not_stop_the_run() {
        let storage = InMemoryStorage::new().with_failure("u2");
        let m = migrator(storage, SeedMode::Merge);
        let report = m.run(&[user("u1"), user("u2"), user("u3")]).await;

        assert_eq!(report.written, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 3);
        assert!(m.storage.get(COLLECTION, "u3").is_some());
    }

    #[tokio::test]
    async fn failure_line_carries_status_and_body() {
        let storage = InMemoryStorage::new().with_failure("u2");
        let m = migrator(storage, SeedMode::Merge);
        let u = user("u2");
        let err = m.seed_user(&u).await.unwrap_err();

        assert_eq!(
            m.failure_line(&u, &err),
            "❌ Failed u2@example.com: 403 - Missing or insufficient permissions."
        );
    }

    #[tokio::test]
    async fn padded_local_id_is_written_as_exported() {
        let m = migrator(InMemoryStorage::new(), SeedMode::Upsert);
        let u = UserRecord::new(" u1 ", Some("a@example.com"));
        let outcome = m.seed_user(&u).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Created);
        assert!(m.storage.get(COLLECTION, " u1 ").is_some());
        assert!(m.storage.get(COLLECTION, "u1").is_none());
        assert_eq!(
            m.status_line(&u, outcome),
            "✅ Created profile for a@example.com ( u1 )"
        );
    }

    #[tokio::test]
    async fn failed_read_is_counted_without_a_write() {
        let storage = InMemoryStorage::new().with_failure("u1");
        let m = migrator(storage, SeedMode::Upsert);
        let report = m.run(&[user("u1")]).await;

        assert_eq!(report.failed, 1);
        assert_eq!(m.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn empty_local_id_is_rejected_without_a_request() {
        let m = migrator(InMemoryStorage::new(), SeedMode::Overwrite);
        let err = m.seed_user(&UserRecord::new("  ", None)).await.unwrap_err();

        assert!(err.to_string().contains("Missing localId"));
        assert_eq!(m.storage.write_count(), 0);
    }

    #[tokio::test]
    async fn dry_run_reads_but_never_writes() {
        let storage =
            InMemoryStorage::new().with_document(COLLECTION, "u2", legacy_profile("u2"));
        let m = migrator_with(storage, SeedMode::Upsert, true);
        let report = m.run(&[user("u1"), user("u2")]).await;

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(m.storage.read_count(), 2);
        assert_eq!(m.storage.write_count(), 0);
        assert_eq!(m.storage.document_count(), 1);
    }

    #[tokio::test]
    async fn dry_run_overwrite_touches_nothing() {
        let m = migrator_with(InMemoryStorage::new(), SeedMode::Overwrite, true);
        let report = m.run(&[user("u1")]).await;

        assert_eq!(report.written, 1);
        assert_eq!(m.storage.read_count() + m.storage.write_count(), 0);
    }

    #[test]
    fn status_lines_per_mode() {
        let u = UserRecord::new("u1", None);
        let overwrite = migrator(InMemoryStorage::new(), SeedMode::Overwrite);
        let merge = migrator(InMemoryStorage::new(), SeedMode::Merge);
        let upsert = migrator(InMemoryStorage::new(), SeedMode::Upsert);

        assert_eq!(
            overwrite.status_line(&u, SeedOutcome::Written),
            "✅ Success: no-email"
        );
        assert_eq!(merge.status_line(&u, SeedOutcome::Written), "✅ Seeded no-email");
        assert_eq!(
            upsert.status_line(&u, SeedOutcome::Created),
            "✅ Created profile for no-email (u1)"
        );
        assert_eq!(
            upsert.status_line(&u, SeedOutcome::Updated),
            "🆙 Updated balance for no-email (u1)"
        );
        assert_eq!(
            upsert.status_line(&u, SeedOutcome::Skipped),
            "⏩ User no-email already has a profile. Skipping."
        );
    }

    #[test]
    fn dry_run_status_lines_are_prefixed() {
        let m = migrator_with(InMemoryStorage::new(), SeedMode::Upsert, true);
        let line = m.status_line(&user("u1"), SeedOutcome::Created);
        assert_eq!(
            line,
            "[DRY RUN] Would create profile for u1@example.com (u1)"
        );
    }

    #[test]
    fn dry_run_overwrite_and_merge_lines() {
        let u = user("u1");
        let overwrite = migrator_with(InMemoryStorage::new(), SeedMode::Overwrite, true);
        let merge = migrator_with(InMemoryStorage::new(), SeedMode::Merge, true);

        assert_eq!(
            overwrite.status_line(&u, SeedOutcome::Written),
            "[DRY RUN] Would overwrite profile for u1@example.com (u1)"
        );
        assert_eq!(
            merge.status_line(&u, SeedOutcome::Written),
            "[DRY RUN] Would seed u1@example.com (u1)"
        );
    }

    #[test]
    fn report_summary_lists_counts() {
        let report = MigrationReport {
            written: 0,
            created: 2,
            updated: 1,
            skipped: 3,
            failed: 1,
        };
        assert_eq!(
            report.to_string(),
            "✨ Migration Complete!\n🆕 Created: 2\n🆙 Updated: 1\n⏭️ Skipped: 3\n❌ Failed: 1"
        );
    }
}
