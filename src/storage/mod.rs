use anyhow::Result;

pub mod document;
pub mod firestore;
pub use document::{Document, Fields, Value};
pub use firestore::FirestoreStorage;

// ============================================================================
// Storage trait
// ============================================================================

#[allow(async_fn_in_trait)]
pub trait Storage: Send + Sync {
    /// Fetch a document, or `None` if it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Replace the whole document, creating it if missing.
    async fn set_document(&self, collection: &str, id: &str, fields: &Fields) -> Result<()>;

    /// Write only the masked fields, creating the document if missing.
    async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<()>;

    /// Write only the masked fields of a document that must already exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<()>;
}

// ============================================================================
// Test utilities — InMemoryStorage for in-crate tests
// ============================================================================
