use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use thiserror::Error;

use crate::models::*;

/// Storage key for the whole content document.
const CONTENT_KEY: &str = "amoria-content";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe content store. The whole site content lives in one in-memory
/// document; every mutation rewrites the single durable row in the same
/// locked section, so readers never observe a half-applied change and a
/// normal shutdown never loses committed mutations.
///
/// The write path is intentionally unchecked: request-layer validation
/// (`models::ValidationError`) is the only enforcement point, and anything
/// handed to a mutator is persisted as-is.
pub struct Store {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    doc: ContentDocument,
    conn: Connection,
}

impl Store {
    /// Open the store backed by the database at `path`, hydrating from the
    /// stored document if one exists, else seeding the first-run dataset.
    pub fn open(path: &str) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory store for testing.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![CONTENT_KEY],
                |row| row.get(0),
            )
            .optional()?;

        // A corrupted payload falls back to defaults rather than failing the
        // whole process; a readable one is authoritative and is never
        // overwritten by the seed data again.
        let (doc, seed) = match stored {
            Some(raw) => match serde_json::from_str::<ContentDocument>(&raw) {
                Ok(doc) => (doc, false),
                Err(e) => {
                    log::warn!("stored content document is unreadable ({}), reseeding", e);
                    (ContentDocument::default(), true)
                }
            },
            None => {
                log::info!("no stored content found, seeding first-run dataset");
                (ContentDocument::default(), true)
            }
        };

        let store = Self {
            inner: Mutex::new(StoreInner { doc, conn }),
        };
        if seed {
            let inner = store.inner.lock().unwrap();
            Self::persist(&inner);
        }
        Ok(store)
    }

    /// Run a mutation against the document and persist the result before the
    /// lock is released. Persistence failures are logged and swallowed; the
    /// in-memory document stays authoritative either way.
    fn mutate<R>(&self, f: impl FnOnce(&mut ContentDocument) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        let out = f(&mut inner.doc);
        Self::persist(&inner);
        out
    }

    fn persist(inner: &StoreInner) {
        let raw = match serde_json::to_string(&inner.doc) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("failed to serialize content document: {}", e);
                return;
            }
        };
        let result = inner.conn.execute(
            r#"INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![CONTENT_KEY, raw, Utc::now().to_rfc3339()],
        );
        if let Err(e) = result {
            log::warn!("failed to persist content document: {}", e);
        }
    }

    // ==================== Reads ====================

    pub fn snapshot(&self) -> ContentDocument {
        self.inner.lock().unwrap().doc.clone()
    }

    pub fn settings(&self) -> SiteSettings {
        self.inner.lock().unwrap().doc.settings.clone()
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.inner.lock().unwrap().doc.timeline.clone()
    }

    pub fn gallery(&self) -> Vec<GalleryImage> {
        self.inner.lock().unwrap().doc.gallery.clone()
    }

    pub fn locations(&self) -> Vec<MapLocation> {
        self.inner.lock().unwrap().doc.locations.clone()
    }

    pub fn bucket_list(&self) -> Vec<BucketListItem> {
        self.inner.lock().unwrap().doc.bucket_list.clone()
    }

    pub fn quiz(&self) -> Vec<QuizQuestion> {
        self.inner.lock().unwrap().doc.quiz.clone()
    }

    pub fn vault(&self) -> VaultSecret {
        self.inner.lock().unwrap().doc.vault.clone()
    }

    pub fn capsule(&self) -> TimeCapsule {
        self.inner.lock().unwrap().doc.capsule.clone()
    }

    // ==================== Singleton mutators ====================

    pub fn update_settings(&self, patch: SiteSettingsPatch) -> SiteSettings {
        self.mutate(|doc| {
            patch.apply(&mut doc.settings);
            doc.settings.clone()
        })
    }

    pub fn update_vault(&self, patch: VaultSecretPatch) -> VaultSecret {
        self.mutate(|doc| {
            patch.apply(&mut doc.vault);
            doc.vault.clone()
        })
    }

    pub fn update_capsule(&self, patch: TimeCapsulePatch) -> TimeCapsule {
        self.mutate(|doc| {
            patch.apply(&mut doc.capsule);
            doc.capsule.clone()
        })
    }

    // ==================== Timeline ====================

    pub fn add_timeline_event(&self, new: NewTimelineEvent) -> String {
        self.mutate(|doc| {
            let id = new_id();
            doc.timeline.push(new.into_event(id.clone()));
            id
        })
    }

    /// Merge a partial update into the matching event. Unknown ids are a
    /// silent no-op (`None`); the record keeps its position either way.
    pub fn update_timeline_event(
        &self,
        id: &str,
        patch: TimelineEventPatch,
    ) -> Option<TimelineEvent> {
        self.mutate(|doc| {
            doc.timeline.iter_mut().find(|e| e.id == id).map(|e| {
                patch.apply(e);
                e.clone()
            })
        })
    }

    pub fn delete_timeline_event(&self, id: &str) {
        self.mutate(|doc| doc.timeline.retain(|e| e.id != id));
    }

    // ==================== Gallery ====================

    pub fn add_gallery_image(&self, new: NewGalleryImage) -> String {
        self.mutate(|doc| {
            let id = new_id();
            doc.gallery.push(new.into_image(id.clone()));
            id
        })
    }

    pub fn update_gallery_image(&self, id: &str, patch: GalleryImagePatch) -> Option<GalleryImage> {
        self.mutate(|doc| {
            doc.gallery.iter_mut().find(|i| i.id == id).map(|i| {
                patch.apply(i);
                i.clone()
            })
        })
    }

    pub fn delete_gallery_image(&self, id: &str) {
        self.mutate(|doc| doc.gallery.retain(|i| i.id != id));
    }

    // ==================== Locations ====================

    pub fn add_location(&self, new: NewMapLocation) -> String {
        self.mutate(|doc| {
            let id = new_id();
            doc.locations.push(new.into_location(id.clone()));
            id
        })
    }

    pub fn update_location(&self, id: &str, patch: MapLocationPatch) -> Option<MapLocation> {
        self.mutate(|doc| {
            doc.locations.iter_mut().find(|l| l.id == id).map(|l| {
                patch.apply(l);
                l.clone()
            })
        })
    }

    pub fn delete_location(&self, id: &str) {
        self.mutate(|doc| doc.locations.retain(|l| l.id != id));
    }

    // ==================== Bucket list ====================

    pub fn add_bucket_list_item(&self, new: NewBucketListItem) -> String {
        self.mutate(|doc| {
            let id = new_id();
            doc.bucket_list.push(new.into_item(id.clone()));
            id
        })
    }

    pub fn update_bucket_list_item(
        &self,
        id: &str,
        patch: BucketListItemPatch,
    ) -> Option<BucketListItem> {
        self.mutate(|doc| {
            doc.bucket_list.iter_mut().find(|i| i.id == id).map(|i| {
                patch.apply(i);
                i.clone()
            })
        })
    }

    pub fn delete_bucket_list_item(&self, id: &str) {
        self.mutate(|doc| doc.bucket_list.retain(|i| i.id != id));
    }

    // ==================== Quiz ====================

    pub fn add_quiz_question(&self, new: NewQuizQuestion) -> String {
        self.mutate(|doc| {
            let id = new_id();
            doc.quiz.push(new.into_question(id.clone()));
            id
        })
    }

    pub fn update_quiz_question(&self, id: &str, patch: QuizQuestionPatch) -> Option<QuizQuestion> {
        self.mutate(|doc| {
            doc.quiz.iter_mut().find(|q| q.id == id).map(|q| {
                patch.apply(q);
                q.clone()
            })
        })
    }

    pub fn delete_quiz_question(&self, id: &str) {
        self.mutate(|doc| doc.quiz.retain(|q| q.id != id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_store_seeds_first_run_content() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.timeline().len(), 5);
        assert_eq!(store.locations().len(), 3);
        assert_eq!(store.gallery().len(), 6);
        assert_eq!(store.bucket_list().len(), 6);
        assert_eq!(store.quiz().len(), 4);
        assert_eq!(store.settings().passcode, "forever2025");
    }

    #[test]
    fn add_assigns_distinct_ids_and_preserves_order() {
        let store = Store::in_memory().unwrap();
        let mut ids = HashSet::new();
        for i in 0..50 {
            let id = store.add_bucket_list_item(NewBucketListItem {
                text: format!("item {}", i),
                completed: false,
            });
            assert!(ids.insert(id), "id reused");
        }
        let items = store.bucket_list();
        assert_eq!(items.len(), 56);
        for (i, item) in items.iter().skip(6).enumerate() {
            assert_eq!(item.text, format!("item {}", i));
        }
    }

    #[test]
    fn update_merges_only_the_given_fields() {
        let store = Store::in_memory().unwrap();
        let id = store.add_timeline_event(NewTimelineEvent {
            date: "2024-01-01".to_string(),
            title: "Original".to_string(),
            description: "desc".to_string(),
            image: Some("/placeholder/x.jpg".to_string()),
        });

        let updated = store
            .update_timeline_event(
                &id,
                TimelineEventPatch {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.date, "2024-01-01");
        assert_eq!(updated.description, "desc");
        assert_eq!(updated.image.as_deref(), Some("/placeholder/x.jpg"));

        // Position within the collection is unchanged.
        let timeline = store.timeline();
        assert_eq!(timeline.last().unwrap().id, id);
    }

    #[test]
    fn update_with_unknown_id_is_a_noop() {
        let store = Store::in_memory().unwrap();
        let before = store.snapshot();
        let result = store.update_bucket_list_item(
            "missing",
            BucketListItemPatch {
                completed: Some(true),
                ..Default::default()
            },
        );
        assert!(result.is_none());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = Store::in_memory().unwrap();
        let id = store.add_bucket_list_item(NewBucketListItem {
            text: "Visit Japan".to_string(),
            completed: false,
        });
        assert_eq!(store.bucket_list().len(), 7);

        store.delete_bucket_list_item(&id);
        assert_eq!(store.bucket_list().len(), 6);

        // Second delete of the same id changes nothing and does not error.
        store.delete_bucket_list_item(&id);
        assert_eq!(store.bucket_list().len(), 6);
    }

    #[test]
    fn singleton_merge_keeps_unspecified_fields() {
        let store = Store::in_memory().unwrap();
        let before = store.vault();
        let after = store.update_vault(VaultSecretPatch {
            code: Some("NEW-CODE".to_string()),
            ..Default::default()
        });
        assert_eq!(after.code, "NEW-CODE");
        assert_eq!(after.hidden_message, before.hidden_message);
        assert_eq!(after.sub_message, before.sub_message);
    }

    #[test]
    fn edits_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amoria.db");
        let path = path.to_str().unwrap();

        let added_id;
        {
            let store = Store::open(path).unwrap();
            added_id = store.add_bucket_list_item(NewBucketListItem {
                text: "Persisted".to_string(),
                completed: false,
            });
            store.update_settings(SiteSettingsPatch {
                passcode: Some("rotated".to_string()),
                ..Default::default()
            });
            let first_location = store.locations()[0].id.clone();
            store.delete_location(&first_location);
        }

        // Reopen: edits win, the seed never overwrites a stored document.
        let store = Store::open(path).unwrap();
        assert_eq!(store.settings().passcode, "rotated");
        assert_eq!(store.locations().len(), 2);
        let items = store.bucket_list();
        assert_eq!(items.len(), 7);
        assert!(items.iter().any(|i| i.id == added_id));
    }

    #[test]
    fn roundtrip_preserves_the_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amoria.db");
        let path = path.to_str().unwrap();

        let before;
        {
            let store = Store::open(path).unwrap();
            store.update_capsule(TimeCapsulePatch {
                message: Some("sealed".to_string()),
                ..Default::default()
            });
            before = store.snapshot();
        }

        let store = Store::open(path).unwrap();
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn corrupted_document_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amoria.db");
        let path = path.to_str().unwrap();

        {
            let conn = Connection::open(path).unwrap();
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL);",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![CONTENT_KEY, "{not json", "now"],
            )
            .unwrap();
        }

        let store = Store::open(path).unwrap();
        assert_eq!(store.timeline().len(), 5);
        assert_eq!(store.settings().admin_password, "admin123");
    }

    #[test]
    fn partial_stored_document_gets_defaults_for_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amoria.db");
        let path = path.to_str().unwrap();

        {
            let conn = Connection::open(path).unwrap();
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL);",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    CONTENT_KEY,
                    r#"{"bucketList":[],"settings":{"coupleName":"A & B","relationshipStartDate":"","passcode":"p","adminPassword":"a","showTimer":false}}"#,
                    "now"
                ],
            )
            .unwrap();
        }

        let store = Store::open(path).unwrap();
        // Present fields are kept as stored, even when empty.
        assert!(store.bucket_list().is_empty());
        assert_eq!(store.settings().couple_name, "A & B");
        // Absent collections come from the first-run defaults.
        assert_eq!(store.quiz().len(), 4);
        assert_eq!(store.capsule().unlock_date, "2026-06-15T00:00:00");
    }
}
