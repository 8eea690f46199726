// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory `aperture-collab` implementations for tests: a `HistoryStore`,
//! `IssueStore`, `ApiDefinitionStore`, and `SiteBehavior` oracle, none of
//! which touch the network or a real database.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use aperture_collab::{DefinitionTree, ApiDefinitionStore, HistoryStore, IssueStore, SiteBehavior};
use aperture_core::{ApiDefinition, HistoryRecord, Issue, Severity};
use aperture_error::{ApertureError, ErrorCode};

/// In-memory [`HistoryStore`]. Records are appended via
/// [`MockHistoryStore::insert`] (the mock prober/transport calls this as
/// its side effect) and looked up by id.
#[derive(Debug, Default)]
pub struct MockHistoryStore {
    records: Mutex<HashMap<Uuid, HistoryRecord>>,
}

impl MockHistoryStore {
    /// Appends `record`, as a real `HttpTransport` would on execution.
    pub fn insert(&self, record: HistoryRecord) {
        self.records.lock().expect("history store lock poisoned").insert(record.id, record);
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.lock().expect("history store lock poisoned").len()
    }

    /// True if no records have been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>, ApertureError> {
        Ok(self.records.lock().expect("history store lock poisoned").get(&id).cloned())
    }
}

/// In-memory [`IssueStore`], recording every materialized [`Issue`] for
/// later assertion.
#[derive(Debug, Default)]
pub struct MockIssueStore {
    issues: Mutex<Vec<Issue>>,
}

impl MockIssueStore {
    /// Snapshot of every issue created so far, in creation order.
    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().expect("issue store lock poisoned").clone()
    }
}

#[async_trait]
impl IssueStore for MockIssueStore {
    async fn create_issue_from_history_and_template(
        &self,
        history: HistoryRecord,
        code: String,
        details: String,
        confidence: u8,
        severity_override: Option<Severity>,
        workspace_id: String,
        task_id: Option<String>,
        task_job_id: Option<String>,
    ) -> Result<Issue, ApertureError> {
        let issue = Issue {
            code,
            confidence,
            details,
            severity: severity_override.unwrap_or(Severity::Info),
            history,
            workspace_id,
            task_id,
            task_job_id,
        };
        self.issues.lock().expect("issue store lock poisoned").push(issue.clone());
        Ok(issue)
    }
}

/// [`SiteBehavior`] oracle that always reports "not a catch-all response",
/// i.e. every [`HistoryRecord`] reaches predicates untouched. Construct
/// with [`MockSiteBehavior::always_not_found`] for the inverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSiteBehavior {
    treat_as_not_found: bool,
}

impl MockSiteBehavior {
    /// A site behavior that never flags anything as a catch-all.
    pub fn permissive() -> Self {
        MockSiteBehavior { treat_as_not_found: false }
    }

    /// A site behavior that flags every record as a catch-all, simulating
    /// a soft-404 SPA shell.
    pub fn always_not_found() -> Self {
        MockSiteBehavior { treat_as_not_found: true }
    }
}

#[async_trait]
impl SiteBehavior for MockSiteBehavior {
    async fn is_not_found(&self, _history: &HistoryRecord) -> bool {
        self.treat_as_not_found
    }
}

struct DefinitionRow {
    definition: ApiDefinition,
    tree: Option<DefinitionTree>,
}

/// In-memory [`ApiDefinitionStore`], keyed by `(workspace_id, source_url)`
/// for idempotency lookups and by id for updates.
#[derive(Default)]
pub struct MockApiDefinitionStore {
    rows: Mutex<HashMap<Uuid, DefinitionRow>>,
}

impl MockApiDefinitionStore {
    /// Number of Definitions currently stored.
    pub fn definition_count(&self) -> usize {
        self.rows.lock().expect("definition store lock poisoned").len()
    }

    /// Snapshot of the persisted [`DefinitionTree`] for `definition_id`, if
    /// `persist_tree` has run for it.
    pub fn tree_for(&self, definition_id: Uuid) -> Option<DefinitionTree> {
        self.rows
            .lock()
            .expect("definition store lock poisoned")
            .get(&definition_id)
            .and_then(|row| row.tree.clone())
    }
}

#[async_trait]
impl ApiDefinitionStore for MockApiDefinitionStore {
    async fn exists_by_source_url(
        &self,
        workspace_id: &str,
        source_url: &str,
    ) -> Result<bool, ApertureError> {
        Ok(self
            .rows
            .lock()
            .expect("definition store lock poisoned")
            .values()
            .any(|row| row.definition.workspace_id == workspace_id && row.definition.source_url == source_url))
    }

    async fn get_by_source_url(
        &self,
        workspace_id: &str,
        source_url: &str,
    ) -> Result<Option<ApiDefinition>, ApertureError> {
        Ok(self
            .rows
            .lock()
            .expect("definition store lock poisoned")
            .values()
            .find(|row| row.definition.workspace_id == workspace_id && row.definition.source_url == source_url)
            .map(|row| row.definition.clone()))
    }

    async fn create(&self, definition: ApiDefinition) -> Result<ApiDefinition, ApertureError> {
        let mut rows = self.rows.lock().expect("definition store lock poisoned");
        if rows.contains_key(&definition.id) {
            return Err(ApertureError::new(
                ErrorCode::PersistenceRowRejected,
                "definition id already exists",
            ));
        }
        rows.insert(
            definition.id,
            DefinitionRow {
                definition: definition.clone(),
                tree: None,
            },
        );
        Ok(definition)
    }

    async fn update(&self, definition: ApiDefinition) -> Result<ApiDefinition, ApertureError> {
        let mut rows = self.rows.lock().expect("definition store lock poisoned");
        let row = rows.get_mut(&definition.id).ok_or_else(|| {
            ApertureError::new(ErrorCode::PersistenceRowRejected, "definition id not found")
        })?;
        row.definition = definition.clone();
        Ok(definition)
    }

    async fn persist_tree(
        &self,
        definition_id: Uuid,
        tree: DefinitionTree,
    ) -> Result<(), ApertureError> {
        let mut rows = self.rows.lock().expect("definition store lock poisoned");
        let row = rows.get_mut(&definition_id).ok_or_else(|| {
            ApertureError::new(ErrorCode::PersistenceRowRejected, "definition id not found")
        })?;
        row.tree = Some(tree);
        Ok(())
    }
}

/// Builds a [`HistoryRecord`] with sensible test defaults, overriding only
/// what the caller provides.
pub fn sample_history_record(url: &str, status_code: u16, body: &[u8]) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4(),
        url: url.to_string(),
        method: "GET".to_string(),
        status_code,
        content_type: None,
        headers: Vec::new(),
        body: std::sync::Arc::from(body),
        workspace_id: "ws-test".to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition(workspace_id: &str, source_url: &str) -> ApiDefinition {
        ApiDefinition {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.to_string(),
            kind: aperture_core::ApiKind::OpenApi,
            status: aperture_core::ApiStatus::Pending,
            source_url: source_url.to_string(),
            base_url: "https://api.example.test".to_string(),
            raw: Vec::new(),
            auto_discovered: false,
            meta: aperture_core::DefinitionMeta::OpenApi(aperture_core::OpenApiMeta::default()),
            endpoint_count: 0,
        }
    }

    #[tokio::test]
    async fn history_store_roundtrips_inserted_record() {
        let store = MockHistoryStore::default();
        let record = sample_history_record("https://example.test/a", 200, b"ok");
        let id = record.id;
        store.insert(record);
        let fetched = store.get(id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn definition_store_exists_check_is_scoped_to_workspace() {
        let store = MockApiDefinitionStore::default();
        let definition = sample_definition("ws-1", "https://example.test/openapi.json");
        store.create(definition).await.unwrap();
        assert!(store.exists_by_source_url("ws-1", "https://example.test/openapi.json").await.unwrap());
        assert!(!store.exists_by_source_url("ws-2", "https://example.test/openapi.json").await.unwrap());
    }

    #[tokio::test]
    async fn persist_tree_is_retrievable_by_definition_id() {
        let store = MockApiDefinitionStore::default();
        let definition = sample_definition("ws-1", "https://example.test/openapi.json");
        let id = definition.id;
        store.create(definition).await.unwrap();
        store.persist_tree(id, DefinitionTree::default()).await.unwrap();
        assert!(store.tree_for(id).is_some());
    }

    #[tokio::test]
    async fn site_behavior_permissive_never_flags_not_found() {
        let behavior = MockSiteBehavior::permissive();
        let record = sample_history_record("https://example.test/a", 200, b"ok");
        assert!(!behavior.is_not_found(&record).await);
    }
}
