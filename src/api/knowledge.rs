// Knowledge document endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{ApiClient, ApiError, Page};

const KNOWLEDGE_PREFIX: &str = "/knowledge/documents";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub doc_type: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub related_positions: Option<Vec<String>>,
    pub difficulty: Option<String>,
    pub vectorized: bool,
    pub chunk_count: u32,
    pub view_count: u32,
    pub reference_count: u32,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full document: the list fields plus the body content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeDocumentDetail {
    #[serde(flatten)]
    pub document: KnowledgeDocument,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeDocumentCreate {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_positions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeDocumentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_positions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeDocumentListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub async fn list(
    client: &ApiClient,
    params: &KnowledgeDocumentListParams,
) -> Result<Page<KnowledgeDocument>, ApiError> {
    client.get_query(KNOWLEDGE_PREFIX, params).await
}

pub async fn create(
    client: &ApiClient,
    data: &KnowledgeDocumentCreate,
) -> Result<KnowledgeDocument, ApiError> {
    client.post(KNOWLEDGE_PREFIX, data).await
}

pub async fn get(client: &ApiClient, id: &str) -> Result<KnowledgeDocumentDetail, ApiError> {
    client.get(&format!("{KNOWLEDGE_PREFIX}/{id}")).await
}

pub async fn update(
    client: &ApiClient,
    id: &str,
    data: &KnowledgeDocumentUpdate,
) -> Result<KnowledgeDocument, ApiError> {
    client.put(&format!("{KNOWLEDGE_PREFIX}/{id}"), data).await
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<(), ApiError> {
    client.delete(&format!("{KNOWLEDGE_PREFIX}/{id}")).await
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
