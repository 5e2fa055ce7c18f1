// Position endpoints.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{ApiClient, ApiError, Page};

const POSITION_PREFIX: &str = "/positions";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Junior,
    Mid,
    Senior,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Position {
    pub id: String,
    pub name: String,
    pub code: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub difficulty_level: Option<DifficultyLevel>,
    /// Free-form, locale-specific requirement string relayed as-is.
    pub education_requirement: Option<String>,
    pub default_question_count: u32,
    pub default_duration: u32,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PositionCreate {
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_weights: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<DifficultyLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_requirement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_question_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PositionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_weights: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<DifficultyLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_requirement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_question_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PositionListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub async fn list(
    client: &ApiClient,
    params: &PositionListParams,
) -> Result<Page<Position>, ApiError> {
    client.get_query(POSITION_PREFIX, params).await
}

pub async fn create(client: &ApiClient, data: &PositionCreate) -> Result<Position, ApiError> {
    client.post(POSITION_PREFIX, data).await
}

pub async fn get(client: &ApiClient, position_id: &str) -> Result<Position, ApiError> {
    client.get(&format!("{POSITION_PREFIX}/{position_id}")).await
}

pub async fn update(
    client: &ApiClient,
    position_id: &str,
    data: &PositionUpdate,
) -> Result<Position, ApiError> {
    client.put(&format!("{POSITION_PREFIX}/{position_id}"), data).await
}

pub async fn delete(client: &ApiClient, position_id: &str) -> Result<(), ApiError> {
    client.delete(&format!("{POSITION_PREFIX}/{position_id}")).await
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
