// Question bank, question, community workflow, and extraction endpoints.
//
// The extraction upload is the one streaming call in the client: the backend
// answers with a server-sent-event progress feed instead of a JSON envelope.
// The feed is parsed incrementally from the byte stream and forwarded as
// typed `ExtractionEvent`s over an mpsc channel until a terminal complete or
// failed event arrives. Multipart request bodies cannot be replayed, so no
// reconnecting event-source wrapper is used here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::http::{ApiClient, ApiError, Page};

pub use crate::api::knowledge::Difficulty;

const QUESTION_PREFIX: &str = "/questions";

// ---------------------------------------------------------------------------
// Question bank types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionBankCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionBankUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionBankListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// List parameters for community banks (no status filter there).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommunityBankListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingBankListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityReviewRequest {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Question types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Technical,
    Scenario,
    Algorithm,
    Behavioral,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Question {
    pub id: String,
    pub bank_id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub category: Option<String>,
    pub difficulty: Difficulty,
    pub difficulty_score: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub usage_count: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Full question: the list fields plus answer material.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub reference_answer: Option<String>,
    pub answer_key_points: Option<Vec<String>>,
    pub scoring_criteria: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionCreate {
    pub bank_id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_criteria: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_criteria: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A question payload not yet saved to a bank: batch-create items and the
/// candidates produced by extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_criteria: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionBatchCreate {
    pub bank_id: String,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionBatchResponse {
    pub total: u32,
    pub questions: Vec<Question>,
}

// ---------------------------------------------------------------------------
// Extraction types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

/// Backend-tracked asynchronous extraction job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionTask {
    pub task_id: String,
    pub filename: String,
    pub bank_id: String,
    pub status: TaskStatus,
    pub total_chunks: u32,
    pub processed_chunks: u32,
    pub progress: f64,
    pub total_questions: Option<u32>,
    pub questions: Option<Vec<QuestionDraft>>,
    pub error: Option<String>,
    /// Unix seconds.
    pub created_at: f64,
    pub updated_at: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportQuestionsRequest {
    pub task_id: String,
    pub bank_id: String,
    /// Indices into the task's extracted questions; `None` imports all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_indices: Option<Vec<u32>>,
}

/// One message from the extraction progress feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    Progress {
        task_id: String,
        chunk: u32,
        total_chunks: u32,
        progress: f64,
        new_questions: Vec<QuestionDraft>,
        total_questions_so_far: u32,
    },
    Complete {
        task_id: String,
        total_questions: u32,
        questions: Vec<QuestionDraft>,
    },
    Failed {
        task_id: Option<String>,
        message: String,
    },
}

/// Raw feed payload: every field optional, populated per event kind.
#[derive(Debug, Deserialize)]
struct RawExtractionEvent {
    task_id: Option<String>,
    chunk: Option<u32>,
    total_chunks: Option<u32>,
    progress: Option<f64>,
    new_questions: Option<Vec<QuestionDraft>>,
    total_questions_so_far: Option<u32>,
    total_questions: Option<u32>,
    questions: Option<Vec<QuestionDraft>>,
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Question bank operations
// ---------------------------------------------------------------------------

pub async fn list_banks(
    client: &ApiClient,
    params: &QuestionBankListParams,
) -> Result<Page<QuestionBank>, ApiError> {
    client.get_query(&format!("{QUESTION_PREFIX}/banks"), params).await
}

pub async fn create_bank(
    client: &ApiClient,
    data: &QuestionBankCreate,
) -> Result<QuestionBank, ApiError> {
    client.post(&format!("{QUESTION_PREFIX}/banks"), data).await
}

pub async fn get_bank(client: &ApiClient, bank_id: &str) -> Result<QuestionBank, ApiError> {
    client.get(&format!("{QUESTION_PREFIX}/banks/{bank_id}")).await
}

pub async fn update_bank(
    client: &ApiClient,
    bank_id: &str,
    data: &QuestionBankUpdate,
) -> Result<QuestionBank, ApiError> {
    client.put(&format!("{QUESTION_PREFIX}/banks/{bank_id}"), data).await
}

pub async fn delete_bank(client: &ApiClient, bank_id: &str) -> Result<(), ApiError> {
    client.delete(&format!("{QUESTION_PREFIX}/banks/{bank_id}")).await
}

// ---------------------------------------------------------------------------
// Community workflow operations
// ---------------------------------------------------------------------------

pub async fn list_community_banks(
    client: &ApiClient,
    params: &CommunityBankListParams,
) -> Result<Page<QuestionBank>, ApiError> {
    client
        .get_query(&format!("{QUESTION_PREFIX}/community/banks"), params)
        .await
}

/// Submit one of the caller's banks for community publication.
pub async fn apply_community(client: &ApiClient, bank_id: &str) -> Result<QuestionBank, ApiError> {
    client
        .post_empty(&format!("{QUESTION_PREFIX}/banks/{bank_id}/apply-community"))
        .await
}

/// Review a pending community submission (admin operation).
pub async fn review_community(
    client: &ApiClient,
    bank_id: &str,
    data: &CommunityReviewRequest,
) -> Result<QuestionBank, ApiError> {
    client
        .post(&format!("{QUESTION_PREFIX}/banks/{bank_id}/review-community"), data)
        .await
}

pub async fn list_pending_banks(
    client: &ApiClient,
    params: &PendingBankListParams,
) -> Result<Page<QuestionBank>, ApiError> {
    client
        .get_query(&format!("{QUESTION_PREFIX}/community/pending"), params)
        .await
}

/// Copy a published community bank into the caller's own banks.
pub async fn copy_community_bank(
    client: &ApiClient,
    bank_id: &str,
) -> Result<QuestionBank, ApiError> {
    client
        .post_empty(&format!("{QUESTION_PREFIX}/community/banks/{bank_id}/copy"))
        .await
}

// ---------------------------------------------------------------------------
// Question operations
// ---------------------------------------------------------------------------

pub async fn list(
    client: &ApiClient,
    params: &QuestionListParams,
) -> Result<Page<Question>, ApiError> {
    client.get_query(QUESTION_PREFIX, params).await
}

pub async fn create(client: &ApiClient, data: &QuestionCreate) -> Result<Question, ApiError> {
    client.post(QUESTION_PREFIX, data).await
}

pub async fn batch_create(
    client: &ApiClient,
    data: &QuestionBatchCreate,
) -> Result<QuestionBatchResponse, ApiError> {
    client.post(&format!("{QUESTION_PREFIX}/batch"), data).await
}

pub async fn get(client: &ApiClient, question_id: &str) -> Result<QuestionDetail, ApiError> {
    client.get(&format!("{QUESTION_PREFIX}/{question_id}")).await
}

pub async fn update(
    client: &ApiClient,
    question_id: &str,
    data: &QuestionUpdate,
) -> Result<Question, ApiError> {
    client.put(&format!("{QUESTION_PREFIX}/{question_id}"), data).await
}

pub async fn delete(client: &ApiClient, question_id: &str) -> Result<(), ApiError> {
    client.delete(&format!("{QUESTION_PREFIX}/{question_id}")).await
}

// ---------------------------------------------------------------------------
// Extraction operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
struct TaskListParams {
    limit: u32,
}

pub async fn list_extraction_tasks(
    client: &ApiClient,
    limit: u32,
) -> Result<Vec<ExtractionTask>, ApiError> {
    client
        .get_query(&format!("{QUESTION_PREFIX}/extract/tasks"), &TaskListParams { limit })
        .await
}

pub async fn get_extraction_task(
    client: &ApiClient,
    task_id: &str,
) -> Result<ExtractionTask, ApiError> {
    client.get(&format!("{QUESTION_PREFIX}/extract/tasks/{task_id}")).await
}

/// Save extracted questions from a finished task into a bank.
pub async fn import_extracted_questions(
    client: &ApiClient,
    data: &ImportQuestionsRequest,
) -> Result<Vec<Question>, ApiError> {
    client.post(&format!("{QUESTION_PREFIX}/extract/import"), data).await
}

/// Upload a document and stream extraction progress as `ExtractionEvent`s
/// over `tx`.
///
/// Returns once the feed reaches a terminal event, the connection drops, or
/// the receiver is gone. A non-2xx response is mapped through the shared
/// status pipeline (so an expired token here still converges the client to
/// logged-out) and returned as the error.
pub async fn extract_questions(
    client: &ApiClient,
    bank_id: &str,
    filename: &str,
    file_bytes: Vec<u8>,
    tx: mpsc::Sender<ExtractionEvent>,
) -> Result<(), ApiError> {
    let part = reqwest::multipart::Part::bytes(file_bytes).file_name(filename.to_string());
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("bank_id", bank_id.to_string());

    let response = client
        .streaming_post(&format!("{QUESTION_PREFIX}/extract"))
        .multipart(form)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(client.error_from_response(response).await);
    }

    let mut parser = SseParser::new();
    let mut stream = response.bytes_stream();
    let mut terminal = false;

    'outer: while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(?err, "extraction stream error");
                let _ = tx
                    .send(ExtractionEvent::Failed {
                        task_id: None,
                        message: format!("stream error: {err}"),
                    })
                    .await;
                return Ok(());
            }
        };

        for frame in parser.push(&chunk) {
            let Some(event) = decode_event(&frame) else {
                debug!(event = %frame.event, "ignoring extraction feed event");
                continue;
            };
            terminal = matches!(
                event,
                ExtractionEvent::Complete { .. } | ExtractionEvent::Failed { .. }
            );
            if tx.send(event).await.is_err() {
                // Receiver dropped — abort the stream.
                return Ok(());
            }
            if terminal {
                break 'outer;
            }
        }
    }

    if !terminal {
        let _ = tx
            .send(ExtractionEvent::Failed {
                task_id: None,
                message: "stream ended before a terminal event".to_string(),
            })
            .await;
    }

    Ok(())
}

/// Decode one SSE frame into a typed event. Returns `None` for unknown or
/// unparsable frames, which the feed loop skips.
fn decode_event(frame: &SseFrame) -> Option<ExtractionEvent> {
    let raw: RawExtractionEvent = match serde_json::from_str(&frame.data) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(event = %frame.event, error = %e, "unparsable extraction event payload");
            return None;
        }
    };

    match frame.event.as_str() {
        "progress" => Some(ExtractionEvent::Progress {
            task_id: raw.task_id?,
            chunk: raw.chunk.unwrap_or(0),
            total_chunks: raw.total_chunks.unwrap_or(0),
            progress: raw.progress.unwrap_or(0.0),
            new_questions: raw.new_questions.unwrap_or_default(),
            total_questions_so_far: raw.total_questions_so_far.unwrap_or(0),
        }),
        "complete" => Some(ExtractionEvent::Complete {
            task_id: raw.task_id?,
            total_questions: raw.total_questions.unwrap_or(0),
            questions: raw.questions.unwrap_or_default(),
        }),
        "error" => Some(ExtractionEvent::Failed {
            task_id: raw.task_id,
            message: raw.message.unwrap_or_else(|| "extraction failed".to_string()),
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SSE frame parsing
// ---------------------------------------------------------------------------

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE parser over arbitrary byte chunks. Frames are separated
/// by a blank line; chunk boundaries may fall anywhere, so input is buffered
/// until a complete frame is available.
pub(crate) struct SseParser {
    buf: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Feed a chunk and drain every complete frame it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        loop {
            let lf = self.buf.find("\n\n").map(|i| (i, 2));
            let crlf = self.buf.find("\r\n\r\n").map(|i| (i, 4));
            let boundary = match (lf, crlf) {
                (Some(a), Some(b)) => Some(std::cmp::min_by_key(a, b, |&(i, _)| i)),
                (a, b) => a.or(b),
            };
            let Some((at, delim_len)) = boundary else {
                break;
            };

            let block = self.buf[..at].to_string();
            self.buf.drain(..at + delim_len);
            if let Some(frame) = parse_frame(&block) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Parse one frame block. Returns `None` for blocks with no data lines
/// (comments, keep-alives).
fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut event = "message".to_string();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim_start().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
