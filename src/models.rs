//! Data models for tasks, article slots and the callback report.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Task`]: One keyword-rewrite request and its fixed set of slots
//! - [`ArticleSlot`]: One attempted article within a task
//! - [`CallbackPayload`]: The single report delivered back to the caller
//! - HTTP request/response bodies for the `/process` and `/health` endpoints
//!
//! Wire formats use camelCase field names to match what calling systems send
//! and expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::rewrite::is_error_sentinel;
use crate::utils::char_len;

/// Terminal and non-terminal states of an [`ArticleSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One attempted article within a [`Task`].
///
/// A slot leaves `Pending` exactly once, through [`ArticleSlot::succeed`] or
/// [`ArticleSlot::fail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSlot {
    /// Position within the task; slot 0 is the primary article.
    pub index: usize,
    pub status: SlotStatus,
    pub source_url: Option<String>,
    pub source_title: Option<String>,
    pub source_content: Option<String>,
    pub rewritten_content: Option<String>,
    pub error_message: Option<String>,
}

/// A successfully extracted and rewritten article.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenArticle {
    pub url: String,
    pub title: String,
    pub content: String,
    pub rewritten: String,
}

impl ArticleSlot {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            status: SlotStatus::Pending,
            source_url: None,
            source_title: None,
            source_content: None,
            rewritten_content: None,
            error_message: None,
        }
    }

    pub fn succeed(&mut self, article: RewrittenArticle) {
        debug_assert_eq!(self.status, SlotStatus::Pending);
        self.status = SlotStatus::Succeeded;
        self.source_url = Some(article.url);
        self.source_title = Some(article.title);
        self.source_content = Some(article.content);
        self.rewritten_content = Some(article.rewritten);
        self.error_message = None;
    }

    /// Mark the slot failed. `url` is the last URL tried, if any.
    pub fn fail(&mut self, url: Option<String>, reason: impl Into<String>) {
        debug_assert_eq!(self.status, SlotStatus::Pending);
        self.status = SlotStatus::Failed;
        self.source_url = url;
        self.error_message = Some(reason.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != SlotStatus::Pending
    }

    /// The success invariant: a title, long-enough content and a rewrite that
    /// is not an error sentinel are all present.
    pub fn satisfies_success_invariant(&self, min_content_chars: usize) -> bool {
        let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.status == SlotStatus::Succeeded
            && non_empty(&self.source_title)
            && non_empty(&self.rewritten_content)
            && !self.rewritten_content.as_deref().is_some_and(is_error_sentinel)
            && self
                .source_content
                .as_deref()
                .is_some_and(|c| char_len(c) >= min_content_chars)
    }
}

/// One keyword-rewrite request.
///
/// Owned by exactly one worker from creation until its callback is delivered.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: String,
    pub keyword: String,
    pub callback_address: Url,
    pub slots: Vec<ArticleSlot>,
    pub created_at: DateTime<Utc>,
    /// Registry generation handed out when the task was accepted.
    pub generation: u64,
}

impl Task {
    pub fn new(task_id: String, keyword: String, callback_address: Url, slot_count: usize) -> Self {
        Self {
            task_id,
            keyword,
            callback_address,
            slots: (0..slot_count).map(ArticleSlot::pending).collect(),
            created_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ArticleSlot> {
        self.slots
            .iter()
            .filter(|s| s.status == SlotStatus::Succeeded)
    }

    pub fn status(&self) -> TaskStatus {
        if self.succeeded().next().is_some() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// The report sent to the callback address once every slot is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallbackPayload {
    #[serde(rename_all = "camelCase")]
    Completed {
        task_id: String,
        source_url: Option<String>,
        source_title: Option<String>,
        source_content: Option<String>,
        rewritten_content: Option<String>,
        all_articles: Vec<ArticleSlot>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        task_id: String,
        error_message: String,
    },
}

impl CallbackPayload {
    /// Build the report for a task whose slots are all terminal.
    ///
    /// The primary article is the lowest-index succeeded slot.
    pub fn from_task(task: &Task) -> Self {
        match task.succeeded().next() {
            Some(primary) => Self::Completed {
                task_id: task.task_id.clone(),
                source_url: primary.source_url.clone(),
                source_title: primary.source_title.clone(),
                source_content: primary.source_content.clone(),
                rewritten_content: primary.rewritten_content.clone(),
                all_articles: task.slots.clone(),
            },
            None => Self::Failed {
                task_id: task.task_id.clone(),
                error_message: task
                    .slots
                    .iter()
                    .map(|s| {
                        format!(
                            "slot {}: {}",
                            s.index + 1,
                            s.error_message.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            },
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Completed { task_id, .. } | Self::Failed { task_id, .. } => task_id,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed { .. } => TaskStatus::Completed,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }
}

/// Caller correlation ids arrive as either JSON strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskIdInput {
    Text(String),
    Number(serde_json::Number),
}

impl TaskIdInput {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Body of `POST /process`. Fields are optional here so that missing ones can
/// be reported as a 400 rather than a deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub keyword: Option<String>,
    #[serde(alias = "rewrite_id", alias = "task_id")]
    pub task_id: Option<TaskIdInput>,
    #[serde(alias = "callback_url", alias = "callbackUrl")]
    pub callback_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub status: String,
    pub task_id: String,
    pub keyword: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_tasks: usize,
    pub provider: String,
    pub model: String,
    pub slots: usize,
    pub max_concurrent_tasks: usize,
    pub timeouts: TimeoutsEcho,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsEcho {
    pub discovery_secs: u64,
    pub fetch_secs: u64,
    pub rewrite_secs: u64,
    pub callback_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str) -> RewrittenArticle {
        RewrittenArticle {
            url: url.to_string(),
            title: "Title".to_string(),
            content: "x".repeat(250),
            rewritten: "Rewritten".to_string(),
        }
    }

    fn task() -> Task {
        Task::new(
            "rw-1".into(),
            "test".into(),
            Url::parse("http://localhost:3000/api/callback").unwrap(),
            3,
        )
    }

    #[test]
    fn test_new_task_has_pending_slots() {
        let task = task();
        assert_eq!(task.slots.len(), 3);
        assert!(task.slots.iter().all(|s| s.status == SlotStatus::Pending));
        assert_eq!(
            task.slots.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_slot_success_invariant() {
        let mut slot = ArticleSlot::pending(0);
        slot.succeed(article("https://a.vn/1"));
        assert!(slot.is_terminal());
        assert!(slot.satisfies_success_invariant(200));
        assert!(!slot.satisfies_success_invariant(300));

        let mut sentinel = ArticleSlot::pending(1);
        sentinel.succeed(RewrittenArticle {
            rewritten: "Lỗi: hết hạn mức".into(),
            ..article("https://a.vn/2")
        });
        assert!(!sentinel.satisfies_success_invariant(200));
    }

    #[test]
    fn test_failed_payload_lists_every_slot() {
        let mut task = task();
        for slot in task.slots.iter_mut() {
            slot.fail(None, "no candidate article found");
        }
        let payload = CallbackPayload::from_task(&task);
        assert_eq!(payload.status(), TaskStatus::Failed);
        match payload {
            CallbackPayload::Failed { error_message, .. } => {
                assert_eq!(error_message.matches("no candidate article found").count(), 3);
                assert!(error_message.starts_with("slot 1:"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_completed_payload_uses_first_success_as_primary() {
        let mut task = task();
        task.slots[0].fail(Some("https://a.vn/0".into()), "title is missing");
        task.slots[1].succeed(article("https://a.vn/1"));
        task.slots[2].succeed(article("https://a.vn/2"));

        let payload = CallbackPayload::from_task(&task);
        match &payload {
            CallbackPayload::Completed {
                source_url,
                all_articles,
                ..
            } => {
                assert_eq!(source_url.as_deref(), Some("https://a.vn/1"));
                assert_eq!(all_articles.len(), 3);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let mut task = task();
        task.slots[0].succeed(article("https://a.vn/1"));
        task.slots[1].fail(None, "boom");
        task.slots[2].fail(None, "boom");

        let json = serde_json::to_value(CallbackPayload::from_task(&task)).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["taskId"], "rw-1");
        assert_eq!(json["sourceUrl"], "https://a.vn/1");
        assert_eq!(json["rewrittenContent"], "Rewritten");
        assert_eq!(json["allArticles"][0]["status"], "succeeded");
        assert_eq!(json["allArticles"][1]["status"], "failed");
        assert_eq!(json["allArticles"][1]["errorMessage"], "boom");

        let failed = CallbackPayload::Failed {
            task_id: "rw-2".into(),
            error_message: "slot 1: boom".into(),
        };
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["taskId"], "rw-2");
        assert_eq!(json["errorMessage"], "slot 1: boom");
    }

    #[test]
    fn test_process_request_accepts_numeric_id_and_aliases() {
        let json = r#"{"keyword":"giá vàng","rewrite_id":42,"callback_url":"http://localhost/cb"}"#;
        let req: ProcessRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.keyword.as_deref(), Some("giá vàng"));
        assert_eq!(req.task_id.unwrap().into_string(), "42");
        assert_eq!(req.callback_address.as_deref(), Some("http://localhost/cb"));
    }

    #[test]
    fn test_process_request_missing_fields() {
        let req: ProcessRequest = serde_json::from_str(r#"{"keyword":"x"}"#).unwrap();
        assert!(req.task_id.is_none());
        assert!(req.callback_address.is_none());
    }
}
