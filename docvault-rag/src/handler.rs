//! Transport-agnostic entry points.
//!
//! [`EventHandler`] is what an HTTP server, a chat bot, or a CLI calls into.
//! [`PipelineHandler`] implements it over a shared [`RagPipeline`] and also
//! exposes the health and reset operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docvault_rag::{EventHandler, PipelineHandler};
//!
//! let handler = PipelineHandler::new(Arc::new(pipeline), "general");
//! let response = handler.on_query("general", "How do I configure X?").await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::document::SourceFile;
use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::response::{HealthResponse, IngestResponse, ResetResponse, SearchResponse};

/// Reply to a bare mention.
pub const GREETING: &str = "Hello World!";

/// Reply when nothing in the collection matched.
pub const NO_MATCH: &str = "I couldn't find anything about that.";

/// An incoming chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Raw message text, possibly containing `<@USER>` mention tokens.
    pub text: String,
    /// Collection to answer from; the handler's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// The text to send back to the chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// The calls a transport makes into the pipeline.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Answer a chat message.
    async fn on_message(&self, message: ChatMessage) -> Result<ChatReply>;

    /// Ingest uploaded files. Failures are reported in the response body.
    async fn on_upload(&self, collection: &str, files: Vec<SourceFile>) -> IngestResponse;

    /// Answer a search query.
    async fn on_query(&self, collection: &str, query: &str) -> Result<SearchResponse>;
}

/// [`EventHandler`] backed by a shared [`RagPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineHandler {
    pipeline: Arc<RagPipeline>,
    default_collection: String,
}

impl PipelineHandler {
    /// Create a handler; `default_collection` answers chat messages that name none.
    pub fn new(pipeline: Arc<RagPipeline>, default_collection: impl Into<String>) -> Self {
        Self { pipeline, default_collection: default_collection.into() }
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// Probe the vector store.
    pub async fn health(&self) -> HealthResponse {
        match self.pipeline.heartbeat().await {
            Ok(heartbeat) if heartbeat > 0 => HealthResponse::healthy(heartbeat),
            Ok(_) => {
                warn!("vector store returned an empty heartbeat");
                HealthResponse::down()
            }
            Err(e) => {
                warn!(error = %e, "vector store heartbeat failed");
                HealthResponse::down()
            }
        }
    }

    /// Destroy every collection.
    pub async fn reset(&self) -> ResetResponse {
        match self.pipeline.reset().await {
            Ok(()) => ResetResponse::ok(),
            Err(_) => ResetResponse::failed(),
        }
    }
}

/// Drop `<@...>` mention tokens and surrounding whitespace.
fn strip_mentions(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !(word.starts_with("<@") && word.ends_with('>')))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl EventHandler for PipelineHandler {
    async fn on_message(&self, message: ChatMessage) -> Result<ChatReply> {
        let question = strip_mentions(&message.text);
        if question.is_empty() {
            return Ok(ChatReply { text: GREETING.to_string(), sources: Vec::new() });
        }

        let collection = message.collection.as_deref().unwrap_or(self.default_collection.as_str());
        info!(collection, "answering chat message");
        let answer = self.pipeline.retrieve(collection, &question).await?;

        if answer.matched_text.trim().is_empty() {
            return Ok(ChatReply { text: NO_MATCH.to_string(), sources: answer.sources });
        }
        let text = if answer.sources.is_empty() {
            answer.matched_text
        } else {
            format!("{}\n\nSources: {}", answer.matched_text, answer.sources.join(", "))
        };
        Ok(ChatReply { text, sources: answer.sources })
    }

    async fn on_upload(&self, collection: &str, files: Vec<SourceFile>) -> IngestResponse {
        match self.pipeline.ingest(collection, files).await {
            Ok(report) => report.into(),
            Err(e) => {
                error!(collection, error = %e, partial = e.may_be_partial(), "upload failed");
                IngestResponse::from(&e)
            }
        }
    }

    async fn on_query(&self, collection: &str, query: &str) -> Result<SearchResponse> {
        self.pipeline.retrieve(collection, query).await.map(SearchResponse::from)
    }
}
