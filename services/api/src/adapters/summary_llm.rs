//! services/api/src/adapters/summary_llm.rs
//!
//! This module contains the adapter for the session-summary LLM.
//! It implements the `SummaryGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use studypulse_core::{
    domain::{FinalMetrics, Session},
    ports::{PortError, PortResult, SummaryGenerationService},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SummaryGenerationService` using an
/// OpenAI-compatible LLM. The client is constructed once at startup and
/// handed in explicitly; there is no module-level singleton.
#[derive(Clone)]
pub struct OpenAiSummaryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSummaryAdapter {
    /// Creates a new `OpenAiSummaryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn describe_session(session: &Session, metrics: &FinalMetrics) -> String {
    let minutes = metrics.duration_seconds as f64 / 60.0;
    format!(
        "SUBJECT: {}\nDURATION_MINUTES: {:.0}\nENGAGEMENT_SCORE: {}\nATTENTION_RATE: {}%\n\
         AVG_POSTURE: {:.0}\nAVG_BLINK_RATE: {} bpm\nDISTRACTION_EPISODES: {}\n\
         HIGHLIGHTS: {}\nPAGES_VISITED: {}",
        session.subject.as_deref().unwrap_or("general study"),
        minutes,
        metrics.engagement_score,
        metrics.attention_rate,
        metrics.avg_posture_score,
        metrics.avg_blink_rate,
        metrics.distraction_count,
        metrics.total_highlights,
        metrics.pages_visited,
    )
}

//=========================================================================================
// `SummaryGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SummaryGenerationService for OpenAiSummaryAdapter {
    /// Generates a short recap of a finished study session from its metrics.
    async fn summarize_session(
        &self,
        session: &Session,
        metrics: &FinalMetrics,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(
                    "You are a study coach. Summarize the following study session metrics \
                     into two or three encouraging sentences for the student. Mention the \
                     engagement level, one thing that went well, and one concrete thing to \
                     improve next time. Do not repeat the raw numbers verbatim.",
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(describe_session(session, metrics))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Summary LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Summary LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}
