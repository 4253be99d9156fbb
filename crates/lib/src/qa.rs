//! Question-answering backend client (`POST /generate_QA_chain`).

use crate::http::{post_json, CallContext, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Produces the reply text for a user's question.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, ctx: &CallContext, question: &str) -> Result<String, TransportError>;
}

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    data: String,
}

/// Client for the QA backend.
#[derive(Clone)]
pub struct QaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl QaClient {
    pub fn new(base_url: &str, client: reqwest::Client, timeout_secs: u64) -> Self {
        Self {
            base_url: crate::config::normalize_base_url(base_url),
            client,
            timeout_secs,
        }
    }

    /// POST /generate_QA_chain. A body that cannot be decoded yields an empty answer;
    /// transport failures (including timeout) are returned.
    pub async fn ask(&self, ctx: &CallContext, question: &str) -> Result<String, TransportError> {
        let url = format!("{}/generate_QA_chain", self.base_url);
        let body = post_json(
            &self.client,
            ctx,
            &url,
            &[],
            &QuestionRequest { question },
            self.timeout_secs,
        )
        .await?;
        match serde_json::from_slice::<AnswerResponse>(&body) {
            Ok(resp) => Ok(resp.data),
            Err(e) => {
                log::warn!("qa backend returned an undecodable answer, replying empty: {}", e);
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl Answerer for QaClient {
    async fn answer(&self, ctx: &CallContext, question: &str) -> Result<String, TransportError> {
        self.ask(ctx, question).await
    }
}
