use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::{QuestionPlacement, RequestMethod, ResponseShape, ServiceConfig};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("invalid answer service URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to answer service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("answer service returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected answer payload: {0}")]
    Payload(String),
}

impl AnswerError {
    /// Transport-level failures as opposed to a body that did not match.
    pub fn is_transport(&self) -> bool {
        !matches!(self, AnswerError::Payload(_))
    }
}

/// Anything that can turn a question into an answer.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, AnswerError>;
}

/// Pull the answer out of a response body according to `shape`.
pub fn extract_answer(shape: &ResponseShape, body: &str) -> Result<String, AnswerError> {
    let field_of = |value: &Value, field: &str| -> Result<String, AnswerError> {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AnswerError::Payload(format!("missing string field `{}`", field)))
    };

    match shape {
        ResponseShape::RawText => Ok(body.to_string()),
        ResponseShape::Object { field } => {
            let value: Value = serde_json::from_str(body)
                .map_err(|e| AnswerError::Payload(format!("invalid JSON: {}", e)))?;
            field_of(&value, field)
        }
        ResponseShape::Array { field } => {
            let value: Value = serde_json::from_str(body)
                .map_err(|e| AnswerError::Payload(format!("invalid JSON: {}", e)))?;
            let first = value
                .as_array()
                .ok_or_else(|| AnswerError::Payload("expected a JSON array".to_string()))?
                .first()
                .ok_or_else(|| AnswerError::Payload("empty answer array".to_string()))?;
            field_of(first, field)
        }
    }
}

/// Answer service reached over HTTP with reqwest.
pub struct HttpAnswerService {
    client: Client,
    config: ServiceConfig,
}

impl HttpAnswerService {
    pub fn new(config: ServiceConfig) -> Result<Self, AnswerError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Full request URL for `question`, with the question encoded into it.
    pub fn request_url(&self, question: &str) -> Result<Url, AnswerError> {
        let endpoint = self.config.endpoint();
        let invalid = |reason: String| AnswerError::InvalidUrl {
            url: endpoint.clone(),
            reason,
        };

        let mut url = Url::parse(&endpoint).map_err(|e| invalid(e.to_string()))?;
        match &self.config.question {
            QuestionPlacement::QueryParam(name) => {
                url.query_pairs_mut().append_pair(name, question);
            }
            QuestionPlacement::PathSegment => {
                url.path_segments_mut()
                    .map_err(|_| invalid("URL cannot take path segments".to_string()))?
                    .pop_if_empty()
                    .push(question);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    #[instrument(skip(self))]
    async fn ask(&self, question: &str) -> Result<String, AnswerError> {
        let url = self.request_url(question)?;
        debug!(%url, "Sending question to answer service");

        let request = match self.config.method {
            RequestMethod::Get => self.client.get(url),
            RequestMethod::Post => self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/json"),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Answer service request failed");
            return Err(AnswerError::Status { status, body });
        }

        let body = response.text().await?;
        let answer = extract_answer(&self.config.shape, &body)?;
        debug!(answer_len = answer.len(), "Received answer");
        Ok(answer)
    }
}
