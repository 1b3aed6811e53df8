use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// HTTP method used to reach the answer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Get,
    Post,
}

/// Where the question travels in the outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum QuestionPlacement {
    /// `?<name>=<url-encoded question>`
    QueryParam(String),
    /// Appended to the path as one encoded segment.
    PathSegment,
}

/// Shape of a successful response body and the field carrying the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{"<field>": "answer"}`
    Object { field: String },
    /// `[{"<field>": "answer"}, ...]`, first element wins.
    Array { field: String },
    /// Body used as-is.
    RawText,
}

impl ResponseShape {
    pub fn object(field: &str) -> Self {
        ResponseShape::Object {
            field: field.to_string(),
        }
    }

    pub fn array(field: &str) -> Self {
        ResponseShape::Array {
            field: field.to_string(),
        }
    }

    /// Same shape, answer read from `field` instead. Raw text has no field.
    pub fn with_field(self, field: &str) -> Self {
        match self {
            ResponseShape::Object { .. } => ResponseShape::object(field),
            ResponseShape::Array { .. } => ResponseShape::array(field),
            ResponseShape::RawText => ResponseShape::RawText,
        }
    }
}

/// Shape selector for the command line; the field is given separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ShapeKind {
    Object,
    Array,
    Raw,
}

/// Known front-end variants of the answer service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// GET /ai/prompt?input=..., `{"response": ...}`
    #[default]
    Prompt,
    /// POST /ai/ask?question=..., `{"answer": ...}`
    Question,
    /// POST /ai/chat?message=..., `[{"text": ...}]`
    Message,
    /// GET /ai/prompt/<question>, raw text body
    Path,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Prompt => "prompt",
            Variant::Question => "question",
            Variant::Message => "message",
            Variant::Path => "path",
        };
        f.write_str(name)
    }
}

/// Everything needed to talk to one answer service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub path: String,
    pub method: RequestMethod,
    pub question: QuestionPlacement,
    pub shape: ResponseShape,
    /// Transport-level timeout; the controller itself never times out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn for_variant(variant: Variant, base_url: impl Into<String>) -> Self {
        let (method, path, question, shape) = match variant {
            Variant::Prompt => (
                RequestMethod::Get,
                "/ai/prompt",
                QuestionPlacement::QueryParam("input".to_string()),
                ResponseShape::object("response"),
            ),
            Variant::Question => (
                RequestMethod::Post,
                "/ai/ask",
                QuestionPlacement::QueryParam("question".to_string()),
                ResponseShape::object("answer"),
            ),
            Variant::Message => (
                RequestMethod::Post,
                "/ai/chat",
                QuestionPlacement::QueryParam("message".to_string()),
                ResponseShape::array("text"),
            ),
            Variant::Path => (
                RequestMethod::Get,
                "/ai/prompt",
                QuestionPlacement::PathSegment,
                ResponseShape::RawText,
            ),
        };

        Self {
            base_url: base_url.into(),
            path: path.to_string(),
            method,
            question,
            shape,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL joined with the configured path, without the question.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Overrides layered on top of a variant preset, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ServiceOverrides {
    pub path: Option<String>,
    pub method: Option<RequestMethod>,
    pub question_param: Option<String>,
    pub question_in_path: bool,
    pub shape: Option<ShapeKind>,
    pub answer_field: Option<String>,
    pub timeout: Option<Duration>,
}

impl ServiceOverrides {
    pub fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(method) = self.method {
            config.method = method;
        }
        if self.question_in_path {
            config.question = QuestionPlacement::PathSegment;
        } else if let Some(param) = self.question_param {
            config.question = QuestionPlacement::QueryParam(param);
        }

        let current_field = match &config.shape {
            ResponseShape::Object { field } | ResponseShape::Array { field } => field.clone(),
            ResponseShape::RawText => "response".to_string(),
        };
        if let Some(kind) = self.shape {
            config.shape = match kind {
                ShapeKind::Object => ResponseShape::object(&current_field),
                ShapeKind::Array => ResponseShape::array(&current_field),
                ShapeKind::Raw => ResponseShape::RawText,
            };
        }
        if let Some(field) = self.answer_field {
            config.shape = config.shape.with_field(&field);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Some(timeout);
        }
        config
    }
}
