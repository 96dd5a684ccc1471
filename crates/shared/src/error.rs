use serde::{Deserialize, Serialize};

/// Body of a non-2xx response from the optimizer service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Validation(Vec<ValidationIssue>),
    Other(serde_json::Value),
}

/// One entry of a request validation failure list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub msg: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loc: Vec<serde_json::Value>,
}

impl ServiceErrorBody {
    pub fn message(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(ErrorDetail::Message(detail.into())),
        }
    }

    /// Human-readable detail, if the service supplied a usable one.
    pub fn detail_message(&self) -> Option<String> {
        let message = match self.detail.as_ref()? {
            ErrorDetail::Message(message) => message.trim().to_string(),
            ErrorDetail::Validation(issues) => issues
                .iter()
                .map(|issue| issue.msg.trim())
                .filter(|msg| !msg.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
            ErrorDetail::Other(serde_json::Value::Null) => String::new(),
            ErrorDetail::Other(value) => value.to_string(),
        };
        (!message.is_empty()).then_some(message)
    }
}
