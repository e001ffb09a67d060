use serde::{Deserialize, Serialize};
use serde_json::Value;
use trialsage::cleanup::TextIssue;

#[derive(Debug, Deserialize, Default)]
pub struct DebugParams {
    pub debug: Option<bool>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    pub result: T,
}

/// The body of `POST /api/extract` and `POST /api/text/repair`.
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepairResponse {
    pub text: String,
    pub issues_fixed: Vec<TextIssue>,
}

/// The form posted by the result page's download buttons.
#[derive(Debug, Deserialize)]
pub struct ExportForm {
    pub result: String,
}
