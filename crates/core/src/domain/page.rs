use crate::llm::html::ExtractRule;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One generated HTML document, replaced wholesale on every successful run.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPage {
    pub html: String,
    pub rule: ExtractRule,
    pub generated_at: DateTime<Utc>,
}
