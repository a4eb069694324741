//! Report stage: `GET /api/report/preview` and `GET /api/report/generate`

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Contract;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Html,
    Pdf,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "html" => Ok(ReportFormat::Html),
            "pdf" => Ok(ReportFormat::Pdf),
            _ => Err(format!("unknown report format '{}'", s)),
        }
    }
}

/// Rendered report preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportResponse {
    pub status: String,
    pub session_id: Uuid,
    pub format: ReportFormat,
    pub generated_at: String,
    pub content: String,
}

impl Contract for ReportResponse {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }
}

/// Raw report file returned by the generate endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDownload {
    pub format: ReportFormat,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ReportDownload {
    pub fn default_file_name(&self, session_id: &str) -> String {
        format!("report-{}.{}", session_id, self.format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decode;
    use serde_json::json;

    #[test]
    fn test_decode_report() {
        let body = json!({
            "status": "success",
            "session_id": "11111111-1111-1111-1111-111111111111",
            "format": "markdown",
            "generated_at": "2024-06-01T12:00:00",
            "content": "# AutoML Report"
        });
        let report: ReportResponse = decode(body).unwrap();
        assert_eq!(report.format, ReportFormat::Markdown);
        assert!(report.content.starts_with("# AutoML"));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let body = json!({
            "status": "success",
            "session_id": "11111111-1111-1111-1111-111111111111",
            "format": "docx",
            "generated_at": "2024-06-01T12:00:00",
            "content": ""
        });
        assert!(decode::<ReportResponse>(body).is_err());
    }

    #[test]
    fn test_format_parsing_and_file_name() {
        assert_eq!("MD".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert_eq!("pdf".parse::<ReportFormat>(), Ok(ReportFormat::Pdf));
        assert!("txt".parse::<ReportFormat>().is_err());

        let download = ReportDownload {
            format: ReportFormat::Html,
            content_type: None,
            bytes: Vec::new(),
        };
        assert_eq!(download.default_file_name("abc"), "report-abc.html");
    }
}
