use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document as returned by `GET /documents/<id>`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub owner_email: Option<String>,
}

impl Document {
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// One row of the `GET /documents` listing
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocumentSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl DocumentSummary {
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Serialize, Debug)]
pub struct CreateDocumentRequest<'a> {
    pub title: &'a str,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateDocumentResponse {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Serialize, Debug)]
pub struct SaveDocumentRequest<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

/// Parse a backend timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let aware = parse_timestamp("2025-03-01T10:15:00+00:00").unwrap();
        assert_eq!(aware.hour(), 10);

        let naive = parse_timestamp("2025-03-01T10:15:00.123456").unwrap();
        assert_eq!(naive.minute(), 15);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn missing_content_reads_as_empty() {
        let doc: Document = serde_json::from_str(r#"{"id": "1", "title": "Notes", "content": null}"#).unwrap();
        assert_eq!(doc.content(), "");
    }
}
