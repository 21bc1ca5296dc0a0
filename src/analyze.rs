use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::error::Category;
use tracing::{info, warn};

use crate::models::ListingRecord;

// ── Constants ────────────────────────────────────────────────────────────────

pub const MIN_CONTENT_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 50_000;
const SNIPPET_CHARS: usize = 500;
const FENCE: &str = "```";

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?i:json)?\n?").unwrap());

// ── Error types ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unreadable provider response: {0}")]
    Decode(String),
    #[error("provider returned no text")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "Listing content is too short or empty ({0} characters). Please paste more content from the listing."
    )]
    ContentTooShort(usize),
    #[error("API error: {0}")]
    Generation(String),
    #[error("Empty response from the extraction service")]
    EmptyResponse,
    #[error("Invalid JSON response. First 500 chars: {snippet}")]
    InvalidJson { snippet: String },
    #[error("Response did not match the listing schema: {0}")]
    Schema(String),
}

impl From<GenerationError> for ValidationError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Empty => ValidationError::EmptyResponse,
            other => ValidationError::Generation(other.to_string()),
        }
    }
}

// ── Extraction service seam ──────────────────────────────────────────────────

/// Text generation backend that turns an instruction into a reply.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

pub struct Analyzer {
    service: Arc<dyn ExtractionService>,
}

impl Analyzer {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self { service }
    }

    pub async fn analyze(&self, content: &str, url: &str) -> Result<ListingRecord, ValidationError> {
        let length = content.trim().chars().count();
        if length < MIN_CONTENT_CHARS {
            return Err(ValidationError::ContentTooShort(length));
        }

        let prompt = build_prompt(content, url);
        info!(url, prompt_bytes = prompt.len(), "requesting listing extraction");

        let reply = self.service.generate(&prompt).await?;
        let record = decode_reply(&reply)
            .inspect_err(|e| warn!(url, error = %e, "extraction reply rejected"))?;

        info!(url, title = %record.title, "listing analyzed");
        Ok(record)
    }
}

// ── Prompt ───────────────────────────────────────────────────────────────────

/// Cut at a character boundary, never inside a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_prompt(content: &str, url: &str) -> String {
    let content = truncate_chars(content, MAX_CONTENT_CHARS);
    format!(
        r#"You are a vehicle valuation expert. Read the car listing below and extract the data it actually contains. Do not estimate or invent listing facts.

LISTING URL: {url}

LISTING CONTENT:
{content}

From the listing, extract:
1. Year, make, model and trim
2. Exterior color
3. Mileage exactly as listed
4. Location of the sale
5. Engine, transmission and drivetrain
6. Notable options and equipment
7. Condition, service history and modifications
8. Issues or flaws that are mentioned
9. Current bid or asking price, if shown

Then write:
- A two-paragraph overview of what makes this particular car interesting
- Three value estimates grounded in its actual condition and mileage: low (quick sale), medium (fair market), high (patient seller)

Use only data from the listing. When something is not mentioned, write "Not specified". When no issues are mentioned, set concerns to ["None mentioned"].

Respond with valid JSON only, in exactly this shape:
{{
  "title": "Year Make Model Trim",
  "year": 2003,
  "make": "Porsche",
  "model": "911 Carrera 4S",
  "color": "Guards Red",
  "location": "City, State",
  "specs": {{
    "engine": "Engine as listed",
    "power": "Horsepower if listed",
    "torque": "Torque if listed",
    "transmission": "Transmission as listed",
    "drivetrain": "AWD/RWD/FWD"
  }},
  "mileage": "Mileage as listed",
  "options": ["Option 1", "Option 2"],
  "highlights": ["Notable feature", "Recent service item"],
  "concerns": ["Issue mentioned"],
  "overview": "First paragraph.\n\nSecond paragraph.",
  "values": {{
    "low": 44500,
    "medium": 49000,
    "high": 55000
  }},
  "valueFactors": "Short explanation citing condition, mileage and options"
}}"#
    )
}

// ── Reply repair and decode ──────────────────────────────────────────────────

/// Remove code-fence markers the model sometimes wraps JSON in.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains(FENCE) {
        out = FENCE_RE.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

pub fn decode_reply(reply: &str) -> Result<ListingRecord, ValidationError> {
    let text = strip_code_fences(reply);
    if text.is_empty() {
        return Err(ValidationError::EmptyResponse);
    }
    serde_json::from_str::<ListingRecord>(&text).map_err(|e| match e.classify() {
        Category::Data => ValidationError::Schema(e.to_string()),
        Category::Syntax | Category::Eof | Category::Io => ValidationError::InvalidJson {
            snippet: truncate_chars(&text, SNIPPET_CHARS).to_string(),
        },
    })
}
