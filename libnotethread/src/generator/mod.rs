//! Draft generation
//!
//! Turns note text into threads: the prompt is the user's template, the note,
//! and a fixed output-format instruction; the completion comes back as
//! `{"twitterThread": ["...", ...]}`; every fragment is stripped of hashtags.
//!
//! Notes are processed one after another. A failing note is recorded and the
//! batch moves on, so drafts already produced are never lost.

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::error::{ApiError, NotethreadError};
use crate::service::events::{Event, EventBus};
use crate::types::{Draft, Note};

pub mod mock;
pub mod openai;
pub mod provider;
pub mod proxy;

pub use provider::{select_provider, CompletionProvider, CompletionRequest, ProviderMode};

/// Key holding the thread in every completion response
pub const THREAD_KEY: &str = "twitterThread";

/// Appended to every prompt; never part of the editable template
pub const OUTPUT_FORMAT_INSTRUCTION: &str = "Give me back the twitter thread as a JSON object. It will be parsed by a strict JSON parser.\nReturn only JSON in the format: {\"twitterThread\": [\"...\", \"...\"]}";

pub const MIN_MAX_TOKENS: u32 = 300;
pub const MAX_MAX_TOKENS: u32 = 650;

/// Assemble the prompt for one note
pub fn build_prompt(note_content: &str, template: &str) -> String {
    format!(
        "{}\nHere is the content to use to generate the thread:\n{}\n{}",
        template.trim_end(),
        note_content.trim(),
        OUTPUT_FORMAT_INSTRUCTION
    )
}

/// Token budget: half the note length, clamped to 300..=650
pub fn max_tokens_for(note_content: &str) -> u32 {
    let half = note_content.chars().count() / 2;
    u32::try_from(half)
        .unwrap_or(u32::MAX)
        .clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
}

fn hashtag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*#\w+").expect("hashtag pattern is valid"))
}

/// Remove hashtags (`#` followed by word characters) from every fragment
///
/// Whitespace in front of a removed tag goes with it, fragments are trimmed,
/// and fragments left empty are dropped.
pub fn sanitize(thread: &[String]) -> Vec<String> {
    let pattern = hashtag_pattern();
    thread
        .iter()
        .map(|fragment| pattern.replace_all(fragment, "").trim().to_string())
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Parse a completion into the thread it carries
///
/// Tolerates a surrounding markdown code fence.
pub fn parse_thread(text: &str) -> Result<Vec<String>, ApiError> {
    let body = strip_code_fence(text.trim());
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ApiError::MalformedResponse(format!("completion is not JSON: {}", e)))?;

    let items = value
        .get(THREAD_KEY)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| {
            ApiError::MalformedResponse(format!("completion has no '{}' array", THREAD_KEY))
        })?;

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ApiError::MalformedResponse(format!("'{}' contains a non-string", THREAD_KEY))
            })
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// A note whose completion failed; its draft is left empty
#[derive(Debug, Clone)]
pub struct NoteFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of one generation pass
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Exactly one draft per note, in note order
    pub drafts: Vec<Draft>,
    pub failures: Vec<NoteFailure>,
}

impl GenerationReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Per-note result, classified as soon as the note resolves
enum NoteOutcome {
    Drafted(Draft),
    Failed(NoteFailure),
}

pub struct DraftGenerator {
    provider: Arc<dyn CompletionProvider>,
    template: String,
    events: EventBus,
}

impl DraftGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        template: impl Into<String>,
        events: EventBus,
    ) -> Self {
        Self {
            provider,
            template: template.into(),
            events,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Prompt and sanitize a single note
    pub async fn generate_for_note(&self, note: &Note) -> crate::Result<Vec<String>> {
        let request = CompletionRequest {
            prompt: build_prompt(&note.content, &self.template),
            max_tokens: max_tokens_for(&note.content),
        };
        let thread = self.provider.request_completion(&request).await?;
        Ok(sanitize(&thread))
    }

    /// Generate one draft per note, sequentially and in order
    ///
    /// A note that fails still gets an empty draft so drafts line up with
    /// notes; failures other than a malformed completion are also recorded
    /// in the report.
    pub async fn generate_drafts(&self, notes: &[Note]) -> GenerationReport {
        let total = notes.len();

        let outcomes: Vec<NoteOutcome> = stream::iter(notes.iter().enumerate())
            .then(|(index, note)| async move {
                tracing::debug!(
                    "Generating draft {}/{} from {} via {}",
                    index + 1,
                    total,
                    note.path.display(),
                    self.provider.name()
                );
                self.classify(note, self.generate_for_note(note).await)
            })
            .collect()
            .await;

        outcomes
            .into_iter()
            .fold(GenerationReport::default(), |mut report, outcome| {
                match outcome {
                    NoteOutcome::Drafted(draft) => report.drafts.push(draft),
                    NoteOutcome::Failed(failure) => {
                        report.drafts.push(Draft::default());
                        report.failures.push(failure);
                    }
                }
                report
            })
    }

    fn classify(&self, note: &Note, result: crate::Result<Vec<String>>) -> NoteOutcome {
        match result {
            Ok(fragments) => {
                self.events.emit(Event::NoteProcessed {
                    path: note.path.clone(),
                    fragments: fragments.len(),
                });
                NoteOutcome::Drafted(Draft::new(fragments))
            }
            Err(NotethreadError::Api(ApiError::MalformedResponse(message))) => {
                tracing::warn!(
                    "Malformed completion for {}: {}",
                    note.path.display(),
                    message
                );
                self.events.emit(Event::NoteProcessed {
                    path: note.path.clone(),
                    fragments: 0,
                });
                NoteOutcome::Drafted(Draft::default())
            }
            Err(e) => {
                tracing::error!("Generation failed for {}: {}", note.path.display(), e);
                self.events.emit(Event::NoteFailed {
                    path: note.path.clone(),
                    error: e.to_string(),
                });
                NoteOutcome::Failed(NoteFailure {
                    path: note.path.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}
