use tracing::debug;

use crate::models::ListingRecord;

/// Where one submission stands. Transient phases only exist while a request
/// is being handled; resting phases are what gets rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Fetching,
    NeedsManualPaste,
    Analyzing { manual: bool },
    Done(Box<ListingRecord>),
}

pub enum Event {
    Submit { url: String },
    Fetched,
    FetchExhausted,
    PasteSubmitted { content: String },
    Analyzed(ListingRecord),
    Failed(String),
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Submit { .. } => "submit",
            Event::Fetched => "fetched",
            Event::FetchExhausted => "fetch_exhausted",
            Event::PasteSubmitted { .. } => "paste_submitted",
            Event::Analyzed(_) => "analyzed",
            Event::Failed(_) => "failed",
        }
    }
}

/// Per-submission view state. Every transition consumes the old value.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub url: String,
    pub phase: Phase,
    pub error: Option<String>,
    /// Text from the manual-paste form, kept so a failed attempt can be retried.
    pub pasted: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            url: String::new(),
            phase: Phase::Idle,
            error: None,
            pasted: None,
        }
    }
}

impl SessionState {
    /// State carried back by the manual-paste form.
    pub fn awaiting_paste(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            phase: Phase::NeedsManualPaste,
            error: None,
            pasted: None,
        }
    }

    pub fn record(&self) -> Option<&ListingRecord> {
        match &self.phase {
            Phase::Done(record) => Some(record),
            _ => None,
        }
    }

    pub fn apply(self, event: Event) -> SessionState {
        let from = phase_name(&self.phase);
        let next = match (self.phase, event) {
            (Phase::Idle | Phase::NeedsManualPaste | Phase::Done(_), Event::Submit { url }) => SessionState {
                url,
                phase: Phase::Fetching,
                error: None,
                pasted: None,
            },
            (Phase::Fetching, Event::Fetched) => SessionState {
                url: self.url,
                phase: Phase::Analyzing { manual: false },
                error: None,
                pasted: None,
            },
            (Phase::Fetching, Event::FetchExhausted) => SessionState {
                url: self.url,
                phase: Phase::NeedsManualPaste,
                error: None,
                pasted: None,
            },
            (Phase::NeedsManualPaste, Event::PasteSubmitted { content }) => SessionState {
                url: self.url,
                phase: Phase::Analyzing { manual: true },
                error: None,
                pasted: Some(content),
            },
            (Phase::Analyzing { .. }, Event::Analyzed(record)) => SessionState {
                url: self.url,
                phase: Phase::Done(Box::new(record)),
                error: None,
                pasted: None,
            },
            (Phase::Analyzing { manual: false }, Event::Failed(message)) => SessionState {
                url: self.url,
                phase: Phase::Idle,
                error: Some(message),
                pasted: None,
            },
            (Phase::Analyzing { manual: true }, Event::Failed(message)) => SessionState {
                url: self.url,
                phase: Phase::NeedsManualPaste,
                error: Some(message),
                pasted: self.pasted,
            },
            (phase, event) => {
                debug!(from, event = event.name(), "ignored session event");
                return SessionState {
                    url: self.url,
                    phase,
                    error: self.error,
                    pasted: self.pasted,
                };
            }
        };
        debug!(from, to = phase_name(&next.phase), "session transition");
        next
    }
}

fn phase_name(phase: &Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Fetching => "fetching",
        Phase::NeedsManualPaste => "needs_manual_paste",
        Phase::Analyzing { manual: false } => "analyzing",
        Phase::Analyzing { manual: true } => "analyzing_manual",
        Phase::Done(_) => "done",
    }
}
