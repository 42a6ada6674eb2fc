//! UI-agnostic transcript types
//!
//! The interview state machine never renders anything itself; it reports to a
//! [`TranscriptSink`]. [`Transcript`] is the in-memory sink the terminal UI draws
//! from, and tests use it to inspect what the user would have seen.

use chrono::{DateTime, Local};

pub const INTERVIEWER: &str = "Interviewer";
pub const YOU: &str = "You";

/// Who a transcript entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    You,
    Agent,
    System,
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub sender: String,
    pub text: String,
    pub kind: EntryKind,
    pub timestamp: DateTime<Local>,
}

impl TranscriptEntry {
    pub fn you(text: impl Into<String>) -> Self {
        Self::new(YOU, text, EntryKind::You)
    }

    pub fn interviewer(text: impl Into<String>) -> Self {
        Self::new(INTERVIEWER, text, EntryKind::Agent)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("", text, EntryKind::System)
    }

    fn new(sender: &str, text: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            sender: sender.to_string(),
            text: text.into(),
            kind,
            timestamp: Local::now(),
        }
    }
}

/// Status indicator shown next to the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Starting,
    Active,
    Thinking,
    Error,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ready => "Ready",
            Status::Starting => "Starting...",
            Status::Active => "Active",
            Status::Thinking => "Thinking...",
            Status::Error => "Error",
        }
    }
}

/// A blocking message the user has to dismiss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

pub trait TranscriptSink {
    fn append_entry(&mut self, entry: TranscriptEntry);

    fn set_status(&mut self, status: Status);

    /// Show or hide the single "interviewer is typing" placeholder.
    fn set_typing(&mut self, typing: bool);

    fn show_notice(&mut self, notice: Notice);
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    status: Status,
    typing: bool,
    notice: Option<Notice>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn last_of(&self, kind: EntryKind) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.kind == kind)
    }
}

impl TranscriptSink for Transcript {
    fn append_entry(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    fn show_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }
}
