pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod questions;
pub mod role;
pub mod speech;
pub mod transcript;

// Re-export main types for convenience
pub use backend::{BackendClient, Health, InterviewBackend, MessageReply, StartReply, DEFAULT_BASE_URL};
pub use config::{Config, SpeechConfig};
pub use controller::{InterviewController, OutgoingAnswer};
pub use error::{BackendError, InterviewError, SpeechError, ValidationError};
pub use questions::{QuestionSession, RoleQuestionTable};
pub use role::{is_valid_role, role_suggestions};
pub use speech::{
    Availability, CommandRecognizer, CommandSpec, CommandSynthesizer, Microphone, NullSpeech,
    RecognitionEvent, Recognizer, SpeechGate, Synthesizer,
};
pub use transcript::{EntryKind, Notice, Status, Transcript, TranscriptEntry, TranscriptSink};
