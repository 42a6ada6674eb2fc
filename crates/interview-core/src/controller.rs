//! The interview session state machine.
//!
//! Every user action is split into a `begin_*` step (validation, optimistic
//! transcript updates) and a `finish_*` step that applies the backend result.
//! The UI runs the request in between on its own task; tests and simple
//! callers use the `async` helpers that do all three.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::backend::{InterviewBackend, MessageReply, StartReply};
use crate::error::{BackendError, InterviewError, Result, SpeechError, ValidationError};
use crate::questions::{QuestionSession, RoleQuestionTable};
use crate::role::{is_valid_role, sample_suggestions};
use crate::speech::{Microphone, SpeechGate};
use crate::transcript::{Notice, Status, TranscriptEntry, TranscriptSink};

const SUGGESTION_COUNT: usize = 5;

pub const WELCOME: &str =
    "Welcome! Enter a role and press Enter to start the interview. Press Ctrl-R to speak answers.";
pub const SEND_FAILED: &str = "Network error while sending message.";

/// An answer that passed validation and is ready to go to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAnswer {
    pub session_id: String,
    pub text: String,
}

pub struct InterviewController {
    table: RoleQuestionTable,
    local: QuestionSession,
    session_id: Option<String>,
    role: Option<String>,
    starting: bool,
    sending: bool,
    backend_url: String,
    rng: StdRng,
}

impl InterviewController {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            table: RoleQuestionTable::builtin(),
            local: QuestionSession::new(),
            session_id: None,
            role: None,
            starting: false,
            sending: false,
            backend_url: backend_url.into(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_table(mut self, table: RoleQuestionTable) -> Self {
        self.table = table;
        self.local = QuestionSession::new();
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_starting(&self) -> bool {
        self.starting
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn local_session(&self) -> &QuestionSession {
        &self.local
    }

    pub fn welcome(&self, sink: &mut impl TranscriptSink) {
        sink.append_entry(TranscriptEntry::system(WELCOME));
    }

    /// Validate the role and mark a start as in flight. Returns the trimmed role
    /// to send to the backend.
    pub fn begin_start(&mut self, input: &str, sink: &mut impl TranscriptSink) -> Result<String> {
        if self.starting {
            return Err(self.reject(ValidationError::StartInProgress, sink));
        }

        let role = input.trim();
        if role.is_empty() {
            return Err(self.reject(ValidationError::RoleRequired, sink));
        }

        if !is_valid_role(role) {
            let suggestions = sample_suggestions(&mut self.rng, SUGGESTION_COUNT);
            return Err(self.reject(
                ValidationError::InvalidRole {
                    role: role.to_string(),
                    suggestions,
                },
                sink,
            ));
        }

        self.starting = true;
        sink.set_status(Status::Starting);
        info!(role, "starting interview");
        Ok(role.to_string())
    }

    pub fn finish_start(
        &mut self,
        role: &str,
        result: std::result::Result<StartReply, BackendError>,
        sink: &mut impl TranscriptSink,
        voice: &mut SpeechGate,
    ) -> Result<String> {
        self.starting = false;

        match result {
            Ok(StartReply { session_id, reply }) => {
                info!(%session_id, role, "interview started");
                self.session_id = Some(session_id.clone());
                self.role = Some(role.to_string());
                self.local.reset(role);

                sink.append_entry(TranscriptEntry::interviewer(reply.as_str()));
                speak(voice, &reply);
                sink.set_status(Status::Active);
                Ok(session_id)
            }
            Err(err) => {
                warn!(role, "could not start interview: {err}");
                sink.append_entry(TranscriptEntry::system(format!(
                    "Could not start interview. Check backend ({}).",
                    self.backend_url
                )));
                sink.set_status(Status::Error);
                Err(err.into())
            }
        }
    }

    pub async fn start_session<B: InterviewBackend + ?Sized>(
        &mut self,
        backend: &B,
        input: &str,
        sink: &mut impl TranscriptSink,
        voice: &mut SpeechGate,
    ) -> Result<String> {
        let role = self.begin_start(input, sink)?;
        let result = backend.start_session(&role).await;
        self.finish_start(&role, result, sink, voice)
    }

    /// Validate an answer, echo it into the transcript and show the typing
    /// placeholder. No request is implied when this fails.
    pub fn begin_send(&mut self, input: &str, sink: &mut impl TranscriptSink) -> Result<OutgoingAnswer> {
        let text = input.trim();
        if text.is_empty() {
            return Err(self.reject(ValidationError::MessageRequired, sink));
        }

        let Some(session_id) = self.session_id.clone() else {
            return Err(self.reject(ValidationError::NoSession, sink));
        };

        sink.append_entry(TranscriptEntry::you(text));
        sink.set_typing(true);
        sink.set_status(Status::Thinking);
        self.sending = true;

        Ok(OutgoingAnswer {
            session_id,
            text: text.to_string(),
        })
    }

    pub fn finish_send(
        &mut self,
        result: std::result::Result<MessageReply, BackendError>,
        sink: &mut impl TranscriptSink,
        voice: &mut SpeechGate,
    ) -> Result<String> {
        self.sending = false;
        sink.set_typing(false);

        match result {
            Ok(MessageReply { reply, history_count }) => {
                info!(?history_count, "interviewer replied");
                sink.append_entry(TranscriptEntry::interviewer(reply.as_str()));
                speak(voice, &reply);
                sink.set_status(Status::Active);
                Ok(reply)
            }
            Err(err) => {
                warn!("sending answer failed: {err}");
                sink.append_entry(TranscriptEntry::system(SEND_FAILED));
                sink.set_status(Status::Error);
                Err(err.into())
            }
        }
    }

    pub async fn send_answer<B: InterviewBackend + ?Sized>(
        &mut self,
        backend: &B,
        input: &str,
        sink: &mut impl TranscriptSink,
        voice: &mut SpeechGate,
    ) -> Result<String> {
        let outgoing = self.begin_send(input, sink)?;
        let result = backend.send_answer(&outgoing.session_id, &outgoing.text).await;
        self.finish_send(result, sink, voice)
    }

    /// Draw a question from the built-in table for `input` without a backend.
    /// Switching roles starts the local drill over.
    pub fn next_local_question(
        &mut self,
        input: &str,
        sink: &mut impl TranscriptSink,
        voice: &mut SpeechGate,
    ) -> Result<String> {
        if self.session_id.is_some() {
            return Err(self.reject(ValidationError::SessionActive, sink));
        }

        let role = input.trim();
        if !self.table.contains(role) {
            return Err(self.reject(ValidationError::RoleNotFound(role.to_string()), sink));
        }

        if self.local.role() != Some(role) {
            self.local.reset(role);
        }

        let question = self.local.pick_next(&self.table, &mut self.rng);
        sink.append_entry(TranscriptEntry::interviewer(question.as_str()));
        speak(voice, &question);
        Ok(question)
    }

    /// Start or stop listening. Starting always silences the interviewer first.
    pub fn toggle_microphone(
        &mut self,
        mic: &mut Microphone,
        voice: &mut SpeechGate,
        sink: &mut impl TranscriptSink,
    ) -> Result<bool> {
        match mic.toggle(voice) {
            Ok(listening) => {
                info!(listening, "microphone toggled");
                Ok(listening)
            }
            Err(SpeechError::Unavailable(reason)) => {
                warn!("microphone unavailable: {reason}");
                sink.show_notice(Notice::new("Microphone Error", "Speech recognition not available"));
                Err(SpeechError::Unavailable(reason).into())
            }
            Err(err) => {
                warn!("could not start speech recognition: {err}");
                sink.append_entry(TranscriptEntry::system(format!("Microphone error: {err}")));
                Err(err.into())
            }
        }
    }

    fn reject(&self, err: ValidationError, sink: &mut impl TranscriptSink) -> InterviewError {
        let mut message = err.to_string();
        if let ValidationError::InvalidRole { suggestions, .. } = &err {
            message.push_str("\n\nTry something like:");
            for suggestion in suggestions {
                message.push_str("\n• ");
                message.push_str(suggestion);
            }
        }
        sink.show_notice(Notice::new(err.title(), message));
        err.into()
    }
}

fn speak(voice: &mut SpeechGate, text: &str) {
    // Errors are already logged by the gate; a failed voice never blocks the transcript.
    let _ = voice.speak(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{ALL_ANSWERED, NO_QUESTIONS};
    use crate::speech::fakes::{FakeRecognizer, FakeSynth};
    use crate::speech::NullSpeech;
    use crate::transcript::{EntryKind, Transcript};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        start_calls: AtomicUsize,
        send_calls: AtomicUsize,
        fail_start: bool,
        fail_send: bool,
        last_send: Mutex<Option<(String, String)>>,
    }

    fn server_error() -> BackendError {
        BackendError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: Some("Agent error".into()),
        }
    }

    #[async_trait]
    impl InterviewBackend for FakeBackend {
        async fn start_session(&self, _role: &str) -> std::result::Result<StartReply, BackendError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(server_error());
            }
            Ok(StartReply {
                session_id: "s1".into(),
                reply: "Explain bias-variance tradeoff".into(),
            })
        }

        async fn send_answer(
            &self,
            session_id: &str,
            text: &str,
        ) -> std::result::Result<MessageReply, BackendError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_send.lock().unwrap() = Some((session_id.into(), text.into()));
            if self.fail_send {
                return Err(server_error());
            }
            Ok(MessageReply {
                reply: "How would you regularize that model?".into(),
                history_count: Some(4),
            })
        }
    }

    fn fixture() -> (InterviewController, Transcript, SpeechGate, FakeSynth) {
        let synth = FakeSynth::default();
        let voice = SpeechGate::new(Box::new(synth.clone()));
        (
            InterviewController::new("http://127.0.0.1:8000").with_seed(11),
            Transcript::new(),
            voice,
            synth,
        )
    }

    #[tokio::test]
    async fn test_start_session_appends_and_speaks_first_question() {
        let (mut ctl, mut transcript, mut voice, synth) = fixture();
        let backend = FakeBackend::default();

        let id = ctl
            .start_session(&backend, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap();

        assert_eq!(id, "s1");
        assert_eq!(ctl.session_id(), Some("s1"));
        assert_eq!(ctl.role(), Some("Data Scientist"));
        let agent: Vec<_> = transcript
            .entries()
            .iter()
            .filter(|e| e.kind == EntryKind::Agent)
            .collect();
        assert_eq!(agent.len(), 1);
        assert_eq!(agent[0].sender, "Interviewer");
        assert_eq!(agent[0].text, "Explain bias-variance tradeoff");
        assert_eq!(transcript.status(), Status::Active);
        assert_eq!(
            synth.log.lock().unwrap().active.as_deref(),
            Some("Explain bias-variance tradeoff")
        );
        assert!(!ctl.is_starting());
    }

    #[tokio::test]
    async fn test_invalid_role_never_reaches_backend() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let backend = FakeBackend::default();

        let err = ctl
            .start_session(&backend, "John", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InterviewError::Validation(ValidationError::InvalidRole { ref suggestions, .. })
                if suggestions.len() == 5
        ));
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 0);
        let notice = transcript.notice().unwrap();
        assert_eq!(notice.title, "Invalid Role");
        assert!(notice.message.starts_with("\"John\" doesn't look like a job role."));
        assert!(notice.message.contains("Try something like:"));
        assert_eq!(transcript.status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_empty_role_requires_input() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let backend = FakeBackend::default();

        let err = ctl
            .start_session(&backend, "   ", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(err, InterviewError::Validation(ValidationError::RoleRequired)));
        assert_eq!(transcript.notice().unwrap().title, "Role Required");
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_no_session() {
        let (mut ctl, mut transcript, mut voice, synth) = fixture();
        let backend = FakeBackend {
            fail_start: true,
            ..Default::default()
        };

        let err = ctl
            .start_session(&backend, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(err, InterviewError::Backend(_)));
        assert_eq!(ctl.session_id(), None);
        assert!(!ctl.is_starting());
        assert_eq!(transcript.status(), Status::Error);
        let system = transcript.last_of(EntryKind::System).unwrap();
        assert_eq!(
            system.text,
            "Could not start interview. Check backend (http://127.0.0.1:8000)."
        );
        assert!(synth.log.lock().unwrap().spoken.is_empty());
    }

    #[test]
    fn test_start_is_not_reentrant() {
        let (mut ctl, mut transcript, _, _) = fixture();

        ctl.begin_start("Data Scientist", &mut transcript).unwrap();
        let err = ctl.begin_start("Data Scientist", &mut transcript).unwrap_err();

        assert!(matches!(err, InterviewError::Validation(ValidationError::StartInProgress)));
        assert_eq!(transcript.status(), Status::Starting);
    }

    #[tokio::test]
    async fn test_send_without_session_issues_no_request() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let backend = FakeBackend::default();

        let err = ctl
            .send_answer(&backend, "I would use cross validation", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(err, InterviewError::Validation(ValidationError::NoSession)));
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 0);
        assert!(transcript.entries().is_empty());
        assert_eq!(transcript.notice().unwrap().title, "No Interview");
    }

    #[tokio::test]
    async fn test_empty_answer_requires_message() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let backend = FakeBackend::default();
        ctl.start_session(&backend, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap();

        let err = ctl
            .send_answer(&backend, "  ", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(err, InterviewError::Validation(ValidationError::MessageRequired)));
        assert_eq!(
            transcript.notice().unwrap().message,
            "Please enter a message or use the mic to speak"
        );
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_answer_round_trip() {
        let (mut ctl, mut transcript, mut voice, synth) = fixture();
        let backend = FakeBackend::default();
        ctl.start_session(&backend, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap();

        let outgoing = ctl.begin_send("  More data helps variance  ", &mut transcript).unwrap();
        assert_eq!(outgoing.text, "More data helps variance");
        assert!(transcript.is_typing());
        assert_eq!(transcript.status(), Status::Thinking);
        assert!(ctl.is_sending());

        let result = backend.send_answer(&outgoing.session_id, &outgoing.text).await;
        let reply = ctl.finish_send(result, &mut transcript, &mut voice).unwrap();

        assert_eq!(reply, "How would you regularize that model?");
        assert!(!transcript.is_typing());
        assert_eq!(transcript.status(), Status::Active);
        assert_eq!(
            backend.last_send.lock().unwrap().clone(),
            Some(("s1".to_string(), "More data helps variance".to_string()))
        );
        let kinds: Vec<_> = transcript.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Agent, EntryKind::You, EntryKind::Agent]);
        assert_eq!(synth.log.lock().unwrap().active.as_deref(), Some(reply.as_str()));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_session_for_retry() {
        let (mut ctl, mut transcript, mut voice, synth) = fixture();
        let ok = FakeBackend::default();
        ctl.start_session(&ok, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap();
        let spoken_before = synth.log.lock().unwrap().spoken.len();

        let failing = FakeBackend {
            fail_send: true,
            ..Default::default()
        };
        let err = ctl
            .send_answer(&failing, "my answer", &mut transcript, &mut voice)
            .await
            .unwrap_err();

        assert!(matches!(err, InterviewError::Backend(ref e) if e.status() == Some(StatusCode::INTERNAL_SERVER_ERROR)));
        assert_eq!(ctl.session_id(), Some("s1"));
        assert_eq!(transcript.status(), Status::Error);
        assert!(!transcript.is_typing());
        assert!(!ctl.is_sending());
        assert_eq!(transcript.last_of(EntryKind::System).unwrap().text, SEND_FAILED);
        assert_eq!(synth.log.lock().unwrap().spoken.len(), spoken_before);

        // Retry against a healthy backend reuses the same session.
        ctl.send_answer(&ok, "my answer", &mut transcript, &mut voice)
            .await
            .unwrap();
        assert_eq!(transcript.status(), Status::Active);
    }

    #[test]
    fn test_local_drill_exhausts_table() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();

        for _ in 0..4 {
            let q = ctl
                .next_local_question("Software Engineer", &mut transcript, &mut voice)
                .unwrap();
            assert_ne!(q, ALL_ANSWERED);
            assert_ne!(q, NO_QUESTIONS);
        }
        let last = ctl
            .next_local_question("Software Engineer", &mut transcript, &mut voice)
            .unwrap();
        assert_eq!(last, ALL_ANSWERED);
        assert_eq!(ctl.local_session().asked().len(), 4);
    }

    #[test]
    fn test_local_drill_rejects_unknown_role() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();

        let err = ctl
            .next_local_question("Chief Pastry Officer", &mut transcript, &mut voice)
            .unwrap_err();

        assert!(matches!(err, InterviewError::Validation(ValidationError::RoleNotFound(_))));
        assert_eq!(transcript.notice().unwrap().message, "Role not found!");
    }

    #[test]
    fn test_switching_local_role_resets_drill() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();

        ctl.next_local_question("Software Engineer", &mut transcript, &mut voice)
            .unwrap();
        ctl.next_local_question("Data Scientist", &mut transcript, &mut voice)
            .unwrap();

        assert_eq!(ctl.local_session().role(), Some("Data Scientist"));
        assert_eq!(ctl.local_session().asked().len(), 1);
    }

    #[tokio::test]
    async fn test_local_drill_disabled_once_session_exists() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let backend = FakeBackend::default();
        ctl.start_session(&backend, "Data Scientist", &mut transcript, &mut voice)
            .await
            .unwrap();

        let err = ctl
            .next_local_question("Data Scientist", &mut transcript, &mut voice)
            .unwrap_err();
        assert!(matches!(err, InterviewError::Validation(ValidationError::SessionActive)));
    }

    #[test]
    fn test_microphone_unavailable_shows_notice() {
        let (mut ctl, mut transcript, mut voice, _) = fixture();
        let mut mic = Microphone::new(Box::new(NullSpeech::new("no recognizer configured")));

        assert!(ctl.toggle_microphone(&mut mic, &mut voice, &mut transcript).is_err());
        let notice = transcript.notice().unwrap();
        assert_eq!(notice.title, "Microphone Error");
        assert_eq!(notice.message, "Speech recognition not available");
    }

    #[test]
    fn test_microphone_start_silences_interviewer() {
        let (mut ctl, mut transcript, mut voice, synth) = fixture();
        let mut mic = Microphone::new(Box::new(FakeRecognizer::default()));

        voice.speak("Describe a hard bug you fixed").unwrap();
        assert!(ctl.toggle_microphone(&mut mic, &mut voice, &mut transcript).unwrap());
        assert!(synth.log.lock().unwrap().active.is_none());
    }
}
