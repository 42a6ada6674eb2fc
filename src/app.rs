use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use interview_core::{
    BackendClient, BackendError, CommandRecognizer, CommandSpec, CommandSynthesizer, Config,
    InterviewBackend, InterviewController, MessageReply, Microphone, NullSpeech, RecognitionEvent,
    SpeechConfig, SpeechGate, StartReply, Transcript,
};

type StartTask = JoinHandle<Result<StartReply, BackendError>>;
type SendTask = JoinHandle<Result<MessageReply, BackendError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Role,
    Answer,
}

/// Single-line text field with a cursor counted in characters.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| !c.is_control()) {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn set(&mut self, value: &str) {
        *self = Self::with_value(value);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct App {
    pub should_quit: bool,
    pub focus: Field,
    pub role_input: TextInput,
    pub answer_input: TextInput,

    // Interview state
    pub controller: InterviewController,
    pub transcript: Transcript,
    pub voice: SpeechGate,
    pub mic: Microphone,
    pub backend: BackendClient,

    // In-flight requests, polled on every tick
    pub start_task: Option<(String, StartTask)>,
    pub send_task: Option<SendTask>,

    // Transcript viewport
    pub scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16,
    pub chat_width: u16,
    pub transcript_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config, backend: BackendClient) -> Self {
        let controller = InterviewController::new(backend.base_url());
        let mut transcript = Transcript::new();
        controller.welcome(&mut transcript);

        let role_input = config
            .last_role
            .as_deref()
            .map(TextInput::with_value)
            .unwrap_or_default();

        Self {
            should_quit: false,
            focus: Field::Role,
            role_input,
            answer_input: TextInput::default(),

            controller,
            transcript,
            voice: build_voice(&config.speech),
            mic: build_microphone(&config.speech),
            backend,

            start_task: None,
            send_task: None,

            scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            transcript_area: None,

            animation_frame: 0,
        }
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            Field::Role => &mut self.role_input,
            Field::Answer => &mut self.answer_input,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Role => Field::Answer,
            Field::Answer => Field::Role,
        };
    }

    /// The start control is disabled while a start is in flight.
    pub fn start_interview(&mut self) {
        if self.start_task.is_some() {
            return;
        }

        let Ok(role) = self.controller.begin_start(self.role_input.value(), &mut self.transcript) else {
            return;
        };

        let backend = self.backend.clone();
        let requested = role.clone();
        let task = tokio::spawn(async move { backend.start_session(&requested).await });
        self.start_task = Some((role, task));
        self.follow_tail = true;
    }

    pub fn send_answer(&mut self) {
        if self.send_task.is_some() {
            return;
        }

        let Ok(outgoing) = self.controller.begin_send(self.answer_input.value(), &mut self.transcript) else {
            return;
        };

        self.answer_input.clear();
        let backend = self.backend.clone();
        self.send_task = Some(tokio::spawn(async move {
            backend.send_answer(&outgoing.session_id, &outgoing.text).await
        }));
        self.follow_tail = true;
    }

    pub fn next_local_question(&mut self) {
        let role = self.role_input.value().to_string();
        if self
            .controller
            .next_local_question(&role, &mut self.transcript, &mut self.voice)
            .is_ok()
        {
            self.focus = Field::Answer;
            self.follow_tail = true;
        }
    }

    pub fn toggle_microphone(&mut self) {
        let _ = self
            .controller
            .toggle_microphone(&mut self.mic, &mut self.voice, &mut self.transcript);
    }

    pub fn stop_speaking(&mut self) {
        self.voice.cancel();
    }

    pub fn dismiss_notice(&mut self) -> bool {
        self.transcript.dismiss_notice().is_some()
    }

    /// Apply finished background requests to the interview state.
    pub async fn poll_tasks(&mut self) {
        if self.start_task.as_ref().is_some_and(|(_, task)| task.is_finished()) {
            if let Some((role, task)) = self.start_task.take() {
                let result = task.await.unwrap_or_else(|err| Err(BackendError::Aborted(err.to_string())));
                let started = self
                    .controller
                    .finish_start(&role, result, &mut self.transcript, &mut self.voice)
                    .is_ok();
                if started {
                    self.focus = Field::Answer;
                    if let Err(err) = Config::save_last_role(&role) {
                        warn!("could not save last role: {err}");
                    }
                }
            }
        }

        if self.send_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.send_task.take() {
                let result = task.await.unwrap_or_else(|err| Err(BackendError::Aborted(err.to_string())));
                let _ = self
                    .controller
                    .finish_send(result, &mut self.transcript, &mut self.voice);
            }
        }
    }

    /// Recognized speech lands in the answer field; it is never sent on its own.
    pub fn poll_microphone(&mut self) {
        while let Some(event) = self.mic.poll() {
            match event {
                RecognitionEvent::Transcript(text) => {
                    self.answer_input.set(text.trim());
                    self.focus = Field::Answer;
                }
                RecognitionEvent::Failed(reason) => warn!("speech recognition failed: {reason}"),
                RecognitionEvent::Ended => info!("speech recognition ended"),
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.transcript.is_typing() || self.mic.is_listening() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        // The renderer clamps and re-enables tailing once the bottom is reached.
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Stop speech and capture, and let the backend drop the session.
    pub async fn shutdown(&mut self) {
        self.voice.cancel();
        if self.mic.is_listening() {
            let _ = self.mic.toggle(&mut self.voice);
        }
        if let Some(session_id) = self.controller.session_id() {
            if let Err(err) = self.backend.end_session(session_id).await {
                warn!(session_id, "could not end backend session: {err}");
            }
        }
    }
}

pub fn build_voice(config: &SpeechConfig) -> SpeechGate {
    if !config.enabled {
        return SpeechGate::new(Box::new(NullSpeech::new("speech disabled")));
    }

    let spec = config
        .synthesizer
        .clone()
        .unwrap_or_else(CommandSpec::default_synthesizer);
    SpeechGate::new(Box::new(CommandSynthesizer::new(spec))).with_rate(config.rate)
}

pub fn build_microphone(config: &SpeechConfig) -> Microphone {
    match (&config.recognizer, config.enabled) {
        (_, false) => Microphone::new(Box::new(NullSpeech::new("speech disabled"))),
        (None, true) => Microphone::new(Box::new(NullSpeech::new("no speech recognizer configured"))),
        (Some(spec), true) => Microphone::new(Box::new(CommandRecognizer::new(spec.clone()))),
    }
}
