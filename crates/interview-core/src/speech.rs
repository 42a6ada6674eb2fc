//! Speech synthesis and recognition capabilities.
//!
//! Both are external programs as far as this crate is concerned. The command
//! adapters shell out to whatever the user configured (`say`, `espeak`, a
//! whisper wrapper script, ...); the null adapters stand in when nothing is
//! available so the rest of the app keeps working without speech.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::SpeechError;

pub const DEFAULT_LANG: &str = "en-US";
pub const DEFAULT_RATE: f32 = 0.95;

/// Words per minute at rate 1.0, which is what `say` and `espeak` default to.
const BASE_WPM: f32 = 175.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Availability::Available => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
}

pub trait Synthesizer: Send {
    fn availability(&self) -> Availability;

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError>;

    /// Stop the current utterance, if any.
    fn cancel(&mut self);

    fn is_speaking(&mut self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Transcript(String),
    Ended,
    Failed(String),
}

pub trait Recognizer: Send {
    fn availability(&self) -> Availability;

    fn start(&mut self) -> Result<(), SpeechError>;

    fn stop(&mut self);

    /// Next pending event without blocking.
    fn try_next(&mut self) -> Option<RecognitionEvent>;
}

/// Program plus arguments. `{rate}` and `{lang}` in arguments are substituted
/// before launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `say` on macOS, `espeak` elsewhere.
    pub fn default_synthesizer() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("say", &["-r", "{rate}"])
        } else {
            Self::new("espeak", &["-v", "{lang}", "-s", "{rate}"])
        }
    }

    fn expand_args(&self, utterance: &Utterance) -> Vec<String> {
        let wpm = (BASE_WPM * utterance.rate).round() as u32;
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{rate}", &wpm.to_string())
                    .replace("{lang}", &utterance.lang.to_lowercase())
            })
            .collect()
    }

    fn availability(&self) -> Availability {
        if find_program(&self.program).is_some() {
            Availability::Available
        } else {
            Availability::Unavailable(format!("`{}` not found on PATH", self.program))
        }
    }
}

fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    })
}

/// Speaks by launching one child process per utterance.
pub struct CommandSynthesizer {
    spec: CommandSpec,
    child: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, child: None }
    }
}

impl Synthesizer for CommandSynthesizer {
    fn availability(&self) -> Availability {
        self.spec.availability()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        self.cancel();

        let child = Command::new(&self.spec.program)
            .args(self.spec.expand_args(utterance))
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.spec.program.clone(),
                source,
            })?;

        self.child = Some(child);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
                debug!("speech cancelled");
            }
            let _ = child.wait();
        }
    }

    fn is_speaking(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            _ => false,
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs a recognizer program that records from the microphone and prints
/// what it heard on stdout before exiting.
///
/// Every capture gets a generation number and its events carry it, so a
/// capture that was stopped cannot end or fill in the one that replaced it.
pub struct CommandRecognizer {
    spec: CommandSpec,
    generation: u64,
    stop_tx: Option<oneshot::Sender<()>>,
    events_tx: mpsc::UnboundedSender<(u64, RecognitionEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, RecognitionEvent)>,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            spec,
            generation: 0,
            stop_tx: None,
            events_tx,
            events_rx,
        }
    }
}

impl Recognizer for CommandRecognizer {
    fn availability(&self) -> Availability {
        self.spec.availability()
    }

    fn start(&mut self) -> Result<(), SpeechError> {
        if self.stop_tx.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SpeechError::Unavailable("speech recognition needs a running event loop".into()))?;

        let mut child = tokio::process::Command::new(&self.spec.program)
            .args(&self.spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.spec.program.clone(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpeechError::Unavailable("recognizer has no stdout".into()))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let events = self.events_tx.clone();
        self.generation += 1;
        let generation = self.generation;
        self.stop_tx = Some(stop_tx);

        runtime.spawn(async move {
            let mut output = String::new();
            let mut failure = None;

            let stopped = tokio::select! {
                read = stdout.read_to_string(&mut output) => {
                    if let Err(err) = read {
                        failure = Some(err.to_string());
                    }
                    false
                }
                signal = stop_rx => {
                    // Err means the recognizer itself was dropped.
                    let _ = child.start_kill();
                    matches!(signal, Ok(()))
                }
            };

            // A kill we asked for is not a failure.
            match child.wait().await {
                Ok(status)
                    if !stopped && !status.success() && output.trim().is_empty() && failure.is_none() =>
                {
                    failure = Some(format!("recognizer exited with {status}"));
                }
                Err(err) if !stopped => failure = Some(err.to_string()),
                _ => {}
            }

            let text = output.trim();
            if !text.is_empty() {
                let _ = events.send((generation, RecognitionEvent::Transcript(text.to_string())));
            }
            if let Some(reason) = failure {
                let _ = events.send((generation, RecognitionEvent::Failed(reason)));
            }
            let _ = events.send((generation, RecognitionEvent::Ended));
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }

    fn try_next(&mut self) -> Option<RecognitionEvent> {
        loop {
            let (generation, event) = self.events_rx.try_recv().ok()?;
            if generation != self.generation {
                debug!(generation, "dropping event from a replaced capture");
                continue;
            }
            if event == RecognitionEvent::Ended {
                self.stop_tx = None;
            }
            return Some(event);
        }
    }
}

/// Placeholder used when a capability is missing or switched off.
pub struct NullSpeech {
    reason: String,
}

impl NullSpeech {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Synthesizer for NullSpeech {
    fn availability(&self) -> Availability {
        Availability::Unavailable(self.reason.clone())
    }

    fn speak(&mut self, _utterance: &Utterance) -> Result<(), SpeechError> {
        Ok(())
    }

    fn cancel(&mut self) {}

    fn is_speaking(&mut self) -> bool {
        false
    }
}

impl Recognizer for NullSpeech {
    fn availability(&self) -> Availability {
        Availability::Unavailable(self.reason.clone())
    }

    fn start(&mut self) -> Result<(), SpeechError> {
        Err(SpeechError::Unavailable(self.reason.clone()))
    }

    fn stop(&mut self) {}

    fn try_next(&mut self) -> Option<RecognitionEvent> {
        None
    }
}

/// Newest-wins wrapper around a [`Synthesizer`]: at most one utterance plays.
pub struct SpeechGate {
    synth: Box<dyn Synthesizer>,
    lang: String,
    rate: f32,
}

impl SpeechGate {
    pub fn new(synth: Box<dyn Synthesizer>) -> Self {
        Self {
            synth,
            lang: DEFAULT_LANG.to_string(),
            rate: DEFAULT_RATE,
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn availability(&self) -> Availability {
        self.synth.availability()
    }

    /// Cancel whatever is playing and start `text`. A missing synthesizer is a
    /// silent no-op; the reason is surfaced through [`Self::availability`].
    pub fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        self.synth.cancel();
        if !self.synth.availability().is_available() {
            return Ok(());
        }

        let utterance = Utterance {
            text: text.to_string(),
            lang: self.lang.clone(),
            rate: self.rate,
        };
        self.synth.speak(&utterance).inspect_err(|err| warn!("speech failed: {err}"))
    }

    pub fn cancel(&mut self) {
        self.synth.cancel();
    }

    pub fn is_speaking(&mut self) -> bool {
        self.synth.is_speaking()
    }
}

/// Microphone toggle. Capture and playback are exclusive; capture wins.
pub struct Microphone {
    recognizer: Box<dyn Recognizer>,
    listening: bool,
}

impl Microphone {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            listening: false,
        }
    }

    pub fn availability(&self) -> Availability {
        self.recognizer.availability()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Start listening, or stop if already listening. Returns the new state.
    pub fn toggle(&mut self, voice: &mut SpeechGate) -> Result<bool, SpeechError> {
        if let Availability::Unavailable(reason) = self.recognizer.availability() {
            return Err(SpeechError::Unavailable(reason));
        }

        voice.cancel();

        if self.listening {
            self.recognizer.stop();
            self.listening = false;
        } else {
            self.recognizer.start()?;
            self.listening = true;
        }
        Ok(self.listening)
    }

    pub fn poll(&mut self) -> Option<RecognitionEvent> {
        let event = self.recognizer.try_next()?;
        if matches!(event, RecognitionEvent::Ended | RecognitionEvent::Failed(_)) {
            self.listening = false;
        }
        Some(event)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct SynthLog {
        pub spoken: Vec<String>,
        pub active: Option<String>,
        pub cancels: usize,
    }

    /// Records utterances instead of playing them.
    #[derive(Clone, Default)]
    pub struct FakeSynth {
        pub log: Arc<Mutex<SynthLog>>,
    }

    impl Synthesizer for FakeSynth {
        fn availability(&self) -> Availability {
            Availability::Available
        }

        fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
            let mut log = self.log.lock().unwrap();
            assert!(log.active.is_none(), "previous utterance still playing");
            log.spoken.push(utterance.text.clone());
            log.active = Some(utterance.text.clone());
            Ok(())
        }

        fn cancel(&mut self) {
            let mut log = self.log.lock().unwrap();
            if log.active.take().is_some() {
                log.cancels += 1;
            }
        }

        fn is_speaking(&mut self) -> bool {
            self.log.lock().unwrap().active.is_some()
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeRecognizer {
        pub events: Arc<Mutex<VecDeque<RecognitionEvent>>>,
        pub starts: Arc<Mutex<usize>>,
    }

    impl Recognizer for FakeRecognizer {
        fn availability(&self) -> Availability {
            Availability::Available
        }

        fn start(&mut self) -> Result<(), SpeechError> {
            *self.starts.lock().unwrap() += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.events.lock().unwrap().push_back(RecognitionEvent::Ended);
        }

        fn try_next(&mut self) -> Option<RecognitionEvent> {
            self.events.lock().unwrap().pop_front()
        }
    }
}
