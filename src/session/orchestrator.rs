use crate::answer::{AnswerClient, ChatContext, SYSTEM_PROMPT};
#[cfg(feature = "audio-io")]
use crate::audio::AudioOutput;
use crate::audio::wav::{encode_wav, read_wav_file};
use crate::audio::{resample_audio, RecordingBuffer};
use crate::messages::{ChatTurn, TurnLog, TurnMeta};
use crate::session::config::{SessionConfig, TranscribeMode};
use crate::speech::{SpeechClient, SynthesizedAudio};
use crate::staging::MediaStore;
use crate::transcribe::{
    poll_until_terminal, JobStatus, PollOutcome, StreamEvent, StreamingTranscriber,
    TranscribeClient,
};
use crate::utils::Stopwatch;
use crate::{NatterError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Commands accepted by the session worker
#[derive(Debug, Clone)]
pub enum SessionCommand {
    StartRecording,
    StopRecording,
    CancelRecording,
    /// Run an exchange from typed text instead of speech
    SendText(String),
    /// Run an exchange from a WAV file instead of the microphone
    TranscribeFile(PathBuf),
    ClearConversation,
    Shutdown,
}

/// Events emitted by the session worker
#[derive(Debug, Clone)]
pub enum SessionEvent {
    RecordingStarted,
    RecordingStopped,
    RecordingCancelled,
    /// A batch job changed (or reported) its status
    JobUpdate { job_name: String, status: JobStatus },
    /// Interim text from a streaming transcription
    PartialTranscript(String),
    /// The finished transcript for the current utterance
    TranscriptReady(String),
    /// A turn was appended to the conversation log
    TurnAdded(ChatTurn),
    AnswerReady(String),
    SpeechReady { duration_secs: f32 },
    PlaybackStarted,
    PlaybackComplete,
    Error(String),
    Shutdown,
}

/// Cloneable handle for driving a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
    audio_tx: Sender<Vec<f32>>,
    is_recording: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    turns: TurnLog,
}

impl SessionHandle {
    pub fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| NatterError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Sender for captured audio chunks (mono f32 at the configured rate)
    pub fn audio_sender(&self) -> Sender<Vec<f32>> {
        self.audio_tx.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Abandon the in-flight poll or playback
    pub fn interrupt(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the conversation so far
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.turns.snapshot()
    }
}

/// A voice session: recording, transcription, answer, synthesis, playback.
///
/// All service calls run on one worker thread that owns its own tokio
/// runtime; the rest of the program talks to it through [`SessionHandle`].
pub struct Session {
    config: SessionConfig,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    audio_rx: Receiver<Vec<f32>>,
    is_recording: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    turns: TurnLog,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<(Session, SessionHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = bounded(100);
        let (event_tx, event_rx) = bounded(100);
        let (audio_tx, audio_rx) = bounded(1000);

        let is_recording = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let turns = TurnLog::new();

        let handle = SessionHandle {
            command_tx,
            event_rx,
            audio_tx,
            is_recording: Arc::clone(&is_recording),
            cancel: Arc::clone(&cancel),
            turns: turns.clone(),
        };

        let session = Session {
            config,
            command_rx,
            event_tx,
            audio_rx,
            is_recording,
            cancel,
            turns,
        };

        Ok((session, handle))
    }

    /// Spawn the worker thread
    pub fn start(self) -> Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("natter-session".to_string())
            .spawn(move || self.run())
            .map_err(|e| NatterError::SessionError(format!("Failed to spawn session worker: {}", e)))
    }

    fn run(self) {
        let event_tx = self.event_tx.clone();

        let runtime = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to create async runtime: {}", e);
                let _ = event_tx.send(SessionEvent::Error(NatterError::from(e).user_message()));
                let _ = event_tx.send(SessionEvent::Shutdown);
                return;
            }
        };

        match SessionWorker::new(self, runtime) {
            Ok(worker) => worker.run(),
            Err(e) => {
                error!("Failed to initialize session: {}", e);
                let _ = event_tx.send(SessionEvent::Error(e.user_message()));
                let _ = event_tx.send(SessionEvent::Shutdown);
            }
        }
    }
}

/// How one batch transcription attempt ended, transport errors aside
enum BatchOutcome {
    Transcript { text: String, transcribe_ms: u64 },
    /// Failed job, empty transcript, or exhausted wait budget
    Failed,
    Cancelled,
}

struct SessionWorker {
    config: SessionConfig,
    runtime: Runtime,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    audio_rx: Receiver<Vec<f32>>,
    is_recording: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    turns: TurnLog,

    media: MediaStore,
    transcribe: TranscribeClient,
    answer: AnswerClient,
    speech: SpeechClient,

    context: ChatContext,
    utterance: RecordingBuffer,
    stream: Option<StreamingTranscriber>,
    #[cfg(feature = "audio-io")]
    output: Option<AudioOutput>,
}

impl SessionWorker {
    fn new(session: Session, runtime: Runtime) -> Result<Self> {
        let Session {
            config,
            command_rx,
            event_tx,
            audio_rx,
            is_recording,
            cancel,
            turns,
        } = session;

        let media = MediaStore::new(config.staging.clone())?;
        let transcribe = TranscribeClient::new(config.transcribe.clone())?;
        let answer = AnswerClient::new(config.answer.clone())?;
        let speech = SpeechClient::new(config.speech.clone())?;

        let context = ChatContext::new(SYSTEM_PROMPT);
        let utterance = RecordingBuffer::for_duration(config.max_utterance_secs, config.input_sample_rate);

        // The playback stream must live on this thread; cpal streams do not
        // move across threads.
        #[cfg(feature = "audio-io")]
        let output = if config.enable_audio_output {
            match AudioOutput::new().and_then(|mut output| {
                output.start()?;
                Ok(output)
            }) {
                Ok(output) => Some(output),
                Err(e) => {
                    warn!("Audio output unavailable, answers will be text only: {}", e);
                    let _ = event_tx.send(SessionEvent::Error(e.user_message()));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            runtime,
            command_rx,
            event_tx,
            audio_rx,
            is_recording,
            cancel,
            turns,
            media,
            transcribe,
            answer,
            speech,
            context,
            utterance,
            stream: None,
            #[cfg(feature = "audio-io")]
            output,
        })
    }

    fn run(mut self) {
        info!("Session worker started");

        loop {
            match self.command_rx.try_recv() {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    warn!("Command channel disconnected, shutting down");
                    break;
                }
            }

            self.pump_audio();

            thread::sleep(Duration::from_millis(10));
        }

        self.emit(SessionEvent::Shutdown);
        info!("Session worker stopped");
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.send(event) {
            warn!("Failed to emit session event: {}", e);
        }
    }

    /// Returns false when the worker should shut down
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::StartRecording => {
                self.start_recording();
                true
            }
            SessionCommand::StopRecording => {
                self.stop_recording();
                true
            }
            SessionCommand::CancelRecording => {
                self.cancel_recording();
                true
            }
            SessionCommand::SendText(text) => {
                self.handle_text(&text);
                true
            }
            SessionCommand::TranscribeFile(path) => {
                self.handle_file(&path);
                true
            }
            SessionCommand::ClearConversation => {
                self.clear_conversation();
                true
            }
            SessionCommand::Shutdown => {
                info!("Session shutdown requested");
                false
            }
        }
    }

    fn start_recording(&mut self) {
        if self.is_recording.load(Ordering::SeqCst) {
            warn!("Already recording");
            return;
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.utterance.clear();

        if self.config.transcribe_mode == TranscribeMode::Streaming {
            match self.runtime.block_on(StreamingTranscriber::connect(self.transcribe.config())) {
                Ok(stream) => self.stream = Some(stream),
                Err(e) => {
                    error!("Failed to open transcription stream: {}", e);
                    self.emit(SessionEvent::Error(e.user_message()));
                    return;
                }
            }
        }

        self.is_recording.store(true, Ordering::SeqCst);
        self.emit(SessionEvent::RecordingStarted);
        info!("Recording started");
    }

    fn stop_recording(&mut self) {
        if !self.is_recording.load(Ordering::SeqCst) {
            warn!("Not recording");
            return;
        }

        // Pick up anything still queued before the flag flips
        self.pump_audio();
        if !self.is_recording.load(Ordering::SeqCst) {
            // The stream died during the final drain
            return;
        }

        self.is_recording.store(false, Ordering::SeqCst);
        self.emit(SessionEvent::RecordingStopped);
        info!("Recording stopped");

        match self.stream.take() {
            Some(stream) => self.finish_stream(stream),
            None => self.run_batch_exchange(),
        }
    }

    fn cancel_recording(&mut self) {
        if !self.is_recording.load(Ordering::SeqCst) {
            debug!("Cancel with no active recording");
            return;
        }

        self.is_recording.store(false, Ordering::SeqCst);
        self.utterance.clear();
        // Dropping the socket abandons any in-flight stream
        self.stream = None;

        self.emit(SessionEvent::RecordingCancelled);
        info!("Recording cancelled");
    }

    fn handle_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty text input");
            return;
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.run_answer_exchange(text, TurnMeta::default());
    }

    fn handle_file(&mut self, path: &Path) {
        self.cancel.store(false, Ordering::SeqCst);
        info!("Transcribing file {}", path.display());

        match read_wav_file(path) {
            Ok((samples, sample_rate)) => {
                if samples.is_empty() {
                    self.emit(SessionEvent::Error("Audio file contains no samples".into()));
                    return;
                }
                self.transcribe_and_answer(samples, sample_rate);
            }
            Err(e) => {
                error!("Failed to read audio file: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
            }
        }
    }

    fn clear_conversation(&mut self) {
        self.turns.clear();
        self.context.clear();
        info!("Conversation cleared");
    }

    /// Drain the audio channel into the current utterance or stream
    fn pump_audio(&mut self) {
        if !self.is_recording.load(Ordering::SeqCst) {
            // Drop stale chunks so the next utterance starts clean
            while self.audio_rx.try_recv().is_ok() {}
            return;
        }

        match self.stream.take() {
            Some(mut stream) => {
                if self.pump_stream(&mut stream) {
                    self.stream = Some(stream);
                }
            }
            None => {
                while let Ok(chunk) = self.audio_rx.try_recv() {
                    self.utterance.write(&chunk);
                }
            }
        }
    }

    /// Forward queued audio and surface partial transcripts.
    ///
    /// Returns false when the stream died and the recording was abandoned.
    fn pump_stream(&mut self, stream: &mut StreamingTranscriber) -> bool {
        while let Ok(chunk) = self.audio_rx.try_recv() {
            if let Err(e) = self.runtime.block_on(stream.send_audio(&chunk)) {
                error!("Streaming send failed: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
                self.is_recording.store(false, Ordering::SeqCst);
                self.emit(SessionEvent::RecordingCancelled);
                return false;
            }
        }

        loop {
            match self.runtime.block_on(stream.try_next_event(Duration::from_millis(1))) {
                Ok(Some(StreamEvent::Partial(text))) => {
                    self.emit(SessionEvent::PartialTranscript(text));
                }
                Ok(Some(StreamEvent::Final(_))) => {
                    // Held by the transcriber until finish
                }
                Ok(Some(StreamEvent::Error(message))) => {
                    warn!("Streaming service reported: {}", message);
                }
                Ok(Some(StreamEvent::Closed)) => {
                    warn!("Transcription stream closed while recording");
                    self.emit(SessionEvent::Error("Transcription stream closed unexpectedly".into()));
                    self.is_recording.store(false, Ordering::SeqCst);
                    self.emit(SessionEvent::RecordingCancelled);
                    return false;
                }
                Ok(None) => return true,
                Err(e) => {
                    warn!("Streaming receive failed: {}", e);
                    return true;
                }
            }
        }
    }

    fn finish_stream(&mut self, stream: StreamingTranscriber) {
        let sw = Stopwatch::start();

        match self.runtime.block_on(stream.finish()) {
            Ok(text) => {
                let transcript = text.trim().to_string();
                if transcript.is_empty() {
                    info!("Stream produced an empty transcript");
                    self.apologize();
                    return;
                }

                self.emit(SessionEvent::TranscriptReady(transcript.clone()));
                let meta = TurnMeta {
                    from_speech: true,
                    transcribe_ms: Some(sw.elapsed_ms()),
                    ..TurnMeta::default()
                };
                self.run_answer_exchange(&transcript, meta);
            }
            Err(e) => {
                error!("Streaming transcription failed: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
                self.apologize();
            }
        }
    }

    fn run_batch_exchange(&mut self) {
        let samples = self.utterance.take_all();
        if samples.is_empty() {
            info!("No audio captured");
            self.apologize();
            return;
        }

        self.transcribe_and_answer(samples, self.config.input_sample_rate);
    }

    fn transcribe_and_answer(&mut self, samples: Vec<f32>, sample_rate: u32) {
        match self.transcribe_batch(samples, sample_rate) {
            Ok(BatchOutcome::Transcript { text, transcribe_ms }) => {
                self.emit(SessionEvent::TranscriptReady(text.clone()));
                let meta = TurnMeta {
                    from_speech: true,
                    transcribe_ms: Some(transcribe_ms),
                    ..TurnMeta::default()
                };
                self.run_answer_exchange(&text, meta);
            }
            Ok(BatchOutcome::Failed) => {
                self.apologize();
            }
            Ok(BatchOutcome::Cancelled) => {
                info!("Transcription cancelled");
                self.cancel.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                error!("Transcription failed: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
                self.apologize();
            }
        }
    }

    /// Stage the utterance, run a batch job, and collect the transcript
    fn transcribe_batch(&self, samples: Vec<f32>, sample_rate: u32) -> Result<BatchOutcome> {
        let sw = Stopwatch::start();

        let target_rate = self.transcribe.config().sample_rate_hz;
        let samples = if sample_rate != target_rate {
            resample_audio(&samples, sample_rate, target_rate)?
        } else {
            samples
        };

        let wav = encode_wav(&samples, target_rate)?;
        let job_name = format!("natter-{}", Uuid::new_v4());

        let media_uri = self.runtime.block_on(self.media.put_audio(&job_name, &wav))?;
        self.runtime.block_on(self.transcribe.start_job(&job_name, &media_uri))?;

        let outcome = self.runtime.block_on(poll_until_terminal(
            &self.transcribe,
            &job_name,
            &self.config.poll,
            &self.cancel,
            |job| {
                self.emit(SessionEvent::JobUpdate {
                    job_name: job.job_name.clone(),
                    status: job.status,
                });
            },
        ))?;

        // Jobs are one-shot; clean up regardless of how the poll ended
        if let Err(e) = self.runtime.block_on(self.transcribe.delete_job(&job_name)) {
            debug!("Failed to delete job {}: {}", job_name, e);
        }

        let job = match outcome {
            PollOutcome::Terminal(job) => job,
            PollOutcome::TimedOut => {
                self.emit(SessionEvent::Error(
                    "Transcription took too long. Please try again.".into(),
                ));
                return Ok(BatchOutcome::Failed);
            }
            PollOutcome::Cancelled => return Ok(BatchOutcome::Cancelled),
        };

        match job.status {
            JobStatus::Completed => {
                let transcript_uri = match job.transcript_uri {
                    Some(uri) => uri,
                    None => {
                        warn!("Job {} completed without a transcript URI", job.job_name);
                        self.emit(SessionEvent::Error(
                            "Transcription finished without a transcript".into(),
                        ));
                        return Ok(BatchOutcome::Failed);
                    }
                };

                let document = self.runtime.block_on(self.transcribe.fetch_transcript(&transcript_uri))?;
                let text = document.text.trim().to_string();
                if text.is_empty() {
                    info!("Job {} produced an empty transcript", job.job_name);
                    return Ok(BatchOutcome::Failed);
                }

                Ok(BatchOutcome::Transcript {
                    text,
                    transcribe_ms: sw.elapsed_ms(),
                })
            }
            JobStatus::Failed => {
                warn!(
                    "Job {} failed: {}",
                    job.job_name,
                    job.failure_reason.as_deref().unwrap_or("unknown reason")
                );
                Ok(BatchOutcome::Failed)
            }
            status => {
                warn!("Job {} returned non-terminal status {}", job.job_name, status.as_str());
                Ok(BatchOutcome::Failed)
            }
        }
    }

    /// Append the user turn, get an answer, speak it
    fn run_answer_exchange(&mut self, transcript: &str, meta: TurnMeta) {
        let user_turn = ChatTurn::user(transcript).with_meta(meta);
        self.turns.push(user_turn.clone());
        self.emit(SessionEvent::TurnAdded(user_turn));
        self.context.push_user(transcript);

        let sw = Stopwatch::start();
        match self.runtime.block_on(self.answer.complete(&self.context.messages())) {
            Ok(answer) => {
                let answer_ms = sw.elapsed_ms();
                self.emit(SessionEvent::AnswerReady(answer.clone()));
                let meta = TurnMeta {
                    answer_ms: Some(answer_ms),
                    ..TurnMeta::default()
                };
                self.speak_assistant(&answer, meta);
            }
            Err(e) => {
                error!("Answer request failed: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
                self.apologize();
            }
        }
    }

    /// Speak the canned apology as an assistant turn
    fn apologize(&mut self) {
        let apology = self.config.apology_text.clone();
        self.speak_assistant(&apology, TurnMeta::default());
    }

    /// Append an assistant turn, synthesize it, and play it back.
    ///
    /// Synthesis failures degrade to a text-only turn.
    fn speak_assistant(&mut self, text: &str, mut meta: TurnMeta) {
        let sw = Stopwatch::start();
        let audio = match self.runtime.block_on(self.speech.synthesize(text)) {
            Ok(audio) => {
                meta.synthesis_ms = Some(sw.elapsed_ms());
                Some(audio)
            }
            Err(e) => {
                error!("Speech synthesis failed: {}", e);
                self.emit(SessionEvent::Error(e.user_message()));
                None
            }
        };

        let turn = ChatTurn::assistant(text).with_meta(meta);
        self.turns.push(turn.clone());
        self.emit(SessionEvent::TurnAdded(turn));
        self.context.push_assistant(text);

        if let Some(audio) = audio {
            if !audio.is_empty() {
                self.emit(SessionEvent::SpeechReady {
                    duration_secs: audio.duration_secs(),
                });
                self.play(audio);
            }
        }
    }

    #[cfg(feature = "audio-io")]
    fn play(&mut self, audio: SynthesizedAudio) {
        let output = match &self.output {
            Some(output) => output,
            None => {
                debug!("Audio output disabled, skipping playback");
                return;
            }
        };

        let samples = audio.to_samples();
        let device_rate = output.sample_rate();
        let samples = if audio.sample_rate != device_rate {
            match resample_audio(&samples, audio.sample_rate, device_rate) {
                Ok(resampled) => resampled,
                Err(e) => {
                    error!("Failed to resample synthesized audio: {}", e);
                    self.emit(SessionEvent::Error(e.user_message()));
                    return;
                }
            }
        } else {
            samples
        };

        output.enqueue(&samples);
        self.emit(SessionEvent::PlaybackStarted);

        // Block until the queue drains or the user interrupts
        while !output.is_idle() {
            if self.cancel.load(Ordering::SeqCst) {
                output.clear();
                self.cancel.store(false, Ordering::SeqCst);
                info!("Playback interrupted");
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        self.emit(SessionEvent::PlaybackComplete);
    }

    #[cfg(not(feature = "audio-io"))]
    fn play(&mut self, _audio: SynthesizedAudio) {
        debug!("Audio output not compiled in, skipping playback");
    }
}
