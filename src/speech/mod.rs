//! Cloud text-to-speech.
//!
//! Sends answer text to the synthesis service and gets raw PCM back, ready
//! for the playback queue.

pub mod synthesize;

pub use synthesize::{
    SpeechClient, SpeechConfig, SynthesizedAudio, DEFAULT_ENGINE, DEFAULT_VOICE,
    MAX_SPEECH_INPUT_CHARS,
};
