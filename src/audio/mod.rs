pub mod buffer;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod resampler;
pub mod wav;

pub use buffer::RecordingBuffer;
#[cfg(feature = "audio-io")]
pub use input::AudioInput;
#[cfg(feature = "audio-io")]
pub use output::AudioOutput;
pub use resampler::{resample_audio, AudioResampler};
pub use wav::{encode_wav, f32_to_pcm16_bytes, pcm16_bytes_to_f32, read_wav_file, write_wav_file};
