//! Text-to-speech narration of clues
//!
//! A presenter owns a [`SpeechSlot`]. While the slot is busy, further requests
//! from that presenter are dropped; the slot frees up when playback ends or
//! anything fails along the way. Failures are logged and otherwise silent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::llm::{LlmError, LlmProvider, SpeechRequest};

/// Sample rate of synthesized speech
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Synthesized speech is mono
pub const SPEECH_CHANNELS: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    #[error("No speech provider configured")]
    Unavailable,

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] LlmError),

    #[error("Speech response contained no audio")]
    EmptyAudio,

    #[error("Audio decoding failed: {0}")]
    Decode(String),

    #[error("Audio playback failed: {0}")]
    Playback(String),
}

/// Decoded audio, samples interleaved by channel in -1.0..1.0
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Decode little-endian signed 16-bit PCM
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioClip, NarratorError> {
    if channels == 0 {
        return Err(NarratorError::Decode("zero channels".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(NarratorError::Decode(format!(
            "odd byte count {} for 16-bit samples",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioClip {
        samples,
        sample_rate,
        channels,
    })
}

/// Where decoded narration goes
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the clip once, resolving when playback has finished
    async fn play(&self, clip: AudioClip) -> Result<(), NarratorError>;
}

/// Sink that holds for the length of the clip without producing sound.
/// Stands in for an audio device so the busy flag follows real playback time.
#[derive(Debug, Default, Clone)]
pub struct PacedSink;

#[async_trait]
impl AudioSink for PacedSink {
    async fn play(&self, clip: AudioClip) -> Result<(), NarratorError> {
        let duration = clip.duration();
        tracing::debug!("Narrating {:.1}s of audio", duration.as_secs_f32());
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

/// Busy flag owned by one presenter
#[derive(Debug, Clone, Default)]
pub struct SpeechSlot(Arc<AtomicBool>);

impl SpeechSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot; false if a narration is already in flight
    fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
pub struct Narrator {
    provider: Option<Arc<dyn LlmProvider>>,
    sink: Arc<dyn AudioSink>,
    timeout: Option<Duration>,
}

impl Narrator {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        sink: Arc<dyn AudioSink>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            sink,
            timeout,
        }
    }

    /// Read `text` aloud in the background.
    /// Returns None without doing anything when the slot is busy.
    pub fn speak(&self, slot: &SpeechSlot, text: impl Into<String>) -> Option<JoinHandle<()>> {
        if !slot.try_acquire() {
            tracing::debug!("Narration already in progress, ignoring request");
            return None;
        }

        let narrator = self.clone();
        let slot = slot.clone();
        let text = text.into();

        Some(tokio::spawn(async move {
            if let Err(e) = narrator.narrate(text).await {
                match e {
                    NarratorError::Unavailable => tracing::debug!("Skipping narration: {}", e),
                    _ => tracing::warn!("TTS error: {}", e),
                }
            }
            slot.release();
        }))
    }

    async fn narrate(&self, text: String) -> Result<(), NarratorError> {
        let provider = self.provider.as_ref().ok_or(NarratorError::Unavailable)?;

        let speech = provider
            .synthesize_speech(SpeechRequest {
                text,
                timeout: self.timeout,
            })
            .await?;

        if speech.audio.is_empty() {
            return Err(NarratorError::EmptyAudio);
        }

        let clip = decode_pcm16(&speech.audio, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS)?;
        self.sink.play(clip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{
        GenerateRequest, GenerateResponse, LlmResult, ResponseMetadata, SpeechResponse,
    };
    use std::sync::atomic::AtomicUsize;

    struct FixedSpeech {
        audio: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FixedSpeech {
        async fn generate(&self, _request: GenerateRequest) -> LlmResult<GenerateResponse> {
            Err(LlmError::ApiError("not used".to_string()))
        }

        async fn synthesize_speech(&self, _request: SpeechRequest) -> LlmResult<SpeechResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SpeechResponse {
                audio: self.audio.clone(),
                mime_type: None,
                metadata: ResponseMetadata {
                    provider: "fixed".to_string(),
                    model: "fixed".to_string(),
                    tokens_used: None,
                    latency_ms: 0,
                },
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_decode_pcm16() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80, 0xff, 0x7f];
        let clip = decode_pcm16(&bytes, SPEECH_SAMPLE_RATE, 1).unwrap();
        assert_eq!(clip.samples.len(), 4);
        assert_eq!(clip.samples[0], 0.0);
        assert_eq!(clip.samples[1], 0.5);
        assert_eq!(clip.samples[2], -1.0);
        assert!(clip.samples[3] > 0.99 && clip.samples[3] < 1.0);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        assert!(matches!(
            decode_pcm16(&[0x00, 0x01, 0x02], SPEECH_SAMPLE_RATE, 1),
            Err(NarratorError::Decode(_))
        ));
    }

    #[test]
    fn test_clip_duration() {
        let clip = AudioClip {
            samples: vec![0.0; 48_000],
            sample_rate: SPEECH_SAMPLE_RATE,
            channels: 1,
        };
        assert_eq!(clip.duration(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_suppresses_overlapping_requests() {
        // one second of silence
        let provider = Arc::new(FixedSpeech {
            audio: vec![0u8; 48_000],
            calls: AtomicUsize::new(0),
        });
        let narrator = Narrator::new(Some(provider.clone()), Arc::new(PacedSink), None);
        let slot = SpeechSlot::new();

        let first = narrator.speak(&slot, "This reindeer has a red nose.");
        assert!(first.is_some());
        assert!(slot.is_busy());
        assert!(narrator.speak(&slot, "again").is_none());

        first.unwrap().await.unwrap();
        assert!(!slot.is_busy());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // free again after playback
        narrator.speak(&slot, "again").unwrap().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let narrator = Narrator::new(None, Arc::new(PacedSink), None);
        let slot = SpeechSlot::new();
        narrator.speak(&slot, "clue").unwrap().await.unwrap();
        assert!(!slot.is_busy());

        let provider = Arc::new(FixedSpeech {
            audio: vec![1, 2, 3],
            calls: AtomicUsize::new(0),
        });
        let narrator = Narrator::new(Some(provider), Arc::new(PacedSink), None);
        narrator.speak(&slot, "clue").unwrap().await.unwrap();
        assert!(!slot.is_busy());
    }

    struct FailingSpeech;

    #[async_trait]
    impl LlmProvider for FailingSpeech {
        async fn generate(&self, _request: GenerateRequest) -> LlmResult<GenerateResponse> {
            Err(LlmError::ApiError("not used".to_string()))
        }

        async fn synthesize_speech(&self, request: SpeechRequest) -> LlmResult<SpeechResponse> {
            Err(LlmError::Timeout(request.timeout.unwrap_or_default()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct CountingSink {
        clips: AtomicUsize,
    }

    #[async_trait]
    impl AudioSink for CountingSink {
        async fn play(&self, _clip: AudioClip) -> Result<(), NarratorError> {
            self.clips.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_speech_error_releases_slot_without_playing() {
        let sink = Arc::new(CountingSink::default());
        let narrator = Narrator::new(
            Some(Arc::new(FailingSpeech)),
            sink.clone(),
            Some(Duration::from_secs(5)),
        );
        let slot = SpeechSlot::new();

        narrator.speak(&slot, "clue").unwrap().await.unwrap();
        assert!(!slot.is_busy());
        assert_eq!(sink.clips.load(Ordering::SeqCst), 0);

        // the slot is usable again right away
        assert!(narrator.speak(&slot, "clue").is_some());
    }
}
