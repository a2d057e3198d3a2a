//! Mock speech synthesis and transcription.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use brain_core::{
    async_trait, BrainError, SpeechRequest, SpeechSynthesizer, SynthesizedAudio, Transcriber,
};

/// A synthesizer that returns fixed audio bytes, or always fails.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    audio: Option<Vec<u8>>,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl MockSynthesizer {
    /// Synthesize every request to the given bytes (`audio/ogg`).
    pub fn returning(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            audio: Some(bytes.into()),
            ..Default::default()
        }
    }

    /// Fail every request.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SynthesizedAudio, BrainError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match &self.audio {
            Some(bytes) => Ok(SynthesizedAudio {
                bytes: bytes.clone(),
                mime_type: "audio/ogg".to_string(),
            }),
            None => Err(BrainError::ProcessingFailed("speech synthesis unavailable".to_string())),
        }
    }
}

/// A transcriber that returns a fixed transcript, or always fails.
#[derive(Debug, Default)]
pub struct MockTranscriber {
    transcript: Option<String>,
    calls: AtomicUsize,
}

impl MockTranscriber {
    /// Transcribe every clip to the given text.
    pub fn returning(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Some(transcript.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every clip.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of transcribe calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _mime_type: &str) -> Result<String, BrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcript
            .clone()
            .ok_or_else(|| BrainError::ProcessingFailed("transcription unavailable".to_string()))
    }
}
