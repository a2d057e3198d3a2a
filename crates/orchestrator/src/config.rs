//! Pipeline limits and timeouts.

use std::time::Duration;

/// Default instruction character budget.
pub const DEFAULT_INSTRUCTION_MAX_CHARS: usize = 4000;

/// Default knowledge character cap.
pub const DEFAULT_KNOWLEDGE_MAX_CHARS: usize = 3000;

/// Static limits of the reply pipeline.
///
/// Runtime-editable parameters (model, temperature, history depth, ...)
/// live in the automation settings row instead and are read per attempt.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Instruction text is cut to exactly this many characters at use time.
    pub instruction_max_chars: usize,
    /// Knowledge text is cut to this many characters before the marker.
    pub knowledge_max_chars: usize,
    /// Upper bound on one model call (generation, synthesis, transcription).
    pub generation_timeout: Duration,
    /// Upper bound on one channel call (send, upload, download).
    pub send_timeout: Duration,
    /// Messages reviewed by the analysis pass.
    pub analysis_history: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruction_max_chars: DEFAULT_INSTRUCTION_MAX_CHARS,
            knowledge_max_chars: DEFAULT_KNOWLEDGE_MAX_CHARS,
            generation_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(15),
            analysis_history: 30,
        }
    }
}

impl PipelineConfig {
    /// Set the instruction budget.
    pub fn with_instruction_max_chars(mut self, chars: usize) -> Self {
        self.instruction_max_chars = chars;
        self
    }

    /// Set the model call timeout.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Set the channel call timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
