use std::time::Instant;

use thinkrelay_core::event::NormalizedEvent;
use thinkrelay_core::narration::{Narrator, TickState};
use thinkrelay_core::thinking::{Segment, ThinkingClassifier};

pub const DEFAULT_METRICS_EVERY: u64 = 10;

/// Per-request relay state. Lives exactly as long as one client stream.
#[derive(Debug)]
pub struct Session {
    started_at: Instant,
    token_count: u64,
    metrics_every: u64,
    classifier: ThinkingClassifier,
    thinking_buffer: String,
    response_buffer: String,
    narrator: Option<Narrator>,
}

impl Session {
    pub fn new(prompt: &str, narrate: bool, metrics_every: u64) -> Self {
        Self {
            started_at: Instant::now(),
            token_count: 0,
            metrics_every,
            classifier: ThinkingClassifier::new(),
            thinking_buffer: String::new(),
            response_buffer: String::new(),
            narrator: narrate.then(|| Narrator::new(prompt)),
        }
    }

    pub fn opening_event(&self) -> Option<NormalizedEvent> {
        self.narrator
            .as_ref()
            .map(|narrator| NormalizedEvent::reasoning(narrator.opening()))
    }

    /// Fallback attempts replay classification without narration.
    pub fn disable_narration(&mut self) {
        self.narrator = None;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn thinking_text(&self) -> &str {
        &self.thinking_buffer
    }

    pub fn response_text(&self) -> &str {
        &self.response_buffer
    }

    pub fn ingest(&mut self, delta: &str) -> Vec<NormalizedEvent> {
        let elapsed_ms = self.elapsed_ms();
        self.ingest_at(delta, elapsed_ms)
    }

    /// Events produced by one non-empty content delta, in emission order:
    /// the metrics tick (and narration) first, then the content itself.
    pub fn ingest_at(&mut self, delta: &str, elapsed_ms: u64) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        if delta.is_empty() {
            return events;
        }
        self.token_count += 1;

        if self.metrics_every > 0 && self.token_count % self.metrics_every == 0 {
            events.push(NormalizedEvent::Metrics {
                tokens: self.token_count,
                elapsed_ms,
            });
            let tick = TickState {
                tokens: self.token_count,
                elapsed_ms,
            };
            if let Some(narration) = self
                .narrator
                .as_mut()
                .and_then(|narrator| narrator.on_tick(delta, tick))
            {
                events.push(NormalizedEvent::reasoning(narration));
            }
        }

        match self.classifier.classify(delta) {
            Segment::Marker => {}
            Segment::Thinking(text) => {
                self.thinking_buffer.push_str(text);
                events.push(NormalizedEvent::Reasoning {
                    text: self.thinking_buffer.clone(),
                    delta: Some(text.to_string()),
                });
            }
            Segment::Answer(text) => {
                self.response_buffer.push_str(text);
                events.push(NormalizedEvent::Response {
                    content: text.to_string(),
                    tokens: self.token_count,
                });
            }
        }
        events
    }

    pub fn final_metrics(&self) -> NormalizedEvent {
        NormalizedEvent::Metrics {
            tokens: self.token_count,
            elapsed_ms: self.elapsed_ms(),
        }
    }

    pub fn done(&self) -> NormalizedEvent {
        NormalizedEvent::Done {
            tokens: self.token_count,
        }
    }
}
