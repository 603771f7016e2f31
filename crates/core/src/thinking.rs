pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// The delta carried a region marker; it is consumed, never forwarded.
    Marker,
    Thinking(&'a str),
    Answer(&'a str),
}

/// Splits provider deltas into thinking-region text and final-answer text.
#[derive(Debug, Default, Clone)]
pub struct ThinkingClassifier {
    is_thinking: bool,
}

impl ThinkingClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify<'a>(&mut self, delta: &'a str) -> Segment<'a> {
        if delta.contains(THINK_OPEN) {
            self.is_thinking = true;
            return Segment::Marker;
        }
        if delta.contains(THINK_CLOSE) {
            self.is_thinking = false;
            return Segment::Marker;
        }
        if self.is_thinking {
            Segment::Thinking(delta)
        } else {
            Segment::Answer(delta)
        }
    }
}
