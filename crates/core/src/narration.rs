//! Synthetic "analysis" narration shown next to the streamed answer.
//!
//! None of this text comes from the provider. It is keyword-gated, the
//! calculation log only grows, and every tick re-broadcasts the whole text.

const HEADER_KEYWORDS: [&str; 4] = ["calculate", "math", "discount", "price"];
const CALCULATION_KEYWORDS: [&str; 3] = ["calculate", "math", "solve"];
const PROMPT_PREVIEW_CHARS: usize = 100;

const OPERATOR_NOTES: [(&[&str], &str); 6] = [
    (&["="], "• Evaluating equation: found equality expression"),
    (&["%"], "• Processing percentage calculation"),
    (&["$"], "• Handling currency values"),
    (&["+", "-"], "• Performing addition/subtraction operations"),
    (&["*", "×", "·"], "• Performing multiplication operations"),
    (&["/", "÷"], "• Performing division operations"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickState {
    pub tokens: u64,
    pub elapsed_ms: u64,
}

fn contains_any(prompt: &str, keywords: &[&str]) -> bool {
    let lowered = prompt.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Prompts that get the mathematical opening header.
pub fn is_math_prompt(prompt: &str) -> bool {
    contains_any(prompt, &HEADER_KEYWORDS)
}

/// Prompts that get the per-tick calculation log.
pub fn tracks_calculation(prompt: &str) -> bool {
    contains_any(prompt, &CALCULATION_KEYWORDS)
}

fn prompt_preview(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub fn opening(prompt: &str) -> String {
    let mut text = format!("Analyzing prompt: \"{}\"\n\n", prompt_preview(prompt));
    if is_math_prompt(prompt) {
        text.push_str("MATHEMATICAL ANALYSIS:\n");
        text.push_str("1. Identifying mathematical pattern in the query\n");
        text.push_str("2. Extracting numerical values and operations\n");
        text.push_str("3. Determining calculation sequence\n");
        text.push_str("4. Preparing step-by-step solution approach\n\n");
        text.push_str("Processing with selected model\n");
        text.push_str("Generating structured mathematical response...");
    } else {
        text.push_str("Processing with selected model\nGenerating response...");
    }
    text
}

/// Log lines for the operators present in `delta`, in a fixed order.
pub fn operator_notes(delta: &str) -> Vec<&'static str> {
    OPERATOR_NOTES
        .iter()
        .filter(|(symbols, _)| symbols.iter().any(|symbol| delta.contains(symbol)))
        .map(|(_, note)| *note)
        .collect()
}

fn tokens_per_second(tick: TickState) -> u64 {
    if tick.elapsed_ms == 0 {
        return tick.tokens.saturating_mul(1000);
    }
    ((tick.tokens as f64) * 1000.0 / (tick.elapsed_ms as f64)).round() as u64
}

/// Full narration text for a metrics tick, given the accumulated calculation log.
pub fn narrate(prompt: &str, calculation_log: &str, tick: TickState) -> String {
    let mut text = format!("Analyzing prompt: \"{}\"\n\n", prompt_preview(prompt));
    text.push_str("MATHEMATICAL ANALYSIS:\n");
    text.push_str("1. Identified mathematical pattern in the query\n");
    text.push_str("2. Extracted numerical values and operations\n");
    text.push_str("3. Determined calculation sequence\n");
    text.push_str("4. Preparing step-by-step solution\n\n");
    text.push_str("CALCULATION PROCESS:\n");
    text.push_str(calculation_log);
    text.push_str("\n\nPERFORMANCE METRICS:\n");
    text.push_str(&format!("• Tokens processed: {}\n", tick.tokens));
    text.push_str(&format!("• Elapsed time: {}ms\n", tick.elapsed_ms));
    text.push_str(&format!(
        "• Processing rate: {} tokens/second",
        tokens_per_second(tick)
    ));
    text
}

/// Per-session narration state.
#[derive(Debug, Clone)]
pub struct Narrator {
    prompt: String,
    tracks_calculation: bool,
    calculation_log: String,
}

impl Narrator {
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            tracks_calculation: tracks_calculation(&prompt),
            prompt,
            calculation_log: String::new(),
        }
    }

    pub fn opening(&self) -> String {
        opening(&self.prompt)
    }

    /// Extends the calculation log with `delta`'s operators and returns the
    /// re-rendered narration, or `None` for prompts without calculation tracking.
    pub fn on_tick(&mut self, delta: &str, tick: TickState) -> Option<String> {
        if !self.tracks_calculation {
            return None;
        }
        for note in operator_notes(delta) {
            self.calculation_log.push_str(note);
            self.calculation_log.push('\n');
        }
        Some(narrate(&self.prompt, &self.calculation_log, tick))
    }

    pub fn calculation_log(&self) -> &str {
        &self.calculation_log
    }
}
