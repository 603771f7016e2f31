/// Character-based token estimate: `round(chars / 4)`.
pub fn estimate_text_tokens(text: &str) -> u64 {
    (text.chars().count() as f64 / 4.0).round() as u64
}

/// Estimate for a prompt/response pair, each side rounded on its own.
pub fn estimate_exchange_tokens(prompt: &str, response: &str) -> u64 {
    estimate_text_tokens(prompt) + estimate_text_tokens(response)
}
