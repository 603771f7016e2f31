use regex::Regex;
use serde_json::Value;

pub use regex::Error as PatternError;

pub const MAX_PROMPT_CHARS: usize = 4000;

const DENYLIST: [(&str, &str); 6] = [
    ("eval_call", r"(?i)eval\s*\("),
    ("script_tag", r"(?is)<script\b.*?</script>"),
    ("javascript_scheme", r"(?i)javascript:"),
    (
        "inline_event_handler",
        r"(?i)\bon(?:error|click|load|mouseover|focus|submit)\s*=",
    ),
    ("exec_command", r"(?i)execCommand"),
    ("iframe_tag", r"(?is)<iframe\b.*?</iframe>"),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejection {
    #[error("Valid prompt is required")]
    Missing,
    #[error("Prompt exceeds maximum length of {max} characters")]
    TooLong { max: usize },
    #[error("Potentially malicious content detected")]
    Suspicious { rule: &'static str },
}

/// Prompt validation applied before any upstream call.
///
/// Rules run in order and stop at the first rejection: presence, length,
/// denylist, then `<`/`>` escaping and trimming. This protects the event
/// stream the gateway renders; DOM escaping stays with the browser.
#[derive(Debug, Clone)]
pub struct InputGuard {
    denylist: Vec<(&'static str, Regex)>,
}

impl InputGuard {
    pub fn new() -> Result<Self, PatternError> {
        let denylist = DENYLIST
            .iter()
            .map(|(name, pattern)| Regex::new(pattern).map(|regex| (*name, regex)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { denylist })
    }

    /// Validates a prompt taken from a JSON body; non-string values count as missing.
    pub fn validate_value(&self, raw: Option<&Value>) -> Result<String, GuardRejection> {
        self.validate(raw.and_then(Value::as_str))
    }

    pub fn validate(&self, raw: Option<&str>) -> Result<String, GuardRejection> {
        let Some(prompt) = raw.filter(|value| !value.is_empty()) else {
            return Err(GuardRejection::Missing);
        };
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(GuardRejection::TooLong {
                max: MAX_PROMPT_CHARS,
            });
        }
        if let Some((rule, _)) = self.denylist.iter().find(|(_, regex)| regex.is_match(prompt)) {
            return Err(GuardRejection::Suspicious { rule });
        }
        let sanitized = prompt.replace('<', "&lt;").replace('>', "&gt;");
        let sanitized = sanitized.trim();
        if sanitized.is_empty() {
            return Err(GuardRejection::Missing);
        }
        Ok(sanitized.to_string())
    }
}
