use thinkrelay_core::guard::{GuardRejection, InputGuard, MAX_PROMPT_CHARS};

fn guard() -> InputGuard {
    InputGuard::new().expect("denylist compiles")
}

#[test]
fn prompt_one_past_limit_is_rejected_regardless_of_content() {
    let guard = guard();
    for filler in ["a", " ", "<", "é"] {
        let prompt = filler.repeat(MAX_PROMPT_CHARS + 1);
        assert_eq!(
            guard.validate(Some(&prompt)),
            Err(GuardRejection::TooLong {
                max: MAX_PROMPT_CHARS
            })
        );
    }
    let err = guard
        .validate(Some(&"x".repeat(4001)))
        .expect_err("too long");
    assert_eq!(
        err.to_string(),
        "Prompt exceeds maximum length of 4000 characters"
    );
}

#[test]
fn prompt_at_limit_is_sanitized() {
    let guard = guard();
    let mut prompt = "b".repeat(MAX_PROMPT_CHARS - 4);
    prompt.push_str(" <> ");
    let sanitized = guard.validate(Some(&prompt)).expect("accepted");
    assert!(sanitized.ends_with("b &lt;&gt;"));
    assert!(!sanitized.contains('<'));
    assert!(!sanitized.contains('>'));
}

#[test]
fn length_is_counted_in_characters_not_bytes() {
    let prompt = "ü".repeat(MAX_PROMPT_CHARS);
    assert!(prompt.len() > MAX_PROMPT_CHARS);
    assert_eq!(guard().validate(Some(&prompt)), Ok(prompt));
}

#[test]
fn sanitized_output_has_no_surrounding_whitespace() {
    let sanitized = guard()
        .validate(Some("\n\t  is 3 > 2?  \n"))
        .expect("accepted");
    assert_eq!(sanitized, "is 3 &gt; 2?");
}

#[test]
fn denylist_is_case_insensitive() {
    let guard = guard();
    for prompt in [
        "<SCRIPT>alert(1)</SCRIPT>",
        "JavaScript:void(0)",
        "<img src=x OnError=alert(1)>",
        "EVAL (code)",
        "document.ExecCommand('copy')",
    ] {
        assert!(
            matches!(
                guard.validate(Some(prompt)),
                Err(GuardRejection::Suspicious { .. })
            ),
            "expected rejection for {prompt}"
        );
    }
}
