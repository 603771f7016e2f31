use thinkrelay_core::sse::{chat_delta_content, parse_line, LineDecoder, UpstreamFrame};
use thinkrelay_core::thinking::{Segment, ThinkingClassifier};

const TRANSCRIPT: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"<think>\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"20% of 50\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"</think>\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"You save \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"$10 → $40\"}}]}\n\n",
    "data: [DONE]\n\n",
);

fn decode(chunks: &[&[u8]]) -> (Vec<String>, Vec<String>, bool) {
    let mut decoder = LineDecoder::new();
    let mut classifier = ThinkingClassifier::new();
    let mut thinking = Vec::new();
    let mut answer = Vec::new();
    let mut done = false;
    let mut lines = Vec::new();
    for chunk in chunks {
        lines.extend(decoder.push(chunk).expect("line within limit"));
    }
    lines.extend(decoder.finish());
    for line in lines {
        let Some(frame) = parse_line(&line) else {
            continue;
        };
        match frame.expect("valid frame") {
            UpstreamFrame::Done => done = true,
            UpstreamFrame::Data(value) => {
                let Some(delta) = chat_delta_content(&value) else {
                    continue;
                };
                match classifier.classify(delta) {
                    Segment::Marker => {}
                    Segment::Thinking(text) => thinking.push(text.to_string()),
                    Segment::Answer(text) => answer.push(text.to_string()),
                }
            }
        }
    }
    (thinking, answer, done)
}

#[test]
fn transcript_decodes_identically_for_every_split_point() {
    let bytes = TRANSCRIPT.as_bytes();
    let whole = decode(&[bytes]);
    assert_eq!(whole.0, vec!["20% of 50".to_string()]);
    assert_eq!(whole.1.concat(), "You save $10 → $40");
    assert!(whole.2);

    for split in 1..bytes.len() {
        let (head, tail) = bytes.split_at(split);
        assert_eq!(decode(&[head, tail]), whole, "split at byte {split}");
    }
}

#[test]
fn byte_at_a_time_delivery_matches_whole_delivery() {
    let bytes = TRANSCRIPT.as_bytes();
    let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(decode(&chunks), decode(&[bytes]));
}
