use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use futures_util::StreamExt;
use thinkrelay_core::models::{resolve_api_key, ModelId};
use thinkrelay_core::sse::{chat_delta_content, parse_line, LineDecoder, UpstreamFrame};
use thinkrelay_core::thinking::{Segment, ThinkingClassifier};
use thinkrelay_service::upstream::{
    self, build_http_client, ByteStream, ChatRequest, Completion, TogetherClient, UpstreamError,
};
use thinkrelay_service::GatewayConfig;

/// Send one prompt to the chat-completions provider and print the answer.
#[derive(Debug, Parser)]
#[command(name = "thinkrelay-ask", version)]
struct Cli {
    /// Model id; defaults to the gateway's default model.
    #[arg(long, short)]
    model: Option<String>,

    /// Caller key, required for models that do not run on the server key.
    #[arg(long)]
    api_key: Option<String>,

    /// Print the answer as it streams; thinking text goes to stderr.
    #[arg(long)]
    stream: bool,

    /// Prompt words, joined with spaces.
    #[arg(required = true)]
    message: Vec<String>,
}

/// Writes answer text to stdout and thinking text to stderr.
fn print_delta(classifier: &mut ThinkingClassifier, delta: &str) -> io::Result<()> {
    match classifier.classify(delta) {
        Segment::Marker => Ok(()),
        Segment::Thinking(text) => {
            let mut err = io::stderr().lock();
            err.write_all(text.as_bytes())?;
            err.flush()
        }
        Segment::Answer(text) => {
            let mut out = io::stdout().lock();
            out.write_all(text.as_bytes())?;
            out.flush()
        }
    }
}

fn print_line(classifier: &mut ThinkingClassifier, line: &str) -> io::Result<bool> {
    match parse_line(line) {
        Some(Ok(UpstreamFrame::Done)) => Ok(true),
        Some(Ok(UpstreamFrame::Data(value))) => {
            if let Some(delta) = chat_delta_content(&value) {
                print_delta(classifier, delta)?;
            }
            Ok(false)
        }
        Some(Err(err)) => {
            log::debug!("event=frame_skipped err={}", err);
            Ok(false)
        }
        None => Ok(false),
    }
}

async fn print_stream(mut stream: ByteStream) -> Result<(), String> {
    let mut decoder = LineDecoder::new();
    let mut classifier = ThinkingClassifier::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err: UpstreamError| err.to_string())?;
        let lines = decoder.push(&chunk).map_err(|err| err.to_string())?;
        for line in lines {
            if print_line(&mut classifier, &line).map_err(|err| err.to_string())? {
                println!();
                return Ok(());
            }
        }
    }
    if let Some(line) = decoder.finish() {
        print_line(&mut classifier, &line).map_err(|err| err.to_string())?;
    }
    println!();
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = GatewayConfig::from_env();
    let model = ModelId::from_request(cli.model.as_deref());
    let (api_key, _) = resolve_api_key(
        &model,
        cli.api_key.as_deref(),
        config.together_api_key.as_ref(),
    )
    .map_err(|err| err.to_string())?;
    let prompt = cli.message.join(" ");
    let client = TogetherClient::from_config(build_http_client(&config), &config);
    let request = ChatRequest::new(model, prompt, api_key);

    match upstream::complete(&client, &request, cli.stream)
        .await
        .map_err(|err| err.to_string())?
    {
        Completion::Buffered(completion) => {
            println!("{}", completion.content);
            log::info!("event=ask_finished tokens={}", completion.token_count);
            Ok(())
        }
        Completion::Stream(stream) => print_stream(stream).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    thinkrelay_service::init_logging();
    thinkrelay_service::portable::bootstrap_current_process();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_words_and_flags_parse() {
        let cli = Cli::try_parse_from([
            "thinkrelay-ask",
            "--model",
            "Qwen/Qwen3-235B-A22B-fp8-tput",
            "--api-key",
            "k",
            "what",
            "is",
            "2+2?",
        ])
        .expect("parsed");
        assert_eq!(cli.model.as_deref(), Some("Qwen/Qwen3-235B-A22B-fp8-tput"));
        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert!(!cli.stream);
        assert_eq!(cli.message.join(" "), "what is 2+2?");
    }

    #[test]
    fn message_is_required() {
        assert!(Cli::try_parse_from(["thinkrelay-ask", "--stream"]).is_err());
    }
}
