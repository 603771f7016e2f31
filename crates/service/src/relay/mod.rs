//! Streaming relay: one upstream byte stream in, one client event stream out.
//!
//! `Init -> Streaming -> Terminated`, or on a connection failure
//! `Init -> Fallback -> Streaming -> Terminated`. The fallback budget is one
//! attempt; a failure after streaming began is terminal.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thinkrelay_core::event::NormalizedEvent;
use thinkrelay_core::models::ModelId;
use thinkrelay_core::sse::{
    chat_delta_content, parse_line, LineDecoder, UpstreamFrame, MAX_PENDING_LINE_BYTES,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::upstream::{ByteStream, ChatRequest, ChatUpstream, UpstreamError};

mod session;

pub use session::{Session, DEFAULT_METRICS_EVERY};

pub const FALLBACK_NOTICE: &str =
    "The selected model is currently unavailable. Falling back to default model.";
pub const ALL_MODELS_UNAVAILABLE: &str = "All models unavailable. Please try again later.";

const RELAY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub fallback_model: ModelId,
    /// Synthetic narration on the first attempt; fallback attempts never narrate.
    pub narrate: bool,
    pub idle_timeout: Option<Duration>,
    pub metrics_every: u64,
    /// Longest upstream line held without a newline before the stream fails.
    pub max_line_bytes: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            fallback_model: ModelId::fallback_model(),
            narrate: true,
            idle_timeout: None,
            metrics_every: DEFAULT_METRICS_EVERY,
            max_line_bytes: MAX_PENDING_LINE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Init,
    Streaming,
    Fallback,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    Failed(String),
    ClientGone,
}

#[derive(Debug, Clone)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub token_count: u64,
    pub used_fallback: bool,
    /// Phases visited, in order.
    pub phases: Vec<RelayPhase>,
}

enum PumpEnd {
    Finished,
    Failed(UpstreamError),
    ClientGone,
}

struct ClientGone;

struct Emitter {
    tx: mpsc::Sender<NormalizedEvent>,
}

impl Emitter {
    async fn send(&self, event: NormalizedEvent) -> Result<(), ClientGone> {
        self.tx.send(event).await.map_err(|_| ClientGone)
    }

    async fn send_all(&self, events: Vec<NormalizedEvent>) -> Result<(), ClientGone> {
        for event in events {
            self.send(event).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct StreamRelay {
    upstream: Arc<dyn ChatUpstream>,
    options: RelayOptions,
}

impl StreamRelay {
    pub fn new(upstream: Arc<dyn ChatUpstream>, options: RelayOptions) -> Self {
        Self { upstream, options }
    }

    /// Runs the relay on its own task. Dropping the returned stream cancels
    /// the relay and releases the upstream connection.
    pub fn spawn(&self, request: ChatRequest) -> ReceiverStream<NormalizedEvent> {
        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        let relay = self.clone();
        tokio::spawn(async move {
            relay.run(request, tx).await;
        });
        ReceiverStream::new(rx)
    }

    pub async fn run(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<NormalizedEvent>,
    ) -> RelayReport {
        let emitter = Emitter { tx };
        let mut session = Session::new(
            &request.prompt,
            self.options.narrate,
            self.options.metrics_every,
        );
        let mut phases = vec![RelayPhase::Init];
        let mut used_fallback = false;

        let outcome = match self.open(&emitter, &request).await {
            Err(ClientGone) => RelayOutcome::ClientGone,
            Ok(Ok(stream)) => {
                phases.push(RelayPhase::Streaming);
                let opened = match session.opening_event() {
                    Some(opening) => emitter.send(opening).await,
                    None => Ok(()),
                };
                match opened {
                    Ok(()) => self.finish(&emitter, &mut session, stream).await,
                    Err(ClientGone) => RelayOutcome::ClientGone,
                }
            }
            Ok(Err(err)) if err.is_connect_failure() => {
                log::warn!(
                    "event=relay_fallback model={} fallback_model={} reason={}",
                    request.model,
                    self.options.fallback_model,
                    err
                );
                phases.push(RelayPhase::Fallback);
                used_fallback = true;
                session.disable_narration();
                self.fall_back(&emitter, &mut session, &request, &mut phases)
                    .await
            }
            Ok(Err(err)) => terminal_error(&emitter, err.to_string()).await,
        };
        phases.push(RelayPhase::Terminated);

        let report = RelayReport {
            outcome,
            token_count: session.token_count(),
            used_fallback,
            phases,
        };
        log::info!(
            "event=relay_finished model={} outcome={:?} tokens={} fallback={}",
            request.model,
            report.outcome,
            report.token_count,
            report.used_fallback
        );
        report
    }

    /// Opens the upstream stream unless the client leaves first.
    async fn open(
        &self,
        emitter: &Emitter,
        request: &ChatRequest,
    ) -> Result<Result<ByteStream, UpstreamError>, ClientGone> {
        tokio::select! {
            biased;
            _ = emitter.tx.closed() => Err(ClientGone),
            opened = self.upstream.open_stream(request) => Ok(opened),
        }
    }

    async fn fall_back(
        &self,
        emitter: &Emitter,
        session: &mut Session,
        request: &ChatRequest,
        phases: &mut Vec<RelayPhase>,
    ) -> RelayOutcome {
        if emitter
            .send(NormalizedEvent::error(FALLBACK_NOTICE))
            .await
            .is_err()
        {
            return RelayOutcome::ClientGone;
        }
        let fallback_request = request.with_model(self.options.fallback_model.clone());
        match self.open(emitter, &fallback_request).await {
            Err(ClientGone) => RelayOutcome::ClientGone,
            Ok(Ok(stream)) => {
                phases.push(RelayPhase::Streaming);
                self.finish(emitter, session, stream).await
            }
            Ok(Err(err)) => {
                log::warn!(
                    "event=relay_fallback_failed model={} reason={}",
                    fallback_request.model,
                    err
                );
                terminal_error(emitter, ALL_MODELS_UNAVAILABLE.to_string()).await
            }
        }
    }

    /// Pumps one upstream stream to completion and emits the terminal event.
    async fn finish(
        &self,
        emitter: &Emitter,
        session: &mut Session,
        stream: ByteStream,
    ) -> RelayOutcome {
        match self.pump(emitter, session, stream).await {
            PumpEnd::ClientGone => RelayOutcome::ClientGone,
            PumpEnd::Failed(err) => {
                log::warn!("event=relay_stream_failed reason={}", err);
                terminal_error(emitter, err.to_string()).await
            }
            PumpEnd::Finished => {
                let closing = vec![session.final_metrics(), session.done()];
                match emitter.send_all(closing).await {
                    Ok(()) => RelayOutcome::Completed,
                    Err(ClientGone) => RelayOutcome::ClientGone,
                }
            }
        }
    }

    async fn pump(
        &self,
        emitter: &Emitter,
        session: &mut Session,
        mut stream: ByteStream,
    ) -> PumpEnd {
        let mut decoder = LineDecoder::with_limit(self.options.max_line_bytes);
        loop {
            let next = tokio::select! {
                biased;
                _ = emitter.tx.closed() => return PumpEnd::ClientGone,
                next = next_chunk(&mut stream, self.options.idle_timeout) => next,
            };
            let exhausted = matches!(next, Ok(None));
            let lines = match next {
                Ok(Some(chunk)) => match decoder.push(&chunk) {
                    Ok(lines) => lines,
                    Err(err) => return PumpEnd::Failed(UpstreamError::Stream(err.to_string())),
                },
                Ok(None) => decoder.finish().into_iter().collect(),
                Err(err) => return PumpEnd::Failed(err),
            };
            for line in lines {
                match relay_line(emitter, session, &line).await {
                    Ok(LineEnd::Continue) => {}
                    Ok(LineEnd::Done) => return PumpEnd::Finished,
                    Err(ClientGone) => return PumpEnd::ClientGone,
                }
            }
            if exhausted {
                return PumpEnd::Finished;
            }
        }
    }
}

enum LineEnd {
    Continue,
    Done,
}

async fn relay_line(
    emitter: &Emitter,
    session: &mut Session,
    line: &str,
) -> Result<LineEnd, ClientGone> {
    let frame = match parse_line(line) {
        None => return Ok(LineEnd::Continue),
        Some(Ok(frame)) => frame,
        Some(Err(err)) => {
            log::debug!("event=frame_skipped payload={:?} err={}", err.payload, err);
            return Ok(LineEnd::Continue);
        }
    };
    let value = match frame {
        UpstreamFrame::Done => return Ok(LineEnd::Done),
        UpstreamFrame::Data(value) => value,
    };
    if let Some(delta) = chat_delta_content(&value) {
        emitter.send_all(session.ingest(delta)).await?;
    }
    Ok(LineEnd::Continue)
}

async fn next_chunk(
    stream: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<bytes::Bytes>, UpstreamError> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| {
                UpstreamError::Stream(format!(
                    "no data from upstream for {}ms",
                    limit.as_millis()
                ))
            })?,
        None => stream.next().await,
    };
    next.transpose()
}

async fn terminal_error(emitter: &Emitter, message: String) -> RelayOutcome {
    match emitter.send(NormalizedEvent::error(message.clone())).await {
        Ok(()) => RelayOutcome::Failed(message),
        Err(ClientGone) => RelayOutcome::ClientGone,
    }
}
