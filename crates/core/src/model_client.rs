use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use terminal_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, TokenUsage,
    ToolCallRequest,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// Something that turns a request into one complete model response.
///
/// The agent loop only depends on this trait, so tests can drive it with a
/// scripted client instead of a live model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `req` and waits for the whole response.
    async fn complete(&self, req: ModelRequest) -> SendRequestResult;
}

/// How long [`ModelClient`] keeps retrying rate-limited requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound for a single delay.
    pub max_interval: Duration,
    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Duration::from_secs(120),
        }
    }
}

/// A type-erased wrapper around a model provider.
///
/// Responses are collected into a [`ModelClientResponse`]. Requests failing
/// with a transient error kind are retried with exponential backoff; any
/// other error is returned right away.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    /// Wraps `provider` with the default retry policy.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self::with_retry_policy(provider, RetryPolicy::default())
    }

    /// Wraps `provider` with a custom retry policy.
    pub fn with_retry_policy<P: ModelProvider + 'static>(
        provider: P,
        policy: RetryPolicy,
    ) -> Self {
        // `P` is erased here so that `ModelClient` stays non-generic.
        let provider = Arc::new(provider);
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let provider = Arc::clone(&provider);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let backoff = ExponentialBackoffBuilder::new()
                        .with_initial_interval(policy.initial_interval)
                        .with_max_interval(policy.max_interval)
                        .with_max_elapsed_time(Some(policy.max_elapsed_time))
                        .build();
                    backoff::future::retry(backoff, || {
                        let fut = provider.send_request(&req);
                        async move {
                            handle_response::<P>(fut.await).await.map_err(
                                |err| {
                                    if err.kind().is_transient() {
                                        warn!("retrying model request: {err}");
                                        backoff::Error::transient(err)
                                    } else {
                                        backoff::Error::permanent(err)
                                    }
                                },
                            )
                        }
                    })
                    .await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

#[async_trait]
impl CompletionClient for ModelClient {
    async fn complete(&self, req: ModelRequest) -> SendRequestResult {
        self.send_request(req).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// The concatenated text deltas.
    pub transcript: String,
    /// The provider's native message, for replaying this turn.
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
    /// Token usage, if the provider reported it.
    pub usage: Option<TokenUsage>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;
    let mut usage = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            // The request has been handled gracefully without errors,
            // now try getting the opaque message for this response.
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
            ModelResponseEvent::Usage(u) => {
                usage = Some(u);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        finish_reason,
        usage,
    })
}
