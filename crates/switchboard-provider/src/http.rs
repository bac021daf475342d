//! HTTP and SSE plumbing shared by the adapters.

use crate::error::ProviderError;
use crate::retry::cancellable;
use eventsource_stream::Event as MessageEvent;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use reqwest_eventsource::{Error as SseError, Event, EventSource};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Backend-specific rate-limit signature: status plus raw error body.
pub type RateLimitCheck = fn(StatusCode, &str) -> bool;

/// The common case: HTTP 429.
pub fn is_http_429(status: StatusCode, _body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

/// Turn a failed response into the matching error kind.
pub async fn error_from_response(
    provider: &str,
    response: Response,
    rate_limited: RateLimitCheck,
) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    tracing::debug!(provider, status = %status, "backend returned an error");
    if rate_limited(status, &body) {
        ProviderError::RateLimited(format!("{provider} returned {status}: {body}"))
    } else {
        ProviderError::ApiError {
            status: status.as_u16(),
            message: body,
        }
    }
}

/// Send a non-streaming request and decode its JSON body.
pub async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
    rate_limited: RateLimitCheck,
    cancel: &CancellationToken,
) -> Result<T, ProviderError> {
    let response = cancellable(cancel, async {
        request.send().await.map_err(ProviderError::Http)
    })
    .await?;

    if !response.status().is_success() {
        return Err(error_from_response(provider, response, rate_limited).await);
    }

    let bytes = cancellable(cancel, async {
        response.bytes().await.map_err(ProviderError::Http)
    })
    .await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// An open server-sent-event stream for one request.
pub struct SseStream<'a> {
    provider: &'a str,
    source: EventSource,
    rate_limited: RateLimitCheck,
}

impl<'a> SseStream<'a> {
    /// Open the stream. The request is sent on the first [`SseStream::next`].
    pub fn open(
        provider: &'a str,
        request: RequestBuilder,
        rate_limited: RateLimitCheck,
    ) -> Result<Self, ProviderError> {
        let mut source = EventSource::new(request)
            .map_err(|e| ProviderError::StreamError(format!("cannot open event stream: {e}")))?;
        // Reconnection would silently replay the request; retries belong to
        // the rate-limit policy.
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));
        Ok(Self {
            provider,
            source,
            rate_limited,
        })
    }

    /// Next message event, or `None` once the server closes the stream.
    pub async fn next(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<MessageEvent>, ProviderError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.source.close();
                    return Err(ProviderError::Aborted);
                }
                event = self.source.next() => event,
            };

            match event {
                None | Some(Err(SseError::StreamEnded)) => return Ok(None),
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => return Ok(Some(message)),
                Some(Err(SseError::InvalidStatusCode(_, response))) => {
                    self.source.close();
                    return Err(
                        error_from_response(self.provider, response, self.rate_limited).await,
                    );
                }
                Some(Err(SseError::Transport(err))) => {
                    self.source.close();
                    return Err(ProviderError::Http(err));
                }
                Some(Err(err)) => {
                    self.source.close();
                    return Err(ProviderError::StreamError(err.to_string()));
                }
            }
        }
    }

    /// Stop reading; no further events are consumed.
    pub fn close(&mut self) {
        self.source.close();
    }
}
