// Single-shot HTTP probe.
//
// The atomic unit every higher layer is built from: fire one request,
// race it against a timer, report what happened. No retries here --
// retry policy belongs to the caller that owns the retry budget.

use std::time::Duration;

use serde::Serialize;
use tracing::trace;

use crate::error::Error;

/// What a single probe observed.
///
/// Timeouts and network errors are values, not `Err`: during discovery
/// most probes are expected to find nothing, and callers treat both
/// silent outcomes identically as "no answer".
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// The address answered with an HTTP response (any status).
    Answered(ProbeReply),
    /// The timer expired before a response arrived.
    TimedOut,
    /// Connection-level failure (refused, unreachable, reset).
    NetworkError,
}

/// An HTTP response captured by a probe.
#[derive(Debug, Clone)]
pub struct ProbeReply {
    pub status: u16,
    pub body: String,
}

impl ProbeOutcome {
    /// The reply, if the address answered with a 2xx status.
    pub fn ok(&self) -> Option<&ProbeReply> {
        match self {
            Self::Answered(reply) if (200..300).contains(&reply.status) => Some(reply),
            _ => None,
        }
    }

    /// The reply, if the address answered at all.
    pub fn answered(&self) -> Option<&ProbeReply> {
        match self {
            Self::Answered(reply) => Some(reply),
            _ => None,
        }
    }

    /// `true` for both silent outcomes (timeout, network error).
    pub fn is_no_answer(&self) -> bool {
        matches!(self, Self::TimedOut | Self::NetworkError)
    }
}

/// Fire-and-timeout HTTP prober.
///
/// Wraps a shared `reqwest::Client` with no default timeout -- every call
/// carries its own deadline and is guaranteed to resolve within it.
/// Cheap to clone (the underlying client is reference-counted).
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe with a fresh HTTP client.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent("pondlink/0.1.0")
            .build()?;
        Ok(Self { http })
    }

    /// Build a probe around an existing client (shared connection pool).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Probe with GET.
    pub async fn get(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        self.dispatch(self.http.get(url), url, timeout).await
    }

    /// Probe with GET and percent-encoded query parameters.
    pub async fn get_with_query(
        &self,
        url: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> ProbeOutcome {
        self.dispatch(self.http.get(url).query(params), url, timeout)
            .await
    }

    /// Probe with a form-encoded POST.
    pub async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> ProbeOutcome {
        self.dispatch(self.http.post(url).form(params), url, timeout)
            .await
    }

    /// Probe with a JSON POST.
    pub async fn post_json(
        &self,
        url: &str,
        body: &(impl Serialize + Sync),
        timeout: Duration,
    ) -> ProbeOutcome {
        self.dispatch(self.http.post(url).json(body), url, timeout)
            .await
    }

    /// Race the request against the deadline and classify the result.
    ///
    /// The outer `tokio::time::timeout` guarantees the caller resumes on
    /// schedule even if the transport stalls somewhere reqwest's own
    /// per-request timeout does not cover (e.g. body streaming).
    async fn dispatch(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> ProbeOutcome {
        let send = builder.timeout(timeout).send();

        let resp = match tokio::time::timeout(timeout, send).await {
            Err(_) => {
                trace!(url, "probe timed out");
                return ProbeOutcome::TimedOut;
            }
            Ok(Err(e)) if e.is_timeout() => {
                trace!(url, "probe timed out");
                return ProbeOutcome::TimedOut;
            }
            Ok(Err(e)) => {
                trace!(url, error = %e, "probe network error");
                return ProbeOutcome::NetworkError;
            }
            Ok(Ok(resp)) => resp,
        };

        let status = resp.status().as_u16();
        match tokio::time::timeout(timeout, resp.text()).await {
            Ok(Ok(body)) => {
                trace!(url, status, "probe answered");
                ProbeOutcome::Answered(ProbeReply { status, body })
            }
            Ok(Err(_)) => ProbeOutcome::NetworkError,
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}
