//! Bounded out-of-band HTTP probes.
//!
//! A probe classifies only the status line; response bodies are never read.
//! `HEAD` goes first with redirect-following disabled; a 405 (or a call
//! that produced no status at all) forces a `GET` retry. Each method call
//! carries its own deadline, so a probe returns within twice the timeout
//! in the worst case.

use registry_model::ProbeMethod;
use reqwest::{Client, Method, redirect};
use std::time::Duration;
use std::{future::Future, pin::Pin};
use thiserror::Error;
use tracing::{debug, trace};

use crate::policy::ReachabilityPolicy;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outcome of probing one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub status: Option<u16>,
    pub method: Option<ProbeMethod>,
}

impl ProbeOutcome {
    fn unreachable() -> Self {
        Self {
            ok: false,
            status: None,
            method: None,
        }
    }
}

/// Something that can probe a URL. [`Prober`] is the HTTP implementation;
/// the scheduler's tests script one in-process.
pub trait UrlProber: Send + Sync {
    fn probe<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;
}

/// HTTP prober with a reused client and per-call deadline.
pub struct Prober {
    client: Client,
    timeout: Duration,
    policy: ReachabilityPolicy,
}

impl Prober {
    /// Builds a prober. Redirects are never followed; a 3xx status is a
    /// classification input, not a hop.
    ///
    /// # Errors
    /// Returns `ProbeError::Transport` if the HTTP client cannot be built.
    pub fn new(timeout_ms: u64, policy: ReachabilityPolicy) -> Result<Self, ProbeError> {
        let client = Client::builder().redirect(redirect::Policy::none()).build()?;
        Ok(Self {
            client,
            timeout: Duration::from_millis(timeout_ms),
            policy,
        })
    }

    async fn status_of(&self, method: Method, url: &str) -> Option<u16> {
        match self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => Some(resp.status().as_u16()),
            Err(e) => {
                trace!(%method, url, error = %e, "probe call produced no status");
                None
            }
        }
    }

    fn classify(&self, status: u16, method: ProbeMethod) -> ProbeOutcome {
        ProbeOutcome {
            ok: self.policy.classify(status),
            status: Some(status),
            method: Some(method),
        }
    }
}

/// Whether the `HEAD` result settles the probe or a `GET` retry is due:
/// no status at all, or a 405 method rejection, forces the retry.
fn head_needs_get(head_status: Option<u16>) -> bool {
    matches!(head_status, None | Some(405))
}

impl UrlProber for Prober {
    fn probe<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            let head_status = self.status_of(Method::HEAD, url).await;
            if !head_needs_get(head_status) {
                // head_needs_get guarantees a status here.
                let status = head_status.unwrap_or_default();
                let outcome = self.classify(status, ProbeMethod::Head);
                debug!(url, status, ok = outcome.ok, "probe classified via HEAD");
                return outcome;
            }

            if let Some(status) = self.status_of(Method::GET, url).await {
                let outcome = self.classify(status, ProbeMethod::Get);
                debug!(url, status, ok = outcome.ok, "probe classified via GET");
                return outcome;
            }

            // GET produced nothing; fall back to whatever HEAD saw (a 405).
            if let Some(status) = head_status {
                return self.classify(status, ProbeMethod::Head);
            }

            debug!(url, "probe produced no status");
            ProbeOutcome::unreachable()
        })
    }
}
