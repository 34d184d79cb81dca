// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP delivery used when the local store cannot be used.
//!
//! Each envelope is POSTed as JSON to `<endpoint>/api/fallback`. Endpoints
//! are tried once, in order; the first 2xx wins. Nothing is retried later.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use pk_core::{Envelope, Fallback};

use crate::error::{Error, Result};

const FALLBACK_PATH: &str = "/api/fallback";

pub struct HttpFallback {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl HttpFallback {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(HttpFallback { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn url(endpoint: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), FALLBACK_PATH)
    }

    async fn post(&self, endpoint: &str, envelope: &Envelope) -> std::result::Result<(), String> {
        let response = self
            .client
            .post(Self::url(endpoint))
            .json(envelope)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("status {status}"))
        }
    }
}

impl Fallback for HttpFallback {
    fn deliver(
        &self,
        envelope: Envelope,
    ) -> Pin<Box<dyn Future<Output = pk_core::Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.endpoints.is_empty() {
                return Err(pk_core::Error::Fallback("no endpoints configured".into()));
            }
            for endpoint in &self.endpoints {
                match self.post(endpoint, &envelope).await {
                    Ok(()) => {
                        tracing::debug!(%endpoint, kind = %envelope.kind, "fallback delivered");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(%endpoint, kind = %envelope.kind, error = %e, "fallback endpoint failed");
                    }
                }
            }
            Err(pk_core::Error::Fallback(format!(
                "all {} endpoints failed",
                self.endpoints.len()
            )))
        })
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
