/*
 * Copyright 2025 Carver Automation Corporation.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! HTTP access to the monitoring backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::SessionCredential;
use crate::snapshot::ServicesEnvelope;

/// Backend operations the status board depends on.
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// `GET /api/services` with `token` as the `Authorization` header.
    ///
    /// Returns the decoded envelope whatever its `success` flag says;
    /// interpreting it is left to [`crate::snapshot::normalize`].
    async fn fetch_services(&self, token: &str) -> Result<ServicesEnvelope>;

    /// `POST /api/login`.
    async fn login(&self, username: &str, password: &str) -> Result<SessionCredential>;
}

/// Request body for login.
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Response body from login.
#[derive(Debug, Default, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    username: String,
    #[serde(default)]
    jwt_string: String,
}

/// `reqwest`-backed [`StatusApi`].
#[derive(Debug, Clone)]
pub struct HttpStatusApi {
    client: Client,
    base_url: String,
}

impl HttpStatusApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: ensure_scheme(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl StatusApi for HttpStatusApi {
    async fn fetch_services(&self, token: &str) -> Result<ServicesEnvelope> {
        let url = self.url("/api/services");
        tracing::debug!(url = %url, "fetching services");

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        // Auth failures arrive as 401 with a regular envelope body, so the
        // body is decoded regardless of status.
        let status = response.status();
        let body = response.bytes().await?;
        decode_envelope(status, &body)
    }

    async fn login(&self, username: &str, password: &str) -> Result<SessionCredential> {
        let url = self.url("/api/login");
        tracing::debug!(url = %url, username, "logging in");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        decode_login(status, &body)
    }
}

fn decode_envelope(status: StatusCode, body: &[u8]) -> Result<ServicesEnvelope> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::Transport(format!("invalid response body (HTTP {status}): {e}")))?;
    serde_json::from_value(value).map_err(|e| Error::MalformedSnapshot(e.to_string()))
}

fn decode_login(status: StatusCode, body: &[u8]) -> Result<SessionCredential> {
    if status != StatusCode::OK {
        let message = serde_json::from_slice::<LoginResponse>(body)
            .ok()
            .and_then(|resp| resp.message)
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("login failed").to_string());
        return Err(Error::LoginRejected {
            status: status.as_u16(),
            message,
        });
    }

    let response: LoginResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Transport(format!("invalid login response: {e}")))?;
    let data = response
        .data
        .ok_or_else(|| Error::Transport("login response missing data".to_string()))?;
    if data.username.is_empty() || data.jwt_string.is_empty() {
        return Err(Error::Transport(
            "login response missing username or token".to_string(),
        ));
    }

    Ok(SessionCredential::new(data.username, data.jwt_string))
}

/// Ensure the URL has a scheme (http:// or https://).
fn ensure_scheme(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Transport("backend URL is empty".to_string()));
    }
    if host.starts_with("http://") || host.starts_with("https://") {
        return Ok(host.to_string());
    }
    Ok(format!("http://{}", host))
}
