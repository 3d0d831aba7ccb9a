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

//! Error types for the status board client.

use thiserror::Error;

/// Result type for status board operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when the backend reports failure without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to retrieve services";

/// Errors that can occur while talking to the backend or managing the session.
#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not be reached or its answer could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered `success: false`.
    #[error("{message}")]
    BackendFailure { message: String },

    /// The backend rejected the token as expired.
    #[error("session expired")]
    SessionExpired,

    /// The envelope claimed success but required fields were missing.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// No credential is stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Login endpoint answered with a non-200 status.
    #[error("login rejected ({status}): {message}")]
    LoginRejected { status: u16, message: String },

    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credential storage I/O failed.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Classify a `success: false` body.
    ///
    /// Expiry is detected by substring, the same way the backend's JWT
    /// middleware phrases it ("token expired or not active yet").
    pub fn from_backend_message(message: Option<&str>) -> Self {
        match message {
            Some(msg) if msg.contains("token expired") => Error::SessionExpired,
            Some(msg) if !msg.is_empty() => Error::BackendFailure {
                message: msg.to_string(),
            },
            _ => Error::BackendFailure {
                message: DEFAULT_FAILURE_MESSAGE.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
