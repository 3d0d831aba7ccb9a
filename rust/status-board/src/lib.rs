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

//! Status board client for a monitoring backend.
//!
//! Polls `/api/services` on a fixed period and turns each snapshot into a
//! stable, searchable view:
//!
//! - [`session`]: credential storage and the session context shared with the poller
//! - [`api`]: HTTP access to `/api/services` and `/api/login`
//! - [`snapshot`]: wire types and normalization into [`ServiceRecord`]s
//! - [`diagnostic`]: parser for certificate-expiry reports
//! - [`ranking`]: status ordering and the search/tag filter
//! - [`poller`]: the fetch loop and its [`ViewState`]
//! - [`view`]: render-time cards and labels
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use status_board::{
//!     render_board, BoardQuery, HttpStatusApi, PollerConfig, PollingController, SessionStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(HttpStatusApi::new("http://127.0.0.1:9115", Duration::from_secs(10))?);
//!     let session = SessionStore::in_memory();
//!     session.login(api.as_ref(), "admin", "secret").await?;
//!
//!     let mut poller = PollingController::new(api, session, PollerConfig::default()).spawn();
//!     let query = BoardQuery::new("db", "");
//!     while let Some(state) = poller.changed().await {
//!         println!("{:?}", render_board(&state, &query));
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod poller;
pub mod ranking;
pub mod session;
pub mod snapshot;
pub mod telemetry;
pub mod view;

pub use api::{HttpStatusApi, StatusApi};
pub use diagnostic::{parse_rows, Diagnostic, DiagnosticRow, DiagnosticRows, Severity};
pub use error::{Error, Result};
pub use poller::{PollerConfig, PollerExit, PollerHandle, PollingController, ViewState};
pub use ranking::{rank_services, BoardQuery};
pub use session::{
    CredentialStorage, FileCredentialStorage, MemoryCredentialStorage, SessionCredential,
    SessionStore, SignOutReason,
};
pub use snapshot::{normalize, Board, ServiceEntry, ServiceRecord, ServiceStatus, ServicesEnvelope};
pub use view::{render_board, BoardView, ServiceCard, Tone};

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::BoardConfig;

/// Runs the headless watcher using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = BoardConfig::from_env()?;

    let api = Arc::new(
        HttpStatusApi::new(&config.api_url, config.request_timeout)
            .context("failed to build HTTP client")?,
    );
    let storage = Arc::new(FileCredentialStorage::new(&config.session_path));
    let session = SessionStore::open(storage).context("failed to open session store")?;

    if !session.is_authenticated() {
        let Some(login) = config.login.as_ref() else {
            anyhow::bail!(
                "no stored session at {} and STATUS_BOARD_USERNAME/STATUS_BOARD_PASSWORD are not set",
                config.session_path.display()
            );
        };
        session
            .login(api.as_ref(), &login.username, &login.password)
            .await
            .context("login failed")?;
    }

    info!(api = %api.base_url(), "starting status board watcher");
    let mut poller = PollingController::new(api, session.clone(), config.poller()).spawn();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                poller.stop().await;
                return Ok(());
            }
            state = poller.changed() => match state {
                Some(state) => log_board(&render_board(&state, &config.initial_query)),
                None => break,
            },
        }
    }

    if poller.join().await == PollerExit::SessionEnded {
        match session.last_sign_out() {
            Some(SignOutReason::Expired) => warn!("session expired; log in again"),
            _ => info!("signed out"),
        }
    }
    Ok(())
}

fn log_board(view: &BoardView) {
    match view {
        BoardView::Loading => info!("loading services"),
        BoardView::Error { message } => warn!(%message, "status board error"),
        BoardView::Ready {
            title,
            total,
            cards,
        } => {
            let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
            for card in cards {
                *by_status.entry(card.status_label.as_str()).or_default() += 1;
            }
            info!(%title, total, visible = cards.len(), ?by_status, "board updated");
            for card in cards {
                info!(
                    service = %card.name,
                    status = %card.status_label,
                    last_checked = %card.last_checked,
                    "service"
                );
            }
        }
    }
}
