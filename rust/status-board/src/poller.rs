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

//! Fixed-period polling of `/api/services`.
//!
//! The controller fetches once on start and then on every tick of a
//! wall-clock interval. Each fetch runs as its own task tagged with a
//! sequence number, so a slow response can overlap the next tick; results
//! older than the last applied one are dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::StatusApi;
use crate::error::{Error, Result};
use crate::session::SessionStore;
use crate::snapshot::{normalize, Board, ServiceRecord};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    /// No fetch has completed yet.
    Loading,
    /// Records in snapshot order; rank and filter are applied at render time.
    Ready {
        title: String,
        services: Vec<ServiceRecord>,
    },
    Error {
        message: String,
    },
}

impl From<Board> for ViewState {
    fn from(board: Board) -> Self {
        ViewState::Ready {
            title: board.title,
            services: board.services,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why a controller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// [`PollerHandle::stop`] was called or the handle was dropped.
    Stopped,
    /// The session was cleared, by logout or by an expired token.
    SessionEnded,
}

pub struct PollingController {
    api: Arc<dyn StatusApi>,
    session: SessionStore,
    config: PollerConfig,
}

impl PollingController {
    pub fn new(api: Arc<dyn StatusApi>, session: SessionStore, config: PollerConfig) -> Self {
        Self {
            api,
            session,
            config,
        }
    }

    /// Start polling on the current tokio runtime.
    pub fn spawn(self) -> PollerHandle {
        let (view_tx, view_rx) = watch::channel(ViewState::Loading);
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(view_tx, stop_rx));

        PollerHandle {
            view: view_rx,
            stop: Some(stop_tx),
            join,
        }
    }

    async fn run(
        self,
        view: watch::Sender<ViewState>,
        mut stop: oneshot::Receiver<()>,
    ) -> PollerExit {
        let mut session = self.session.subscribe();
        if session.borrow_and_update().is_none() {
            info!("no session; poller not started");
            return PollerExit::SessionEnded;
        }

        let period = self.config.interval.max(MIN_POLL_INTERVAL);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: JoinSet<(u64, Result<Board>)> = JoinSet::new();
        let mut issued: u64 = 0;
        let mut applied: u64 = 0;

        info!(interval_ms = period.as_millis() as u64, "poller started");

        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!(in_flight = in_flight.len(), "poller stopped");
                    return PollerExit::Stopped;
                }

                changed = session.changed() => {
                    if changed.is_err() || session.borrow_and_update().is_none() {
                        info!("session ended; poller stopping");
                        return PollerExit::SessionEnded;
                    }
                    // Results still in flight belong to the previous credential.
                    applied = issued;
                    debug!(discarded = in_flight.len(), "session credential changed");
                }

                _ = ticker.tick() => {
                    let Some(credential) = session.borrow().clone() else {
                        return PollerExit::SessionEnded;
                    };
                    issued += 1;
                    let seq = issued;
                    let api = Arc::clone(&self.api);
                    in_flight.spawn(async move {
                        let result = match api.fetch_services(&credential.token).await {
                            Ok(envelope) => normalize(&envelope, Utc::now()),
                            Err(err) => Err(err),
                        };
                        (seq, result)
                    });
                }

                Some(joined) = in_flight.join_next() => {
                    let (seq, result) = match joined {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(error = %err, "fetch task failed");
                            continue;
                        }
                    };

                    if seq <= applied {
                        debug!(seq, applied, "discarding stale response");
                        continue;
                    }
                    applied = seq;

                    match result {
                        Ok(board) => {
                            debug!(seq, services = board.services.len(), "snapshot applied");
                            view.send_replace(ViewState::from(board));
                        }
                        Err(Error::SessionExpired) => {
                            info!(seq, "token expired; signing out");
                            if let Err(err) = self.session.expire() {
                                warn!(error = %err, "failed to clear stored session");
                            }
                            return PollerExit::SessionEnded;
                        }
                        Err(err) => {
                            warn!(seq, error = %err, "poll failed");
                            view.send_replace(ViewState::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Handle to a running controller.
///
/// Dropping the handle stops the controller as well.
pub struct PollerHandle {
    view: watch::Receiver<ViewState>,
    stop: Option<oneshot::Sender<()>>,
    join: JoinHandle<PollerExit>,
}

impl PollerHandle {
    /// A receiver following every published state.
    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    pub fn current(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Wait for the next published state. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<ViewState> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the timer and wait for the controller to exit.
    ///
    /// Fetches still in flight are dropped; their results are never applied.
    pub async fn stop(mut self) -> PollerExit {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.join().await
    }

    /// Wait for the controller to exit on its own.
    pub async fn join(self) -> PollerExit {
        let PollerHandle { stop: _stop, join, .. } = self;
        match join.await {
            Ok(exit) => exit,
            Err(err) => {
                error!(error = %err, "poller task terminated abnormally");
                PollerExit::Stopped
            }
        }
    }
}
