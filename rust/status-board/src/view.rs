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

//! Render-time view model: ranked, filtered cards with display labels.
//!
//! Nothing here draws anything. A frontend turns [`BoardView`] into markup,
//! a terminal table, or log lines.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::diagnostic::{Diagnostic, DiagnosticRow, Severity};
use crate::poller::ViewState;
use crate::ranking::{rank_services, BoardQuery};
use crate::snapshot::{ServiceRecord, ServiceStatus};

const CHECK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Colour intent, left to the frontend to map onto a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Danger,
    Neutral,
}

impl ServiceStatus {
    /// Badge text: "OK", "Not OK", "Monitored", or the raw status.
    pub fn display_label(&self) -> &str {
        match self {
            ServiceStatus::Up => "OK",
            ServiceStatus::Down => "Not OK",
            ServiceStatus::Monitored => "Monitored",
            ServiceStatus::Other(raw) => raw,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            ServiceStatus::Up => Tone::Success,
            ServiceStatus::Down => Tone::Danger,
            _ => Tone::Warning,
        }
    }
}

impl Severity {
    pub fn tone(&self) -> Tone {
        match self {
            Severity::Danger => Tone::Danger,
            Severity::Warning => Tone::Warning,
            Severity::Info => Tone::Success,
            Severity::Unknown => Tone::Neutral,
        }
    }
}

/// Diagnostic section of a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticView {
    Table { rows: Vec<DiagnosticRowView> },
    /// Preformatted text, line breaks preserved, shown as a fault.
    Text { text: String, tone: Tone },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRowView {
    pub tone: Tone,
    pub label: String,
    pub domain: String,
    /// Empty when the report had no expiry column.
    pub remaining_time: String,
    pub detail: String,
}

impl From<&DiagnosticRow> for DiagnosticRowView {
    fn from(row: &DiagnosticRow) -> Self {
        Self {
            tone: row.severity.tone(),
            label: row.label.clone(),
            domain: row.domain.clone(),
            remaining_time: row.remaining_time.clone().unwrap_or_default(),
            detail: row.detail.clone(),
        }
    }
}

impl From<&Diagnostic> for DiagnosticView {
    fn from(diagnostic: &Diagnostic) -> Self {
        match diagnostic {
            _ if diagnostic.is_empty() => DiagnosticView::None,
            Diagnostic::Structured(rows) => DiagnosticView::Table {
                rows: rows.iter().map(DiagnosticRowView::from).collect(),
            },
            Diagnostic::FreeText(text) => DiagnosticView::Text {
                text: text.clone(),
                tone: Tone::Danger,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagChip {
    pub label: String,
    pub selected: bool,
}

/// One service as it appears on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCard {
    pub name: String,
    pub status_label: String,
    pub status_tone: Tone,
    pub diagnostic: DiagnosticView,
    /// "PICs: a, b" when the service has any person in charge.
    pub pics_line: Option<String>,
    /// Local time of the estimated last check.
    pub last_checked: String,
    pub tags: Vec<TagChip>,
}

impl ServiceCard {
    pub fn new(record: &ServiceRecord, query: &BoardQuery) -> Self {
        let pics_line = match record.pics() {
            [] => None,
            pics => Some(format!("PICs: {}", pics.join(", "))),
        };

        Self {
            name: record.name.clone(),
            status_label: record.status.display_label().to_string(),
            status_tone: record.status.tone(),
            diagnostic: DiagnosticView::from(&record.diagnostic),
            pics_line,
            last_checked: format_check_time(record.latest_check_time),
            tags: record
                .tags()
                .iter()
                .map(|tag| TagChip {
                    label: tag.clone(),
                    selected: query.is_tag_selected(tag),
                })
                .collect(),
        }
    }
}

/// Whole-board view for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BoardView {
    Loading,
    Error {
        message: String,
    },
    Ready {
        title: String,
        /// Services in the snapshot before filtering.
        total: usize,
        cards: Vec<ServiceCard>,
    },
}

/// Rank and filter the current state for display.
///
/// Runs on every render; the controller never reorders or filters.
pub fn render_board(state: &ViewState, query: &BoardQuery) -> BoardView {
    match state {
        ViewState::Loading => BoardView::Loading,
        ViewState::Error { message } => BoardView::Error {
            message: message.clone(),
        },
        ViewState::Ready { title, services } => {
            let mut ranked = services.clone();
            rank_services(&mut ranked);
            let cards = query
                .apply(&ranked)
                .into_iter()
                .map(|record| ServiceCard::new(record, query))
                .collect();

            BoardView::Ready {
                title: title.clone(),
                total: services.len(),
                cards,
            }
        }
    }
}

pub fn format_check_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(CHECK_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::SSL_STATUS_KIND;
    use pretty_assertions::assert_eq;

    fn record(name: &str, status: &str, kind: &str, details: Option<&str>) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            status: ServiceStatus::from(status),
            kind: kind.to_string(),
            tags: Some(vec!["prod".to_string(), kind.to_string()]),
            pics: Some(vec!["ann".to_string(), "bob".to_string()]),
            check_interval: 30,
            message_details: details.map(str::to_string),
            diagnostic: Diagnostic::for_kind(kind, details),
            latest_check_time: Utc::now(),
        }
    }

    #[test]
    fn status_labels_match_dashboard_wording() {
        assert_eq!(ServiceStatus::Up.display_label(), "OK");
        assert_eq!(ServiceStatus::Down.display_label(), "Not OK");
        assert_eq!(ServiceStatus::Monitored.display_label(), "Monitored");
        assert_eq!(ServiceStatus::from("PAUSED").display_label(), "PAUSED");
        assert_eq!(ServiceStatus::from("PAUSED").tone(), Tone::Warning);
    }

    #[test]
    fn render_ranks_then_filters() {
        let state = ViewState::Ready {
            title: "Ops".to_string(),
            services: vec![
                record("web-a", "UP", "web", None),
                record("db", "DOWN", "postgresql", Some("connection refused")),
                record("web-b", "MONITORED", "web", None),
            ],
        };

        let view = render_board(&state, &BoardQuery::new("", "web"));
        let BoardView::Ready { title, total, cards } = view else {
            panic!("expected ready view");
        };
        assert_eq!(title, "Ops");
        assert_eq!(total, 3);
        let names: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web-b", "web-a"]);
        assert!(cards[0].tags.iter().any(|chip| chip.label == "web" && chip.selected));
        assert!(cards[0].tags.iter().any(|chip| chip.label == "prod" && !chip.selected));
    }

    #[test]
    fn card_shows_pics_and_free_text_fault() {
        let card = ServiceCard::new(
            &record("db", "DOWN", "postgresql", Some("timeout\nretrying")),
            &BoardQuery::default(),
        );
        assert_eq!(card.pics_line.as_deref(), Some("PICs: ann, bob"));
        assert_eq!(card.status_tone, Tone::Danger);
        assert_eq!(
            card.diagnostic,
            DiagnosticView::Text {
                text: "timeout\nretrying".to_string(),
                tone: Tone::Danger
            }
        );
    }

    #[test]
    fn card_shows_certificate_table() {
        let card = ServiceCard::new(
            &record(
                "certs",
                "DOWN",
                SSL_STATUS_KIND,
                Some("Warning|a.com|12d|renew\nInfo|b.com|fine"),
            ),
            &BoardQuery::default(),
        );
        let DiagnosticView::Table { rows } = card.diagnostic else {
            panic!("expected table");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tone, Tone::Warning);
        assert_eq!(rows[0].remaining_time, "12d");
        assert_eq!(rows[1].tone, Tone::Success);
        assert_eq!(rows[1].remaining_time, "");
    }

    #[test]
    fn empty_diagnostic_renders_nothing() {
        let card = ServiceCard::new(&record("web", "UP", "web", None), &BoardQuery::default());
        assert_eq!(card.diagnostic, DiagnosticView::None);
    }

    #[test]
    fn loading_and_error_pass_through() {
        assert_eq!(
            render_board(&ViewState::Loading, &BoardQuery::default()),
            BoardView::Loading
        );
        assert_eq!(
            render_board(
                &ViewState::Error {
                    message: "boom".into()
                },
                &BoardQuery::default()
            ),
            BoardView::Error {
                message: "boom".into()
            }
        );
    }
}
