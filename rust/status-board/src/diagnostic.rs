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

//! Parser for the diagnostic text attached to each service.
//!
//! Certificate checks (`kind == "sslstatus"`) report one domain per line in
//! the form `<severity>|<domain>|<remaining>|<detail>` or, when no expiry
//! date is known, `<severity>|<domain>|<detail>`. Every other check kind
//! sends free text that is shown as-is.

use serde::Serialize;

/// Check kind whose details are pipe-delimited certificate rows.
pub const SSL_STATUS_KIND: &str = "sslstatus";

/// Coarse urgency of a diagnostic row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Danger,
    Unknown,
}

impl Severity {
    /// Classify a status label by case-insensitive substring.
    ///
    /// Checked in priority order: danger/critical, warning, info.
    pub fn classify(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("danger") || lower.contains("critical") {
            Severity::Danger
        } else if lower.contains("warning") {
            Severity::Warning
        } else if lower.contains("info") {
            Severity::Info
        } else {
            Severity::Unknown
        }
    }
}

/// One parsed line of a certificate report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRow {
    pub severity: Severity,
    /// Status label as written by the backend.
    pub label: String,
    pub domain: String,
    pub remaining_time: Option<String>,
    pub detail: String,
}

/// Lazy iterator over the rows of a certificate report.
///
/// Cloning restarts from the same position; nothing is retained between
/// calls to [`parse_rows`].
#[derive(Debug, Clone)]
pub struct DiagnosticRows<'a> {
    lines: std::str::Split<'a, char>,
}

/// Parse a certificate report into rows, skipping lines that do not have
/// three or more `|`-separated parts.
pub fn parse_rows(details: &str) -> DiagnosticRows<'_> {
    DiagnosticRows {
        lines: details.split('\n'),
    }
}

impl Iterator for DiagnosticRows<'_> {
    type Item = DiagnosticRow;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if let Some(row) = parse_line(line) {
                return Some(row);
            }
            tracing::trace!(line, "skipping unparseable diagnostic line");
        }
        None
    }
}

fn parse_line(line: &str) -> Option<DiagnosticRow> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();

    let (label, domain, remaining, detail) = match parts.as_slice() {
        [label, domain, remaining, detail, ..] => (*label, *domain, Some(*remaining), *detail),
        [label, domain, detail] => (*label, *domain, None, *detail),
        _ => return None,
    };

    Some(DiagnosticRow {
        severity: Severity::classify(label),
        label: label.to_string(),
        domain: domain.to_string(),
        remaining_time: remaining.map(str::to_string),
        detail: detail.to_string(),
    })
}

/// Diagnostic payload of a service, resolved once per snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Rows extracted from a certificate report.
    Structured(Vec<DiagnosticRow>),
    /// Opaque multi-line text, displayed preformatted.
    FreeText(String),
}

impl Diagnostic {
    /// Pick the representation for a check kind.
    pub fn for_kind(kind: &str, details: Option<&str>) -> Self {
        let details = details.unwrap_or_default();
        if kind == SSL_STATUS_KIND {
            Diagnostic::Structured(parse_rows(details).collect())
        } else {
            Diagnostic::FreeText(details.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Diagnostic::Structured(rows) => rows.is_empty(),
            Diagnostic::FreeText(text) => text.is_empty(),
        }
    }
}
