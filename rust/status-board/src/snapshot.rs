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

//! Wire types for `/api/services` and their normalization into records.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::{Error, Result};

/// Status reported by the backend for one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceStatus {
    Up,
    Down,
    Monitored,
    /// Any status the backend defines beyond the three known ones.
    Other(String),
}

impl ServiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Up => "UP",
            ServiceStatus::Down => "DOWN",
            ServiceStatus::Monitored => "MONITORED",
            ServiceStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for ServiceStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "UP" => ServiceStatus::Up,
            "DOWN" => ServiceStatus::Down,
            "MONITORED" => ServiceStatus::Monitored,
            _ => ServiceStatus::Other(raw),
        }
    }
}

impl From<&str> for ServiceStatus {
    fn from(raw: &str) -> Self {
        ServiceStatus::from(raw.to_string())
    }
}

impl From<ServiceStatus> for String {
    fn from(status: ServiceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /api/services`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesEnvelope {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Option<ServicesData>,
}

/// The `data` object of a services envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesData {
    #[serde(default, rename = "dashboardTitle")]
    pub dashboard_title: Option<String>,

    #[serde(default)]
    pub data: Option<ServiceMap>,
}

/// One service as the backend sends it. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub status: ServiceStatus,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    /// Persons in charge.
    #[serde(default)]
    pub pics: Option<Vec<String>>,

    /// Seconds between scheduled checks.
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub check_interval: i64,

    #[serde(default)]
    pub message_details: Option<String>,
}

/// Service map in document order.
///
/// Every entry is kept, including repeated names, so normalization can
/// reject them instead of letting a later entry overwrite an earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMap(pub Vec<(String, ServiceEntry)>);

impl ServiceMap {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceEntry)> {
        self.0.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

impl FromIterator<(String, ServiceEntry)> for ServiceMap {
    fn from_iter<I: IntoIterator<Item = (String, ServiceEntry)>>(iter: I) -> Self {
        ServiceMap(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for ServiceMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ServiceMapVisitor;

        impl<'de> Visitor<'de> for ServiceMapVisitor {
            type Value = ServiceMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of service name to service entry")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, entry)) = access.next_entry::<String, ServiceEntry>()? {
                    entries.push((name, entry));
                }
                Ok(ServiceMap(entries))
            }
        }

        deserializer.deserialize_map(ServiceMapVisitor)
    }
}

impl Serialize for ServiceMap {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Accepts integral or fractional JSON numbers (and `null`) as whole seconds.
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    match raw {
        None => Ok(0),
        Some(value) if value.is_finite() => Ok(value.round() as i64),
        Some(value) => Err(de::Error::custom(format!(
            "checkInterval must be finite, got {value}"
        ))),
    }
}

/// Display-ready representation of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRecord {
    pub name: String,
    pub status: ServiceStatus,
    pub kind: String,
    /// Backend tags followed by `kind` when non-empty; absent when the
    /// backend sent none.
    pub tags: Option<Vec<String>>,
    pub pics: Option<Vec<String>>,
    pub check_interval: i64,
    pub message_details: Option<String>,
    pub diagnostic: Diagnostic,
    /// Estimate of the most recent scheduled check: `now - check_interval`.
    ///
    /// Derived on the client from the interval alone. It is not a timestamp
    /// reported by the backend.
    pub latest_check_time: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }

    pub fn pics(&self) -> &[String] {
        self.pics.as_deref().unwrap_or_default()
    }
}

/// Normalized result of one successful poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub title: String,
    pub services: Vec<ServiceRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Turn a services envelope into records.
///
/// The envelope is only borrowed; every record owns fresh copies of its
/// fields, so normalizing the same envelope twice gives the same result.
/// Record order follows the document; display order is decided by
/// [`crate::ranking::rank_services`].
pub fn normalize(envelope: &ServicesEnvelope, now: DateTime<Utc>) -> Result<Board> {
    if envelope.success != Some(true) {
        return Err(Error::from_backend_message(envelope.message.as_deref()));
    }

    let data = envelope
        .data
        .as_ref()
        .ok_or_else(|| Error::MalformedSnapshot("missing data".to_string()))?;
    let services = data
        .data
        .as_ref()
        .ok_or_else(|| Error::MalformedSnapshot("missing data.data".to_string()))?;
    let title = data
        .dashboard_title
        .as_ref()
        .ok_or_else(|| Error::MalformedSnapshot("missing data.dashboardTitle".to_string()))?;

    let mut seen = HashSet::with_capacity(services.len());
    let mut records = Vec::with_capacity(services.len());
    for (name, entry) in services.iter() {
        if !seen.insert(name) {
            return Err(Error::MalformedSnapshot(format!(
                "duplicate service name '{name}'"
            )));
        }
        records.push(normalize_entry(name, entry, now));
    }

    Ok(Board {
        title: title.clone(),
        services: records,
        fetched_at: now,
    })
}

fn normalize_entry(name: &str, entry: &ServiceEntry, now: DateTime<Utc>) -> ServiceRecord {
    let tags = entry.tags.as_ref().map(|tags| {
        let mut augmented = Vec::with_capacity(tags.len() + 1);
        augmented.extend(tags.iter().cloned());
        if !entry.kind.is_empty() {
            augmented.push(entry.kind.clone());
        }
        augmented
    });

    ServiceRecord {
        name: name.to_string(),
        status: entry.status.clone(),
        kind: entry.kind.clone(),
        tags,
        pics: entry.pics.clone(),
        check_interval: entry.check_interval,
        message_details: entry.message_details.clone(),
        diagnostic: Diagnostic::for_kind(&entry.kind, entry.message_details.as_deref()),
        latest_check_time: estimate_latest_check(now, entry.check_interval),
    }
}

fn estimate_latest_check(now: DateTime<Utc>, check_interval: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(check_interval.max(0))
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn envelope(value: serde_json::Value) -> ServicesEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalizes_every_entry_in_document_order() {
        // Parsed from text: a `serde_json::Value` would sort the keys.
        let env: ServicesEnvelope = serde_json::from_str(
            r#"{"success": true, "data": {"dashboardTitle": "Ops", "data": {
                "zeta": {"status": "UP", "kind": "web", "checkInterval": 30},
                "alpha": {"status": "DOWN", "kind": "postgresql", "checkInterval": 60},
                "mid": {"status": "MONITORED", "kind": "redis", "checkInterval": 10}
            }}}"#,
        )
        .unwrap();

        let board = normalize(&env, now()).unwrap();
        assert_eq!(board.title, "Ops");
        let names: Vec<_> = board.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(board.services[1].status, ServiceStatus::Down);
    }

    #[test]
    fn appends_kind_to_a_copy_of_tags() {
        let env = envelope(json!({
            "success": true,
            "data": {
                "dashboardTitle": "Ops",
                "data": {
                    "api": {"status": "UP", "kind": "web", "tags": ["prod", "edge"], "checkInterval": 5}
                }
            }
        }));

        let first = normalize(&env, now()).unwrap();
        let second = normalize(&env, now()).unwrap();

        assert_eq!(
            first.services[0].tags,
            Some(vec!["prod".to_string(), "edge".to_string(), "web".to_string()])
        );
        assert_eq!(first, second);

        let (_, entry) = env.data.as_ref().unwrap().data.as_ref().unwrap().iter().next().unwrap();
        assert_eq!(
            entry.tags,
            Some(vec!["prod".to_string(), "edge".to_string()])
        );
    }

    #[test]
    fn absent_tags_stay_absent() {
        let env = envelope(json!({
            "success": true,
            "data": {"dashboardTitle": "Ops", "data": {"api": {"status": "UP", "kind": "web"}}}
        }));
        let board = normalize(&env, now()).unwrap();
        assert_eq!(board.services[0].tags, None);
        assert!(board.services[0].tags().is_empty());
    }

    #[test]
    fn missing_kind_adds_no_tag() {
        let env = envelope(json!({
            "success": true,
            "data": {"dashboardTitle": "Ops", "data": {"api": {"status": "UP", "tags": ["prod"]}}}
        }));
        let board = normalize(&env, now()).unwrap();
        assert_eq!(board.services[0].kind, "");
        assert_eq!(board.services[0].tags, Some(vec!["prod".to_string()]));
    }

    #[test]
    fn latest_check_time_subtracts_interval() {
        let env: ServicesEnvelope = serde_json::from_str(
            r#"{"success": true, "data": {"dashboardTitle": "Ops", "data": {
                "api": {"status": "UP", "kind": "web", "checkInterval": 90},
                "neg": {"status": "UP", "kind": "web", "checkInterval": -5},
                "frac": {"status": "UP", "kind": "web", "checkInterval": 1.6}
            }}}"#,
        )
        .unwrap();
        let board = normalize(&env, now()).unwrap();
        assert_eq!(
            board.services[0].latest_check_time,
            now() - TimeDelta::seconds(90)
        );
        assert_eq!(board.services[1].latest_check_time, now());
        assert_eq!(board.services[2].check_interval, 2);
    }

    #[test]
    fn ssl_kind_gets_structured_diagnostic() {
        let env = envelope(json!({
            "success": true,
            "data": {"dashboardTitle": "Ops", "data": {
                "certs": {
                    "status": "DOWN",
                    "kind": "sslstatus",
                    "messageDetails": "Danger|example.com|3d|cert expiring"
                }
            }}
        }));
        let board = normalize(&env, now()).unwrap();
        match &board.services[0].diagnostic {
            Diagnostic::Structured(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].severity, Severity::Danger);
            }
            other => panic!("expected structured diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_preserved() {
        let env = envelope(json!({
            "success": true,
            "data": {"dashboardTitle": "Ops", "data": {"x": {"status": "DEGRADED", "kind": "web"}}}
        }));
        let board = normalize(&env, now()).unwrap();
        assert_eq!(
            board.services[0].status,
            ServiceStatus::Other("DEGRADED".to_string())
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let raw = r#"{"success": true, "data": {"dashboardTitle": "Ops", "data": {
            "svc": {"status": "UP", "kind": "web"},
            "svc": {"status": "DOWN", "kind": "web"}
        }}}"#;
        let env: ServicesEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.data.as_ref().unwrap().data.as_ref().unwrap().len(), 2);

        let err = normalize(&env, now()).unwrap_err();
        assert!(matches!(err, Error::MalformedSnapshot(_)));
    }

    #[test]
    fn missing_envelope_fields_are_malformed() {
        let cases = [
            json!({"success": true}),
            json!({"success": true, "data": {"dashboardTitle": "Ops"}}),
            json!({"success": true, "data": {"data": {}}}),
        ];
        for case in cases {
            let err = normalize(&envelope(case.clone()), now()).unwrap_err();
            assert!(
                matches!(err, Error::MalformedSnapshot(_)),
                "expected malformed for {case}, got {err:?}"
            );
        }
    }

    #[test]
    fn unsuccessful_envelope_surfaces_backend_message() {
        let err = normalize(
            &envelope(json!({"success": false, "message": "no token provided", "data": {}})),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no token provided");

        let err = normalize(&envelope(json!({})), now()).unwrap_err();
        assert_eq!(err.to_string(), crate::error::DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn expired_token_is_classified() {
        let err = normalize(
            &envelope(json!({"success": false, "message": "error jwt: token expired or not active yet"})),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
    }
}
