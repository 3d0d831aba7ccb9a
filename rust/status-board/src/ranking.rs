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

//! Display ordering and search filtering for service records.

use serde::{Deserialize, Serialize};

use crate::snapshot::{ServiceRecord, ServiceStatus};

/// Rank used for any status outside DOWN, MONITORED and UP.
const UNMAPPED_RANK: u8 = 3;

impl ServiceStatus {
    /// Sort key: DOWN first, then MONITORED, then UP, then everything else.
    pub fn rank(&self) -> u8 {
        match self {
            ServiceStatus::Down => 0,
            ServiceStatus::Monitored => 1,
            ServiceStatus::Up => 2,
            ServiceStatus::Other(_) => UNMAPPED_RANK,
        }
    }
}

/// Order records by status rank. Records sharing a rank keep their
/// relative input order.
pub fn rank_services(services: &mut [ServiceRecord]) {
    services.sort_by_key(|service| service.status.rank());
}

/// Search box text plus the single selected tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardQuery {
    pub search_term: String,
    /// Empty means no tag filter.
    pub selected_tag: String,
}

impl BoardQuery {
    pub fn new(search_term: impl Into<String>, selected_tag: impl Into<String>) -> Self {
        Self {
            search_term: search_term.into(),
            selected_tag: selected_tag.into(),
        }
    }

    /// Select `tag`, or clear the selection if it is already selected.
    pub fn toggle_tag(&mut self, tag: &str) {
        if self.selected_tag == tag {
            self.selected_tag.clear();
        } else {
            self.selected_tag = tag.to_string();
        }
    }

    pub fn is_tag_selected(&self, tag: &str) -> bool {
        !self.selected_tag.is_empty() && self.selected_tag == tag
    }

    /// Whether a record passes both the tag filter and the text search.
    pub fn matches(&self, service: &ServiceRecord) -> bool {
        self.matches_tag(service) && self.matches_search(service)
    }

    /// Exact, case-sensitive membership of the selected tag.
    fn matches_tag(&self, service: &ServiceRecord) -> bool {
        self.selected_tag.is_empty() || service.tags().iter().any(|tag| *tag == self.selected_tag)
    }

    /// Case-insensitive substring of the name, any tag, or any PIC.
    fn matches_search(&self, service: &ServiceRecord) -> bool {
        if self.search_term.is_empty() {
            return true;
        }
        let needle = self.search_term.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

        contains(service.name.as_str())
            || service.tags().iter().any(|tag| contains(tag.as_str()))
            || service.pics().iter().any(|pic| contains(pic.as_str()))
    }

    /// Records passing the filter, in their given order.
    pub fn apply<'a>(&self, services: &'a [ServiceRecord]) -> Vec<&'a ServiceRecord> {
        services.iter().filter(|service| self.matches(service)).collect()
    }
}
