// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Event addresses and pattern matching.
//!
//! Every guarded operation is identified by a four-segment address,
//! `domain:component:action:timing`. Hooks are bound to patterns of the same
//! shape in which any segment may be the literal `*`.

use crate::error::{HookError, HookResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of segments in an event address.
pub const SEGMENT_COUNT: usize = 4;

/// Wildcard segment.
pub const WILDCARD: &str = "*";

/// When a hook runs relative to the guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookTiming {
    Before,
    After,
    OnError,
    Around,
}

impl HookTiming {
    pub const ALL: [HookTiming; 4] = [
        HookTiming::Before,
        HookTiming::After,
        HookTiming::OnError,
        HookTiming::Around,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookTiming::Before => "before",
            HookTiming::After => "after",
            HookTiming::OnError => "onerror",
            HookTiming::Around => "around",
        }
    }
}

impl fmt::Display for HookTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookTiming {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookTiming::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HookError::UnknownTiming(s.to_string()))
    }
}

/// A concrete, validated event address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventAddress {
    domain: String,
    component: String,
    action: String,
    timing: HookTiming,
}

impl EventAddress {
    pub fn new(
        domain: impl Into<String>,
        component: impl Into<String>,
        action: impl Into<String>,
        timing: HookTiming,
    ) -> HookResult<Self> {
        Self::parse(&format!(
            "{}:{}:{}:{}",
            domain.into(),
            component.into(),
            action.into(),
            timing
        ))
    }

    pub fn parse(input: &str) -> HookResult<Self> {
        let invalid = |reason: String| HookError::InvalidEventAddress {
            input: input.to_string(),
            reason,
        };

        let segments: Vec<&str> = input.split(':').collect();
        if segments.len() != SEGMENT_COUNT {
            return Err(invalid(format!(
                "found {} segments, expected {}",
                segments.len(),
                SEGMENT_COUNT
            )));
        }
        if let Some(pos) = segments.iter().position(|s| s.trim().is_empty()) {
            return Err(invalid(format!("segment {} is empty", pos + 1)));
        }

        let timing = segments[3].parse::<HookTiming>()?;

        Ok(Self {
            domain: segments[0].to_string(),
            component: segments[1].to_string(),
            action: segments[2].to_string(),
            timing,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn timing(&self) -> HookTiming {
        self.timing
    }
}

impl fmt::Display for EventAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.domain, self.component, self.action, self.timing
        )
    }
}

impl FromStr for EventAddress {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Pattern a hook is bound to. Not validated on construction: a pattern with
/// the wrong number of segments simply never matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPattern(String);

impl EventPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Pattern matching every address.
    pub fn any() -> Self {
        Self("*:*:*:*".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segment_count(&self) -> usize {
        self.0.split(':').count()
    }

    /// The timing segment when it names a concrete timing.
    pub fn timing(&self) -> Option<HookTiming> {
        if self.segment_count() != SEGMENT_COUNT {
            return None;
        }
        self.0.rsplit(':').next().and_then(|t| t.parse().ok())
    }

    pub fn matches(&self, address: &EventAddress) -> bool {
        matches(&address.to_string(), &self.0)
    }

    pub fn matches_str(&self, address: &str) -> bool {
        matches(address, &self.0)
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventPattern {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Segment-wise match of `address` against `filter`.
///
/// Segment counts must be equal. A filter segment of exactly `*` matches any
/// value; every other segment compares case-insensitively, non-ASCII
/// letters included. Partial wildcards such as `ag*` are literals.
pub fn matches(address: &str, filter: &str) -> bool {
    if address.split(':').count() != filter.split(':').count() {
        return false;
    }

    address
        .split(':')
        .zip(filter.split(':'))
        .all(|(a, f)| f == WILDCARD || a == f || a.to_lowercase() == f.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_address() {
        let addr: EventAddress = "agent:test:action:before".parse().unwrap();
        assert_eq!(addr.domain(), "agent");
        assert_eq!(addr.component(), "test");
        assert_eq!(addr.action(), "action");
        assert_eq!(addr.timing(), HookTiming::Before);
        assert_eq!(addr.to_string(), "agent:test:action:before");
    }

    #[test]
    fn test_parse_timing_case_insensitive() {
        let addr: EventAddress = "plugin:fs:read:OnError".parse().unwrap();
        assert_eq!(addr.timing(), HookTiming::OnError);
        assert_eq!("AROUND".parse::<HookTiming>().unwrap(), HookTiming::Around);
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        let err = "agent:test:before".parse::<EventAddress>().unwrap_err();
        assert!(matches!(err, HookError::InvalidEventAddress { .. }));
        assert!(err.to_string().contains("domain:component:action:timing"));

        assert!("a:b:c:d:before".parse::<EventAddress>().is_err());
        assert!("a::c:before".parse::<EventAddress>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_timing() {
        let err = "agent:test:action:during".parse::<EventAddress>().unwrap_err();
        assert!(matches!(err, HookError::UnknownTiming(ref t) if t == "during"));
    }

    #[test]
    fn test_wildcard_matching() {
        assert!(matches("agent:test:action:before", "agent:*:*:before"));
        assert!(matches("AGENT:Test:action:before", "agent:test:ACTION:*"));
        assert!(matches("agent:test:action:before", "*:*:*:*"));
        assert!(!matches("plugin:test:action:before", "agent:*:*:before"));
        assert!(!matches("agent:test:action:after", "agent:*:*:before"));
    }

    #[test]
    fn test_non_ascii_segments_match_case_insensitively() {
        assert!(matches("workflow:ÉTAPE:Überprüfung:before", "workflow:étape:überprüfung:*"));
        assert!(!matches("workflow:étape:prüfung:before", "workflow:etape:*:*"));
    }

    #[test]
    fn test_segment_count_mismatch_never_matches() {
        assert!(!matches("agent:test:action:before", "*"));
        assert!(!matches("agent:test:action:before", "*:*:*"));
        assert!(!matches("agent:test:action:before", "*:*:*:*:*"));
    }

    #[test]
    fn test_partial_wildcard_is_literal() {
        assert!(!matches("agent:test:action:before", "ag*:*:*:*"));
        assert!(matches("ag*:test:action:before", "ag*:*:*:*"));
    }

    #[test]
    fn test_pattern_timing() {
        assert_eq!(
            EventPattern::from("agent:*:*:after").timing(),
            Some(HookTiming::After)
        );
        assert_eq!(EventPattern::from("agent:*:*:*").timing(), None);
        assert_eq!(EventPattern::from("agent:after").timing(), None);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z]{1,6}"
    }

    proptest! {
        #[test]
        fn prop_match_iff_every_literal_segment_equal(
            address in proptest::collection::vec(segment(), 4),
            filter in proptest::collection::vec(
                prop_oneof![Just("*".to_string()), segment()],
                4,
            ),
        ) {
            let expected = address
                .iter()
                .zip(filter.iter())
                .all(|(a, f)| f == "*" || a.to_lowercase() == f.to_lowercase());
            prop_assert_eq!(matches(&address.join(":"), &filter.join(":")), expected);
        }

        #[test]
        fn prop_unequal_segment_counts_never_match(
            address in proptest::collection::vec(segment(), 1..6),
            filter in proptest::collection::vec(Just("*".to_string()), 1..6),
        ) {
            prop_assume!(address.len() != filter.len());
            prop_assert!(!matches(&address.join(":"), &filter.join(":")));
        }

        #[test]
        fn prop_address_matches_itself_in_any_case(
            address in proptest::collection::vec(segment(), 4),
        ) {
            let joined = address.join(":");
            prop_assert!(matches(&joined, &joined.to_uppercase()));
        }
    }
}
