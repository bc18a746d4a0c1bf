//! Scenario markers
//!
//! Every scenario carries structured metadata the runner uses for selection:
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | [`Tag::Smoke`] | Minimal, fast, high-confidence regression signal |
//! | [`Tag::Slow`] | Boots servers or otherwise waits on the backend |
//! | [`Service::Network`] | Needs the networking service (security groups) |
//! | [`Service::Compute`] | Needs the compute service (servers) |

use serde::{Deserialize, Serialize};

/// Test attribute tag
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Smoke,
    Slow,
}

/// Backend service a scenario requires
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Network,
    Compute,
}

/// Parse a comma-separated service list (e.g. "network,compute")
pub fn parse_services(s: &str) -> Result<Vec<Service>, strum::ParseError> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip_strings() {
        assert_eq!("smoke".parse::<Tag>().unwrap(), Tag::Smoke);
        assert_eq!("SMOKE".parse::<Tag>().unwrap(), Tag::Smoke);
        assert_eq!(Tag::Slow.to_string(), "slow");
    }

    #[test]
    fn test_parse_services() {
        assert_eq!(
            parse_services("network, compute").unwrap(),
            vec![Service::Network, Service::Compute]
        );
        assert!(parse_services("").unwrap().is_empty());
        assert!(parse_services("network,storage").is_err());
    }
}
