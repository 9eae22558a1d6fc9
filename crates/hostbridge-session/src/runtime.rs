use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Host client types that shipped with the first generation of hosts.
pub const V1_HOST_CLIENT_TYPES: &[&str] = &[
    "desktop",
    "web",
    "android",
    "ios",
    "rigel",
    "surfaceHub",
    "teamsRoomsWindows",
    "teamsRoomsAndroid",
    "teamsPhones",
    "teamsDisplays",
];

/// Capability map negotiated with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Zero when the host sent a runtime without a version.
    #[serde(default)]
    pub api_version: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_legacy_teams: bool,
    #[serde(default)]
    pub supports: Map<String, Value>,
    /// Fields this library does not interpret, kept as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeConfig {
    /// Whether the host advertises a top-level capability.
    pub fn supports(&self, capability: &str) -> bool {
        self.supports.contains_key(capability)
    }
}

struct CapabilityGate {
    min_version: &'static str,
    capability: &'static str,
    client_types: &'static [&'static str],
}

const JOINED_TEAMS_CLIENTS: &[&str] = &[
    "android",
    "desktop",
    "ios",
    "teamsRoomsAndroid",
    "teamsPhones",
    "teamsDisplays",
    "web",
];

const CAPABILITY_GATES: &[CapabilityGate] = &[
    CapabilityGate {
        min_version: "1.9.0",
        capability: "location",
        client_types: V1_HOST_CLIENT_TYPES,
    },
    CapabilityGate {
        min_version: "2.0.0",
        capability: "people",
        client_types: V1_HOST_CLIENT_TYPES,
    },
    CapabilityGate {
        min_version: "2.0.1",
        capability: "teams",
        client_types: JOINED_TEAMS_CLIENTS,
    },
    CapabilityGate {
        min_version: "2.0.1",
        capability: "webStorage",
        client_types: &["desktop"],
    },
    CapabilityGate {
        min_version: "2.0.5",
        capability: "webStorage",
        client_types: &["android", "desktop", "ios"],
    },
];

fn gated_capability(name: &str) -> Value {
    match name {
        "teams" => json!({ "fullTrust": { "joinedTeams": {} } }),
        _ => json!({}),
    }
}

fn legacy_supports() -> Map<String, Value> {
    let supports = json!({
        "appInstallDialog": {},
        "appEntity": {},
        "call": {},
        "chat": {},
        "conversations": {},
        "dialog": { "bot": {}, "update": {} },
        "logs": {},
        "meetingRoom": {},
        "menus": {},
        "monetization": {},
        "notifications": {},
        "pages": {
            "appButton": {},
            "tabs": {},
            "config": {},
            "backStack": {},
            "fullTrust": {}
        },
        "remoteCamera": {},
        "sharing": {},
        "stageView": {},
        "teams": { "fullTrust": {} },
        "teamsCore": {},
        "video": {}
    });
    match supports {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Compare dotted numeric versions.
///
/// Returns `None` when either side has a non-numeric part. Shorter versions
/// are padded with zeros, so `1.2` equals `1.2.0`.
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let left = parse_version(left)?;
    let right = parse_version(right)?;
    let len = left.len().max(right.len());

    for index in 0..len {
        let a = left.get(index).copied().unwrap_or(0);
        let b = right.get(index).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}

/// Runtime for legacy hosts that answer with a version instead of a config.
///
/// Starts from the first-generation capability set and adds each capability
/// whose minimum version the host meets for its client type. Later entries
/// replace earlier ones key by key.
pub fn generate_back_compat_runtime(client_version: &str, client_type: &str) -> RuntimeConfig {
    let mut supports = legacy_supports();

    for gate in CAPABILITY_GATES {
        let meets_version = matches!(
            compare_versions(client_version, gate.min_version),
            Some(Ordering::Greater | Ordering::Equal)
        );
        if meets_version && gate.client_types.contains(&client_type) {
            supports.insert(gate.capability.to_string(), gated_capability(gate.capability));
        }
    }

    RuntimeConfig {
        api_version: 1,
        is_legacy_teams: true,
        supports,
        extra: Map::new(),
    }
}
