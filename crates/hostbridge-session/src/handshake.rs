use std::fmt;

use serde_json::Value;

use crate::runtime::{compare_versions, generate_back_compat_runtime, RuntimeConfig};

/// Action name of the first round trip with the host.
pub const INITIALIZE_FUNC: &str = "initialize";

/// Client version assumed when the host does not report one.
pub const DEFAULT_CLIENT_SDK_VERSION: &str = "2.0.1";

/// Why a runtime payload could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// Not JSON at all. The next fallback strategy is tried.
    #[error("payload is not JSON: {0}")]
    Syntax(String),
    /// JSON, but not a usable runtime. Fatal.
    #[error("invalid runtime config: {0}")]
    Invalid(String),
}

/// Everything the host told us during initialization.
#[derive(Clone, PartialEq)]
pub struct InitializeOutcome {
    /// Frame context the app was loaded in (`content`, `settings`, ...).
    pub context: String,
    /// Host client type (`desktop`, `web`, `android`, ...).
    pub client_type: String,
    /// Negotiated capability map.
    pub runtime_config: RuntimeConfig,
    /// Highest library version the host says it supports.
    pub client_supported_sdk_version: String,
}

impl fmt::Debug for InitializeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializeOutcome")
            .field("context", &self.context)
            .field("client_type", &self.client_type)
            .field("api_version", &self.runtime_config.api_version)
            .field("capabilities", &self.runtime_config.supports.len())
            .field(
                "client_supported_sdk_version",
                &self.client_supported_sdk_version,
            )
            .finish()
    }
}

/// Parse one response slot into a runtime config.
///
/// String slots hold serialized JSON. A missing slot counts as a syntax
/// error, a JSON `null` or a document without `apiVersion` is invalid.
pub fn parse_runtime_config(slot: Option<&Value>) -> Result<RuntimeConfig, NegotiationError> {
    let parsed = slot_json(slot)?;

    let has_api_version = parsed
        .get("apiVersion")
        .is_some_and(|version| version.as_u64().is_some_and(|v| v > 0));
    if !has_api_version {
        return Err(NegotiationError::Invalid(
            "received runtime config is missing apiVersion".to_string(),
        ));
    }

    serde_json::from_value(parsed).map_err(|err| NegotiationError::Invalid(err.to_string()))
}

/// Parse the fourth response slot into a runtime config.
///
/// Hosts that report a version in slot 3 send their runtime here and it is
/// applied as sent, so `apiVersion` is optional. Only a JSON `null` or a
/// non-object document is invalid.
pub fn parse_trailing_runtime_config(
    slot: Option<&Value>,
) -> Result<RuntimeConfig, NegotiationError> {
    let parsed = slot_json(slot)?;
    if !parsed.is_object() {
        return Err(NegotiationError::Invalid(format!(
            "received runtime config is not an object: {parsed}"
        )));
    }
    serde_json::from_value(parsed).map_err(|err| NegotiationError::Invalid(err.to_string()))
}

fn slot_json(slot: Option<&Value>) -> Result<Value, NegotiationError> {
    match slot {
        None | Some(Value::Null) => Err(NegotiationError::Syntax("slot is missing".to_string())),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|err| NegotiationError::Syntax(err.to_string())),
        Some(other) => Ok(other.clone()),
    }
}

/// Negotiate the runtime from the host's `initialize` response.
///
/// The response is `[context, clientType, runtimeConfigOrVersion,
/// clientSupportedSdkVersionOrConfig]`. Strategies are tried in order:
/// 1. slot 3 as a runtime config;
/// 2. slot 3 as a version, slot 4 as a runtime config;
/// 3. a version-based runtime.
///
/// Only a [`NegotiationError::Syntax`] moves on to the next strategy.
pub fn negotiate(args: &[Value]) -> Result<InitializeOutcome, NegotiationError> {
    let context = string_slot(args, 0, "context")?;
    let client_type = string_slot(args, 1, "clientType")?;
    let slot3 = args.get(2);
    let slot4 = args.get(3).filter(|value| !value.is_null());

    let mut client_version = slot4
        .and_then(Value::as_str)
        .filter(|version| compare_versions(version, DEFAULT_CLIENT_SDK_VERSION).is_some())
        .unwrap_or(DEFAULT_CLIENT_SDK_VERSION)
        .to_string();

    let runtime_config = match parse_runtime_config(slot3) {
        Ok(config) => config,
        Err(NegotiationError::Syntax(reason)) => {
            tracing::debug!(%reason, "runtime slot is not JSON; trying it as a version");
            if let Some(version) = slot3.and_then(Value::as_str) {
                if compare_versions(version, DEFAULT_CLIENT_SDK_VERSION).is_some() {
                    client_version = version.to_string();
                }
            }
            match parse_trailing_runtime_config(slot4) {
                Ok(config) => config,
                Err(NegotiationError::Syntax(reason)) => {
                    tracing::debug!(
                        %reason,
                        client_version = %client_version,
                        "no runtime config from host; generating one from its version"
                    );
                    generate_back_compat_runtime(&client_version, &client_type)
                }
                Err(err) => return Err(err),
            }
        }
        Err(err) => return Err(err),
    };

    Ok(InitializeOutcome {
        context,
        client_type,
        runtime_config,
        client_supported_sdk_version: client_version,
    })
}

fn string_slot(args: &[Value], index: usize, name: &str) -> Result<String, NegotiationError> {
    match args.get(index) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(NegotiationError::Invalid(format!(
            "{name} must be a string, got {other}"
        ))),
        None => Err(NegotiationError::Invalid(format!("{name} is missing"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn runtime_json(api_version: u32) -> String {
        json!({ "apiVersion": api_version, "supports": { "dialog": {} } }).to_string()
    }

    #[test]
    fn runtime_in_third_slot() {
        let outcome =
            negotiate(&[json!("content"), json!("web"), json!(runtime_json(4)), json!("2.1.0")])
                .unwrap();
        assert_eq!(outcome.context, "content");
        assert_eq!(outcome.client_type, "web");
        assert_eq!(outcome.runtime_config.api_version, 4);
        assert_eq!(outcome.client_supported_sdk_version, "2.1.0");
    }

    #[test]
    fn version_in_third_slot_and_runtime_in_fourth() {
        let outcome = negotiate(&[
            json!("content"),
            json!("desktop"),
            json!("1.6.0"),
            json!(runtime_json(2)),
        ])
        .unwrap();
        assert_eq!(outcome.runtime_config.api_version, 2);
        assert!(outcome.runtime_config.supports("dialog"));
        assert_eq!(outcome.client_supported_sdk_version, "1.6.0");
    }

    #[test]
    fn version_only_generates_runtime() {
        let outcome =
            negotiate(&[json!("content"), json!("desktop"), json!("1.9.0")]).unwrap();
        assert!(outcome.runtime_config.is_legacy_teams);
        assert!(outcome.runtime_config.supports("location"));
        assert!(!outcome.runtime_config.supports("people"));
        assert_eq!(outcome.client_supported_sdk_version, "1.9.0");
    }

    #[test]
    fn missing_slots_default_the_version() {
        let outcome = negotiate(&[json!("content"), json!("desktop")]).unwrap();
        assert_eq!(outcome.client_supported_sdk_version, DEFAULT_CLIENT_SDK_VERSION);
        assert!(outcome.runtime_config.supports("people"));
    }

    #[test]
    fn non_version_text_keeps_default_version() {
        let outcome =
            negotiate(&[json!("content"), json!("web"), json!("not json"), json!("2.0.0")])
                .unwrap();
        assert_eq!(outcome.client_supported_sdk_version, "2.0.0");
        assert!(outcome.runtime_config.supports("people"));
    }

    #[test]
    fn json_without_api_version_is_fatal() {
        let err = negotiate(&[
            json!("content"),
            json!("web"),
            json!(r#"{"supports":{}}"#),
            json!(runtime_json(2)),
        ])
        .unwrap_err();
        assert!(matches!(err, NegotiationError::Invalid(_)));
    }

    #[test]
    fn null_fallback_config_is_fatal() {
        let err = negotiate(&[json!("content"), json!("web"), json!("1.6.0"), json!("null")])
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Invalid(_)));
    }

    #[test]
    fn fourth_slot_runtime_needs_no_api_version() {
        let outcome = negotiate(&[
            json!("content"),
            json!("web"),
            json!("1.6.0"),
            json!(r#"{"supports":{"dialog":{}}}"#),
        ])
        .unwrap();
        assert!(outcome.runtime_config.supports("dialog"));
        assert_eq!(outcome.runtime_config.api_version, 0);
        assert_eq!(outcome.client_supported_sdk_version, "1.6.0");
    }

    #[test]
    fn non_object_fallback_config_is_fatal() {
        let err = negotiate(&[json!("content"), json!("web"), json!("1.6.0"), json!("[1]")])
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Invalid(_)));
        assert!(matches!(
            parse_trailing_runtime_config(Some(&json!(7))),
            Err(NegotiationError::Invalid(_))
        ));
    }

    #[test]
    fn structured_runtime_is_accepted() {
        let outcome = negotiate(&[
            json!("content"),
            json!("web"),
            json!({ "apiVersion": 3, "supports": {} }),
        ])
        .unwrap();
        assert_eq!(outcome.runtime_config.api_version, 3);
    }

    #[test]
    fn context_must_be_present() {
        assert!(matches!(negotiate(&[]), Err(NegotiationError::Invalid(_))));
    }
}
