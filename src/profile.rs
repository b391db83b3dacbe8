use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fmt;

pub const GLM_BASE_URL: &str = "https://api.z.ai/api/anthropic";
pub const GLM_API_TIMEOUT_MS: &str = "3000000";
pub const GLM_OPUS_MODEL: &str = "glm-4.6";
pub const GLM_SONNET_MODEL: &str = "glm-4.6";
pub const GLM_HAIKU_MODEL: &str = "glm-4.5-air";
pub const GLM_PROVIDER: &str = "zhipu";

/// Every env key that belongs to the GLM profile and to nothing else.
/// Stripping exactly this set from `env` must yield the cc document.
pub const GLM_ENV_KEYS: [&str; 8] = [
    "ANTHROPIC_AUTH_TOKEN",
    "ANTHROPIC_BASE_URL",
    "API_TIMEOUT_MS",
    "ANTHROPIC_DEFAULT_OPUS_MODEL",
    "ANTHROPIC_DEFAULT_SONNET_MODEL",
    "ANTHROPIC_DEFAULT_HAIKU_MODEL",
    "CLAUDE_MODEL_PROVIDER",
    "MODEL_MAPPING",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Cc,
    Glm,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Cc => write!(f, "cc"),
            Profile::Glm => write!(f, "glm"),
        }
    }
}

/// Decide which profile a settings document currently represents.
///
/// Probes run from most to least specific and short-circuit on the first
/// match. No `env`, a non-object `env`, or an empty document all count as cc.
pub fn classify(doc: &Value) -> Profile {
    let env = match doc.get("env") {
        Some(Value::Object(map)) => map,
        _ => return Profile::Cc,
    };

    if env.get("CLAUDE_MODEL_PROVIDER").and_then(Value::as_str) == Some(GLM_PROVIDER) {
        return Profile::Glm;
    }
    if let Some(url) = env.get("ANTHROPIC_BASE_URL").and_then(Value::as_str) {
        if url.contains("z.ai") {
            return Profile::Glm;
        }
    }
    if env.contains_key("MODEL_MAPPING") {
        return Profile::Glm;
    }

    Profile::Cc
}

/// Strip the GLM keys from `env`, leaving every other key alone. An `env`
/// object that ends up empty is removed entirely rather than kept as `{}`.
pub fn clean_baseline(doc: &Value) -> Value {
    let mut doc = doc.clone();
    if let Some(obj) = doc.as_object_mut() {
        if let Some(Value::Object(env)) = obj.get_mut("env") {
            for key in GLM_ENV_KEYS {
                env.remove(key);
            }
            if env.is_empty() {
                obj.remove("env");
            }
        }
    }
    doc
}

pub fn model_mapping() -> String {
    format!(
        "opus={},sonnet={},haiku={}",
        GLM_OPUS_MODEL, GLM_SONNET_MODEL, GLM_HAIKU_MODEL
    )
}

/// Build the document for `profile` on top of a clean baseline. For cc the
/// baseline already is the answer; for glm the fixed key set is merged into
/// `env`, overwriting stale profile keys but preserving user-added ones.
pub fn apply_profile(baseline: &Value, profile: Profile, auth_token: Option<&str>) -> Result<Value> {
    match profile {
        Profile::Cc => Ok(baseline.clone()),
        Profile::Glm => {
            let token = auth_token.context("GLM profile requires an auth token")?;

            let mut doc = baseline.clone();
            let obj = doc
                .as_object_mut()
                .context("Settings root is not a JSON object")?;
            let env = obj
                .entry("env".to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            let env = env
                .as_object_mut()
                .context("'env' in settings is not a JSON object")?;

            env.insert(
                "ANTHROPIC_AUTH_TOKEN".to_string(),
                Value::String(token.to_string()),
            );
            env.insert(
                "ANTHROPIC_BASE_URL".to_string(),
                Value::String(GLM_BASE_URL.to_string()),
            );
            env.insert(
                "API_TIMEOUT_MS".to_string(),
                Value::String(GLM_API_TIMEOUT_MS.to_string()),
            );
            env.insert(
                "ANTHROPIC_DEFAULT_OPUS_MODEL".to_string(),
                Value::String(GLM_OPUS_MODEL.to_string()),
            );
            env.insert(
                "ANTHROPIC_DEFAULT_SONNET_MODEL".to_string(),
                Value::String(GLM_SONNET_MODEL.to_string()),
            );
            env.insert(
                "ANTHROPIC_DEFAULT_HAIKU_MODEL".to_string(),
                Value::String(GLM_HAIKU_MODEL.to_string()),
            );
            env.insert(
                "CLAUDE_MODEL_PROVIDER".to_string(),
                Value::String(GLM_PROVIDER.to_string()),
            );
            env.insert("MODEL_MAPPING".to_string(), Value::String(model_mapping()));

            Ok(doc)
        }
    }
}

/// Format sanity check only; whether the token is actually accepted by the
/// remote service is not this tool's business.
pub fn validate_auth_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("Auth token is empty");
    }
    if let Some(c) = token
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '_' | '-'))
    {
        bail!("Auth token contains invalid character {:?}", c);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_by_provider_tag() {
        let doc = json!({"env": {"CLAUDE_MODEL_PROVIDER": "zhipu"}});
        assert_eq!(classify(&doc), Profile::Glm);
    }

    #[test]
    fn classifies_by_base_url_substring() {
        let doc = json!({"env": {"ANTHROPIC_BASE_URL": "https://api.z.ai/x"}});
        assert_eq!(classify(&doc), Profile::Glm);
    }

    #[test]
    fn classifies_by_model_mapping_presence() {
        let doc = json!({"env": {"MODEL_MAPPING": ""}});
        assert_eq!(classify(&doc), Profile::Glm);
    }

    #[test]
    fn defaults_to_cc() {
        assert_eq!(classify(&json!({})), Profile::Cc);
        assert_eq!(classify(&json!({"env": {"FOO": "bar"}})), Profile::Cc);
        assert_eq!(classify(&json!({"env": "not an object"})), Profile::Cc);
    }

    #[test]
    fn round_trip_preserves_custom_keys() {
        let original = json!({
            "model": "opus",
            "env": {"CUSTOM": "keep", "OTHER": "also"}
        });

        let glm = apply_profile(&clean_baseline(&original), Profile::Glm, Some("abc123")).unwrap();
        assert_eq!(glm["env"]["CUSTOM"], "keep");
        assert_eq!(glm["env"]["CLAUDE_MODEL_PROVIDER"], "zhipu");

        let back = apply_profile(&clean_baseline(&glm), Profile::Cc, None).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn double_apply_is_idempotent() {
        let original = json!({"env": {"CUSTOM": "keep"}});
        let once = apply_profile(&clean_baseline(&original), Profile::Glm, Some("t0k")).unwrap();
        let twice = apply_profile(&clean_baseline(&once), Profile::Glm, Some("t0k")).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_env_is_removed_entirely() {
        let doc = json!({"env": {"ANTHROPIC_BASE_URL": GLM_BASE_URL}});
        let baseline = clean_baseline(&doc);
        assert!(baseline.get("env").is_none());
    }

    #[test]
    fn token_format_rules() {
        assert!(validate_auth_token("abc123.DEF_-").is_ok());
        assert!(validate_auth_token("").is_err());
        assert!(validate_auth_token("has space").is_err());
        assert!(validate_auth_token("shell$injection").is_err());
    }
}
