//! Provider registry loading for the command line.
//!
//! Credentials may reference environment variables instead of carrying the
//! secret inline: `{"kind": "bearer", "env": "API1_KEY"}`. References are
//! resolved here so the engine only ever sees concrete values.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use ratescout_fx::ProvidersConfig;
use serde_json::Value;
use tracing::debug;

/// Read a provider registry from `path`, resolving credential references
/// from the process environment.
pub fn load_providers(path: &Path) -> anyhow::Result<ProvidersConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read provider config {}", path.display()))?;
    parse_providers(&text, |name| std::env::var(name).ok())
        .with_context(|| format!("invalid provider config {}", path.display()))
}

/// Parse a registry document, looking up credential references with `lookup`.
pub fn parse_providers(
    text: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ProvidersConfig> {
    let mut doc: Value = serde_json::from_str(text)?;
    resolve_credentials(&mut doc, lookup)?;
    Ok(ProvidersConfig::from_json(&doc.to_string())?)
}

fn resolve_credentials(doc: &mut Value, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    let Some(providers) = doc.get_mut("providers").and_then(Value::as_object_mut) else {
        return Ok(());
    };

    for (id, settings) in providers.iter_mut() {
        let Some(credential) = settings.get_mut("credential").and_then(Value::as_object_mut) else {
            continue;
        };
        let Some(reference) = credential.remove("env") else {
            continue;
        };
        let Some(var) = reference.as_str() else {
            bail!("provider {id}: credential \"env\" must be a variable name");
        };

        let secret = lookup(var)
            .ok_or_else(|| anyhow!("provider {id}: environment variable {var} is not set"))?;
        let field = match credential.get("kind").and_then(Value::as_str) {
            Some("bearer") => "token",
            _ => "value",
        };
        credential.insert(field.to_string(), Value::String(secret));

        debug!(provider = %id, var, "Resolved credential from environment");
    }

    Ok(())
}
