use crate::types::Variables;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Resolved variable names (without the leading `--`) and their values
pub type VariableMap = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum VariablesError {
    #[error("Unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Turn a variables option into a name/value map
pub async fn resolve_variables(source: &Variables) -> Result<VariableMap, VariablesError> {
    match source {
        Variables::Inline(map) => {
            Ok(map.iter().map(|(name, value)| (normalize_name(name), value.clone())).collect())
        }
        Variables::File(path) => load_variables_file(path).await,
    }
}

async fn load_variables_file(path: &Path) -> Result<VariableMap, VariablesError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| VariablesError::Read { path: path.to_path_buf(), source })?;

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
        .map_err(|source| VariablesError::Parse { path: path.to_path_buf(), source })?;

    Ok(raw
        .into_iter()
        .map(|(name, value)| (normalize_name(&name), value_to_string(value)))
        .collect())
}

/// Strings are taken as-is, any other JSON value in its serialized form
pub(crate) fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn normalize_name(name: &str) -> String {
    name.strip_prefix("--").unwrap_or(name).to_string()
}

fn var_reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Matches var(--name) and var(--name, fallback)
        Regex::new(r"var\(\s*--([A-Za-z0-9_-]+)\s*(?:,[^()]*)?\)").unwrap()
    })
}

/// Replace `var(--name)` references whose name is known. Unknown names are left alone.
pub fn substitute_variables(css: &str, variables: &VariableMap) -> String {
    if variables.is_empty() {
        return css.to_string();
    }

    var_reference_regex()
        .replace_all(css, |caps: &regex::Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
