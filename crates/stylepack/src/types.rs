use crate::compiler::{CompileError, CssPlugin};
use crate::variables::{value_to_string, VariablesError};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by caller-supplied hooks such as transforms and plugins
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Post-compilation text transform, applied to the joined bundle
pub type Transform = Arc<dyn Fn(String) -> Result<String, BoxError> + Send + Sync>;

/// Outcome of one bundling call. `Ok(None)` means nothing was compiled.
pub type BundleResult = Result<Option<String>, StylepackError>;

/// Source of substitution variables
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Variables {
    /// Path to a JSON object of name/value pairs
    File(PathBuf),
    Inline(#[serde(deserialize_with = "deserialize_inline")] BTreeMap<String, String>),
}

/// Accept numbers and other JSON values in an inline map, stringified as in a variables file
fn deserialize_inline<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(name, value)| (name, value_to_string(value))).collect())
}

/// Configuration for one bundling call
#[derive(Clone)]
pub struct BundleRequest {
    entries: Vec<PathBuf>,
    pub compress: bool,
    pub debug: bool,
    pub include_paths: Vec<PathBuf>,
    pub variables: Option<Variables>,
    pub output: Option<PathBuf>,
    pub transform: Option<Transform>,
    pub plugins: Vec<Arc<dyn CssPlugin>>,
}

impl BundleRequest {
    /// Create a request for a single entry file
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self::with_entries(vec![entry.into()])
    }

    /// Create a request for several entry files, failing if there are none
    pub fn from_entries<I, P>(entries: I) -> Result<Self, StylepackError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let entries: Vec<PathBuf> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            return Err(StylepackError::precondition("expected at least one entry file"));
        }
        Ok(Self::with_entries(entries))
    }

    fn with_entries(entries: Vec<PathBuf>) -> Self {
        Self {
            entries,
            compress: false,
            debug: false,
            include_paths: Vec::new(),
            variables: None,
            output: None,
            transform: None,
            plugins: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn include_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn CssPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Bundle text separator: none when compressing, a newline otherwise
    pub fn separator(&self) -> &'static str {
        crate::compiler::separator(self.compress)
    }
}

impl fmt::Debug for BundleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleRequest")
            .field("entries", &self.entries)
            .field("compress", &self.compress)
            .field("debug", &self.debug)
            .field("include_paths", &self.include_paths)
            .field("variables", &self.variables)
            .field("output", &self.output)
            .field("transform", &self.transform.is_some())
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl From<&str> for BundleRequest {
    fn from(entry: &str) -> Self {
        Self::new(entry)
    }
}

impl From<String> for BundleRequest {
    fn from(entry: String) -> Self {
        Self::new(entry)
    }
}

impl From<PathBuf> for BundleRequest {
    fn from(entry: PathBuf) -> Self {
        Self::new(entry)
    }
}

impl From<&Path> for BundleRequest {
    fn from(entry: &Path) -> Self {
        Self::new(entry)
    }
}

/// Error types for stylepack operations
#[derive(Error, Debug)]
pub enum StylepackError {
    #[error("stylepack error: {0}")]
    Precondition(String),

    #[error(transparent)]
    Variables(#[from] VariablesError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Transform failed: {0}")]
    Transform(BoxError),

    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl StylepackError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}

/// Config file structure for stylepack.json / stylepack.jsonc
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub entries: Vec<PathBuf>,

    #[serde(default)]
    pub compress: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    #[serde(default)]
    pub variables: Option<Variables>,

    #[serde(default)]
    pub output: Option<PathBuf>,

    /// LESS compiler executable
    #[serde(default)]
    pub lessc: Option<String>,
}
