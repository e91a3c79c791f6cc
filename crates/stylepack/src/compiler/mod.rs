mod css;
mod less;
mod registry;
mod sass;

pub use css::{CssCompiler, CssPlugin};
pub use less::LessCompiler;
pub use registry::CompilerRegistry;
pub use sass::SassCompiler;

use crate::dialect::Dialect;
use crate::variables::VariableMap;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error types for compiler operations
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{dialect} compilation failed for {target}: {message}")]
    Failed { dialect: Dialect, target: String, message: String },

    #[error("Unable to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{dialect} compile task failed: {message}")]
    Join { dialect: Dialect, message: String },
}

impl CompileError {
    pub fn failed(dialect: Dialect, path: &Path, message: impl Into<String>) -> Self {
        Self::Failed { dialect, target: path.display().to_string(), message: message.into() }
    }
}

/// Outcome of one dialect: compiled text, nothing to compile, or the first failure
pub type CompileOutcome = Result<Option<String>, CompileError>;

/// Options handed to a single compiler, holding only that dialect's entries
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub entries: Vec<PathBuf>,
    pub compress: bool,
    pub debug: bool,
    pub include_paths: Vec<PathBuf>,
    pub variables: Arc<VariableMap>,
    pub plugins: Vec<Arc<dyn CssPlugin>>,
}

impl CompileOptions {
    pub fn separator(&self) -> &'static str {
        separator(self.compress)
    }
}

/// Observer notified after each file a compiler processes
pub trait CompileObserver: Send + Sync {
    fn on_success(&self, _path: &Path, _css: &str) {}

    fn on_error(&self, _path: &Path, _error: &CompileError) {}
}

/// A compiler turns the entries of one dialect into CSS text
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Dialect this compiler handles
    fn dialect(&self) -> Dialect;

    /// Compile every entry in `options`. Resolves to `Ok(None)` when there is nothing to compile.
    async fn compile(&self, options: CompileOptions) -> CompileOutcome;
}

pub(crate) fn separator(compress: bool) -> &'static str {
    if compress { "" } else { "\n" }
}

/// Strip trailing line breaks from one chunk of compiler output
pub(crate) fn trim_trailing_newlines(mut text: String) -> String {
    let len = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(len);
    text
}

/// Comment pointing devtools at the file a chunk of CSS was compiled from
pub(crate) fn source_annotation(path: &Path) -> String {
    format!("/*# sourceURL={} */", path.display())
}
