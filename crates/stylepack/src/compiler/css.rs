use super::{trim_trailing_newlines, CompileError, CompileOptions, CompileOutcome, Compiler};
use crate::dialect::Dialect;
use crate::types::BoxError;
use crate::variables::substitute_variables;
use async_trait::async_trait;
use base64::Engine;
use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use parcel_sourcemap::SourceMap;
use std::path::Path;

/// A text-to-text step run on each printed CSS entry, after variable substitution
pub trait CssPlugin: Send + Sync {
    /// Plugin identifier, used in error messages
    fn name(&self) -> &str;

    /// Rewrite the CSS produced for `entry`
    fn process(&self, css: String, entry: &Path) -> Result<String, BoxError>;
}

/// Plain CSS compiler backed by lightningcss, which inlines `@import` rules
pub struct CssCompiler;

impl CssCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CssCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compiler for CssCompiler {
    fn dialect(&self) -> Dialect {
        Dialect::Css
    }

    async fn compile(&self, options: CompileOptions) -> CompileOutcome {
        if options.entries.is_empty() {
            return Ok(None);
        }

        tokio::task::spawn_blocking(move || compile_batch(&options))
            .await
            .map_err(|e| CompileError::Join { dialect: Dialect::Css, message: e.to_string() })?
            .map(Some)
    }
}

fn compile_batch(options: &CompileOptions) -> Result<String, CompileError> {
    let mut outputs = Vec::with_capacity(options.entries.len());

    for entry in &options.entries {
        tracing::debug!(path = %entry.display(), "compiling css");
        outputs.push(compile_entry(entry, options)?);
    }

    Ok(outputs.join(options.separator()))
}

fn compile_entry(entry: &Path, options: &CompileOptions) -> Result<String, CompileError> {
    let mut source_map = options.debug.then(|| SourceMap::new(&project_root(entry)));
    let mut css = bundle_entry(entry, options.compress, source_map.as_mut())?;

    css = substitute_variables(&css, &options.variables);

    for plugin in &options.plugins {
        css = plugin.process(css, entry).map_err(|e| {
            CompileError::failed(Dialect::Css, entry, format!("plugin '{}': {e}", plugin.name()))
        })?;
    }

    let mut css = trim_trailing_newlines(css);
    if let Some(map) = source_map.as_mut() {
        css.push('\n');
        css.push_str(&inline_source_map(entry, map)?);
    }

    Ok(css)
}

/// Parse `entry`, inline everything it imports and print it, minified when `compress` is set.
///
/// When `source_map` is given, it receives the mappings for the printed text.
fn bundle_entry(
    entry: &Path,
    compress: bool,
    mut source_map: Option<&mut SourceMap>,
) -> Result<String, CompileError> {
    let to_error = |message: String| CompileError::failed(Dialect::Css, entry, message);
    let fs = FileProvider::new();

    let mut stylesheet = {
        let mut bundler = Bundler::new(&fs, source_map.as_deref_mut(), ParserOptions::default());
        bundler.bundle(entry).map_err(|e| to_error(e.to_string()))?
    };

    if compress {
        stylesheet.minify(MinifyOptions::default()).map_err(|e| to_error(e.to_string()))?;
    }

    let printed = stylesheet
        .to_css(PrinterOptions { minify: compress, source_map, ..PrinterOptions::default() })
        .map_err(|e| to_error(e.to_string()))?;

    Ok(printed.code)
}

fn project_root(entry: &Path) -> String {
    match entry.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_string_lossy().into_owned(),
        _ => "/".to_string(),
    }
}

/// Serialize `map` as a base64 `sourceMappingURL` comment
fn inline_source_map(entry: &Path, map: &mut SourceMap) -> Result<String, CompileError> {
    let json = map
        .to_json(None)
        .map_err(|e| CompileError::failed(Dialect::Css, entry, format!("source map: {e:?}")))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(json);

    Ok(format!("/*# sourceMappingURL=data:application/json;base64,{encoded} */"))
}
