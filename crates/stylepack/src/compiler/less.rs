use super::{trim_trailing_newlines, CompileError, CompileOptions, CompileOutcome, Compiler};
use crate::dialect::Dialect;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const DEFAULT_BINARY: &str = "lessc";

/// LESS compiler that drives the `lessc` executable.
///
/// The whole subset is compiled in one invocation: a generated stylesheet that
/// imports every entry in order is piped to `lessc -`.
pub struct LessCompiler {
    binary: String,
}

impl LessCompiler {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    /// Use a specific `lessc` executable
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for LessCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compiler for LessCompiler {
    fn dialect(&self) -> Dialect {
        Dialect::Less
    }

    async fn compile(&self, options: CompileOptions) -> CompileOutcome {
        if options.entries.is_empty() {
            return Ok(None);
        }

        let target = describe_entries(&options.entries);
        let to_error = |message: String| CompileError::Failed {
            dialect: Dialect::Less,
            target: target.clone(),
            message,
        };

        let source = import_source(&options.entries)
            .map_err(|e| to_error(format!("unable to resolve entry path: {e}")))?;
        let args = build_args(&options);
        tracing::debug!(binary = %self.binary, entries = options.entries.len(), "compiling less");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompileError::Spawn { program: self.binary.clone(), source })?;

        // Closing stdin on completion signals end of input
        let stdin = child.stdin.take();
        let write = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(source.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|e| to_error(e.to_string()))?;

        // lessc's own diagnostics take precedence over a broken pipe
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.binary, output.status),
                stderr => stderr.to_string(),
            };
            return Err(to_error(message));
        }
        written.map_err(|e| to_error(format!("unable to write source to {}: {e}", self.binary)))?;

        let css = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(Some(trim_trailing_newlines(css)))
    }
}

/// Stylesheet importing each entry by absolute path, in order
fn import_source(entries: &[PathBuf]) -> std::io::Result<String> {
    let mut source = String::new();

    for entry in entries {
        let absolute = std::path::absolute(entry)?;
        let path = absolute.to_string_lossy().replace('\\', "/").replace('"', "\\\"");
        source.push_str(&format!("@import \"{path}\";\n"));
    }

    Ok(source)
}

fn build_args(options: &CompileOptions) -> Vec<String> {
    let mut args = Vec::new();

    if options.compress {
        args.push("--compress".to_string());
    }

    if !options.include_paths.is_empty() {
        if let Ok(joined) = std::env::join_paths(&options.include_paths) {
            args.push(format!("--include-path={}", joined.to_string_lossy()));
        }
    }

    for (name, value) in options.variables.iter() {
        args.push(format!("--modify-var={name}={value}"));
    }

    if options.debug {
        args.push("--source-map-map-inline".to_string());
    }

    // Read the generated stylesheet from stdin
    args.push("-".to_string());
    args
}

fn describe_entries(entries: &[PathBuf]) -> String {
    match entries {
        [single] => single.display().to_string(),
        _ => format!("{} entries", entries.len()),
    }
}
