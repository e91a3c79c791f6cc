use super::{
    trim_trailing_newlines, CompileError, CompileObserver, CompileOptions, CompileOutcome,
    Compiler,
};
use crate::dialect::Dialect;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use grass::OutputStyle;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sass/SCSS compiler backed by grass, one compile per entry file
pub struct SassCompiler {
    observer: Option<Arc<dyn CompileObserver>>,
}

impl SassCompiler {
    pub fn new() -> Self {
        Self { observer: None }
    }

    /// Attach a hook that sees each file's result without affecting the outcome
    pub fn with_observer(observer: Arc<dyn CompileObserver>) -> Self {
        Self { observer: Some(observer) }
    }
}

impl Default for SassCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compiler for SassCompiler {
    fn dialect(&self) -> Dialect {
        Dialect::Sass
    }

    async fn compile(&self, options: CompileOptions) -> CompileOutcome {
        if options.entries.is_empty() {
            return Ok(None);
        }

        let compress = options.compress;
        let debug = options.debug;
        let include_paths = Arc::new(options.include_paths.clone());

        let outputs = compile_each(&options.entries, self.observer.as_deref(), |path| {
            let include_paths = Arc::clone(&include_paths);
            async move { render_file(path, include_paths, compress, debug).await }
        })
        .await?;

        Ok(Some(outputs.join(options.separator())))
    }
}

/// Run `render` for every entry concurrently and keep the results in entry order.
///
/// Every render runs to completion. The first failure becomes the result and
/// any output arriving after it is discarded.
pub(crate) async fn compile_each<F, Fut>(
    entries: &[PathBuf],
    observer: Option<&dyn CompileObserver>,
    render: F,
) -> Result<Vec<String>, CompileError>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<String, CompileError>>,
{
    let mut slots: Vec<Option<String>> = vec![None; entries.len()];
    let mut failure: Option<CompileError> = None;

    let mut in_flight = FuturesUnordered::new();
    for (index, path) in entries.iter().enumerate() {
        let fut = render(path.clone());
        in_flight.push(async move { (index, fut.await) });
    }

    while let Some((index, result)) = in_flight.next().await {
        let path = &entries[index];
        match result {
            Ok(css) => {
                if let Some(observer) = observer {
                    observer.on_success(path, &css);
                }
                if failure.is_none() {
                    slots[index] = Some(css);
                } else {
                    tracing::debug!(path = %path.display(), "discarding sass output after failure");
                }
            }
            Err(error) => {
                if let Some(observer) = observer {
                    observer.on_error(path, &error);
                }
                if failure.is_none() {
                    failure = Some(error);
                }
            }
        }
    }

    if let Some(error) = failure {
        return Err(error);
    }

    Ok(slots.into_iter().flatten().collect())
}

async fn render_file(
    path: PathBuf,
    include_paths: Arc<Vec<PathBuf>>,
    compress: bool,
    debug: bool,
) -> Result<String, CompileError> {
    tracing::debug!(path = %path.display(), "compiling sass");

    tokio::task::spawn_blocking(move || {
        let style = if compress { OutputStyle::Compressed } else { OutputStyle::Expanded };
        let options = grass::Options::default().style(style).load_paths(include_paths.as_slice());

        let mut css = grass::from_path(&path, &options)
            .map(trim_trailing_newlines)
            .map_err(|e| CompileError::failed(Dialect::Sass, &path, e.to_string()))?;

        if debug {
            append_annotation(&mut css, &path);
        }
        Ok(css)
    })
    .await
    .map_err(|e| CompileError::Join { dialect: Dialect::Sass, message: e.to_string() })?
}

fn append_annotation(css: &mut String, path: &Path) {
    if !css.is_empty() && !css.ends_with('\n') {
        css.push('\n');
    }
    css.push_str(&super::source_annotation(path));
}
