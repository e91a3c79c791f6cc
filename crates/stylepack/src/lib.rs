pub mod cli;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod orchestrator;
pub mod output;
pub mod types;
pub mod variables;

pub use compiler::{
    CompileError, CompileObserver, CompileOptions, Compiler, CompilerRegistry, CssCompiler,
    CssPlugin, LessCompiler, SassCompiler,
};
pub use dialect::{Dialect, DialectSubsets};
pub use orchestrator::{Bundler, Completion, JoinState};
pub use types::{
    BoxError, BundleRequest, BundleResult, FileConfig, StylepackError, Transform, Variables,
};
pub use variables::VariablesError;

/// Bundle a request with the built-in compilers
///
/// # Arguments
/// * `request` - A [`BundleRequest`], or a single entry path
///
/// # Returns
/// * `Ok(Some(css))` - The joined stylesheet, also written to `request.output` when set
/// * `Ok(None)` - No entry produced output (for example, only Sass partials)
/// * `Err(StylepackError)` - The first error from any compiler, the transform, or the write
///
/// # Example
/// ```no_run
/// use stylepack::{bundle, BundleRequest};
///
/// # async fn run() -> Result<(), stylepack::StylepackError> {
/// let request = BundleRequest::from_entries(["theme.less", "base.css", "app.scss"])?
///     .compress(true)
///     .output("dist/bundle.css");
///
/// let css = bundle(request).await?;
/// println!("{} bytes", css.map(|c| c.len()).unwrap_or(0));
/// # Ok(())
/// # }
/// ```
pub async fn bundle(request: impl Into<BundleRequest>) -> BundleResult {
    Bundler::new().bundle(&request.into()).await
}

/// Bundle a request and deliver the result to a callback or an output file
///
/// When `completion` is an output path and bundling fails, the error is logged
/// and nothing is written.
pub async fn bundle_with(request: impl Into<BundleRequest>, completion: Completion) {
    Bundler::new().bundle_with(request.into(), completion).await
}
