use crate::compiler::{
    separator, trim_trailing_newlines, CompileError, CompileOptions, CompileOutcome,
    CompilerRegistry,
};
use crate::dialect::{Dialect, DialectSubsets};
use crate::output::materialize;
use crate::types::{BundleRequest, BundleResult, StylepackError, Transform};
use crate::variables::{resolve_variables, VariableMap};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Bookkeeping for one bundling call while its compilers are in flight
pub struct JoinState {
    pending: usize,
    first_error: Option<CompileError>,
    outputs: [Option<String>; 3],
}

impl JoinState {
    pub fn new() -> Self {
        Self { pending: Dialect::JOIN_ORDER.len(), first_error: None, outputs: Default::default() }
    }

    /// Record one dialect's outcome. Only the first error is kept.
    pub fn record(&mut self, dialect: Dialect, outcome: CompileOutcome) {
        self.pending = self.pending.saturating_sub(1);

        match outcome {
            Ok(Some(text)) => {
                self.outputs[dialect.join_index()] = Some(trim_trailing_newlines(text));
            }
            Ok(None) => {}
            Err(error) if self.first_error.is_none() => {
                tracing::debug!(%dialect, %error, "recording first compile error");
                self.first_error = Some(error);
            }
            Err(error) => {
                tracing::debug!(%dialect, %error, "discarding compile error after first");
            }
        }
    }

    /// Number of dialects still to report
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }

    /// Join the recorded outputs in dialect order, or return the first error
    pub fn finish(self, compress: bool) -> Result<Option<String>, CompileError> {
        debug_assert!(self.is_complete(), "join finished with {} dialects pending", self.pending);

        if let Some(error) = self.first_error {
            return Err(error);
        }

        let present: Vec<String> = self.outputs.into_iter().flatten().collect();
        if present.is_empty() {
            return Ok(None);
        }
        Ok(Some(present.join(separator(compress))))
    }
}

impl Default for JoinState {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a bundle goes once it is complete
pub enum Completion {
    /// Called exactly once with the result, after any output file is written
    Callback(Box<dyn FnOnce(BundleResult) + Send>),
    /// Write the bundle to this path
    Output(PathBuf),
}

impl Completion {
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnOnce(BundleResult) + Send + 'static,
    {
        Self::Callback(Box::new(callback))
    }

    pub fn output(path: impl Into<PathBuf>) -> Self {
        Self::Output(path.into())
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Callback(_) => f.write_str("Completion::Callback"),
            Completion::Output(path) => f.debug_tuple("Completion::Output").field(path).finish(),
        }
    }
}

impl From<PathBuf> for Completion {
    fn from(path: PathBuf) -> Self {
        Self::Output(path)
    }
}

impl From<&str> for Completion {
    fn from(path: &str) -> Self {
        Self::Output(PathBuf::from(path))
    }
}

/// Compiles requests with the compilers from a registry
pub struct Bundler {
    registry: CompilerRegistry,
}

impl Bundler {
    /// Bundler using the built-in compilers
    pub fn new() -> Self {
        Self::with_registry(CompilerRegistry::with_builtins())
    }

    pub fn with_registry(registry: CompilerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CompilerRegistry {
        &self.registry
    }

    /// Compile, join and transform the request without writing anything
    pub async fn compile(&self, request: &BundleRequest) -> BundleResult {
        let mut subsets = DialectSubsets::partition(request.entries());

        let variables = match &request.variables {
            Some(source) => resolve_variables(source).await?,
            None => VariableMap::new(),
        };
        let variables = Arc::new(variables);

        let mut compilers = Vec::with_capacity(Dialect::JOIN_ORDER.len());
        for dialect in Dialect::JOIN_ORDER {
            let compiler = self.registry.get(dialect).cloned().ok_or_else(|| {
                StylepackError::precondition(format!("no compiler registered for {dialect}"))
            })?;
            compilers.push((dialect, compiler));
        }

        // Every dialect is dispatched, so exactly three outcomes arrive
        let mut state = JoinState::new();
        let mut in_flight = FuturesUnordered::new();
        for (dialect, compiler) in compilers {
            let options = CompileOptions {
                entries: subsets.take(dialect),
                compress: request.compress,
                debug: request.debug,
                include_paths: request.include_paths.clone(),
                variables: Arc::clone(&variables),
                plugins: if dialect == Dialect::Css { request.plugins.clone() } else { Vec::new() },
            };
            tracing::debug!(%dialect, entries = options.entries.len(), "dispatching compiler");
            in_flight.push(async move { (dialect, compiler.compile(options).await) });
        }

        while let Some((dialect, outcome)) = in_flight.next().await {
            state.record(dialect, outcome);
        }

        let text = state.finish(request.compress)?;
        apply_transform(text, request.transform.as_ref())
    }

    /// Compile the request and write it to `request.output` when one is set
    pub async fn bundle(&self, request: &BundleRequest) -> BundleResult {
        let result = self.compile(request).await;

        match &request.output {
            Some(output) => materialize(result, output).await,
            None => result,
        }
    }

    /// Compile the request and hand the result to `completion`
    pub async fn bundle_with(&self, request: BundleRequest, completion: Completion) {
        match completion {
            Completion::Callback(callback) => {
                let result = self.bundle(&request).await;
                callback(result);
            }
            Completion::Output(path) => {
                let request = request.output(path);
                if let Err(error) = self.bundle(&request).await {
                    tracing::error!(%error, "bundle failed");
                }
            }
        }
    }
}

impl Default for Bundler {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_transform(text: Option<String>, transform: Option<&Transform>) -> BundleResult {
    match (text, transform) {
        (Some(text), Some(transform)) => {
            transform(text).map(Some).map_err(StylepackError::Transform)
        }
        (text, _) => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::types::Variables;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeCompiler {
        dialect: Dialect,
        delay: Duration,
        outcome: Result<&'static str, &'static str>,
        calls: Arc<Mutex<Vec<(Vec<PathBuf>, usize)>>>,
        finished: Arc<AtomicBool>,
    }

    impl FakeCompiler {
        fn ok(dialect: Dialect, text: &'static str, delay_ms: u64) -> Self {
            Self {
                dialect,
                delay: Duration::from_millis(delay_ms),
                outcome: Ok(text),
                calls: Arc::default(),
                finished: Arc::default(),
            }
        }

        fn failing(dialect: Dialect, message: &'static str, delay_ms: u64) -> Self {
            Self { outcome: Err(message), ..Self::ok(dialect, "", delay_ms) }
        }
    }

    #[async_trait]
    impl Compiler for FakeCompiler {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn compile(&self, options: CompileOptions) -> CompileOutcome {
            self.calls.lock().unwrap().push((options.entries.clone(), options.plugins.len()));
            if options.entries.is_empty() {
                return Ok(None);
            }

            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);

            match self.outcome {
                Ok(text) => Ok(Some(text.to_string())),
                Err(message) => {
                    Err(CompileError::failed(self.dialect, &options.entries[0], message))
                }
            }
        }
    }

    fn bundler(compilers: Vec<FakeCompiler>) -> Bundler {
        let mut registry = CompilerRegistry::new();
        for compiler in compilers {
            registry.register(Arc::new(compiler));
        }
        Bundler::with_registry(registry)
    }

    fn all_dialects() -> BundleRequest {
        BundleRequest::from_entries(["a.css", "b.less", "c.scss"]).unwrap()
    }

    #[test]
    fn test_join_state_counts_down() {
        let mut state = JoinState::new();
        assert_eq!(state.pending(), 3);

        state.record(Dialect::Sass, Ok(Some("s{}".into())));
        state.record(Dialect::Less, Ok(None));
        assert!(!state.is_complete());

        state.record(Dialect::Css, Ok(Some("c{}".into())));
        assert!(state.is_complete());
        assert_eq!(state.finish(false).unwrap().as_deref(), Some("c{}\ns{}"));
    }

    #[test]
    fn test_join_state_keeps_first_error() {
        let mut state = JoinState::new();
        let first = CompileError::failed(Dialect::Css, Path::new("a.css"), "first");
        let second = CompileError::failed(Dialect::Sass, Path::new("b.scss"), "second");

        state.record(Dialect::Css, Err(first));
        state.record(Dialect::Less, Ok(Some("l{}".into())));
        state.record(Dialect::Sass, Err(second));

        let err = state.finish(false).unwrap_err();
        assert!(err.to_string().contains("first"), "got: {err}");
    }

    #[test]
    fn test_join_state_separates_chunks_with_one_newline() {
        let mut state = JoinState::new();
        state.record(Dialect::Less, Ok(Some(".l {\n}\n".into())));
        state.record(Dialect::Css, Ok(Some(".c {\n}\n\n".into())));
        state.record(Dialect::Sass, Ok(Some(".s {\n}".into())));

        assert_eq!(state.finish(false).unwrap().as_deref(), Some(".l {\n}\n.c {\n}\n.s {\n}"));
    }

    #[test]
    fn test_join_state_all_absent() {
        let mut state = JoinState::new();
        for dialect in Dialect::JOIN_ORDER {
            state.record(dialect, Ok(None));
        }
        assert_eq!(state.finish(true).unwrap(), None);
    }

    #[tokio::test]
    async fn test_less_precedes_css_regardless_of_request_order() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Css, "a{}", 0),
            FakeCompiler::ok(Dialect::Less, "b{}", 0),
            FakeCompiler::ok(Dialect::Sass, "unused", 0),
        ]);
        let request = BundleRequest::from_entries(["a.css", "b.less"]).unwrap();

        let text = bundler.bundle(&request).await.unwrap();
        assert_eq!(text.as_deref(), Some("b{}\na{}"));

        let compressed = bundler.bundle(&request.clone().compress(true)).await.unwrap();
        assert_eq!(compressed.as_deref(), Some("b{}a{}"));
    }

    #[tokio::test]
    async fn test_join_order_holds_for_every_completion_order() {
        let delays: [[u64; 3]; 6] =
            [[0, 20, 40], [0, 40, 20], [20, 0, 40], [20, 40, 0], [40, 0, 20], [40, 20, 0]];

        for [less, css, sass] in delays {
            let bundler = bundler(vec![
                FakeCompiler::ok(Dialect::Less, "l{}", less),
                FakeCompiler::ok(Dialect::Css, "c{}", css),
                FakeCompiler::ok(Dialect::Sass, "s{}", sass),
            ]);

            let text = bundler.bundle(&all_dialects()).await.unwrap();
            assert_eq!(text.as_deref(), Some("l{}\nc{}\ns{}"), "delays {less}/{css}/{sass}");
        }
    }

    #[tokio::test]
    async fn test_failure_discards_other_outputs_and_waits_for_all() {
        for failing in Dialect::JOIN_ORDER {
            let compilers: Vec<FakeCompiler> = Dialect::JOIN_ORDER
                .into_iter()
                .map(|dialect| {
                    if dialect == failing {
                        FakeCompiler::failing(dialect, "syntax error", 0)
                    } else {
                        FakeCompiler::ok(dialect, "ok{}", 30)
                    }
                })
                .collect();
            let finished: Vec<_> = compilers.iter().map(|c| Arc::clone(&c.finished)).collect();
            let bundler = bundler(compilers);

            let err = bundler.bundle(&all_dialects()).await.unwrap_err();

            let StylepackError::Compile(CompileError::Failed { dialect, .. }) = err else {
                panic!("expected compile failure, got {err:?}");
            };
            assert_eq!(dialect, failing);
            assert!(finished.iter().all(|f| f.load(Ordering::SeqCst)), "in-flight work completes");
        }
    }

    #[tokio::test]
    async fn test_first_error_to_arrive_wins() {
        let bundler = bundler(vec![
            FakeCompiler::failing(Dialect::Less, "slow failure", 40),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::failing(Dialect::Sass, "fast failure", 0),
        ]);

        let err = bundler.bundle(&all_dialects()).await.unwrap_err();
        assert!(err.to_string().contains("fast failure"), "got: {err}");
    }

    #[tokio::test]
    async fn test_every_dialect_is_dispatched() {
        let less = FakeCompiler::ok(Dialect::Less, "l{}", 0);
        let css = FakeCompiler::ok(Dialect::Css, "c{}", 0);
        let sass = FakeCompiler::ok(Dialect::Sass, "s{}", 0);
        let calls = [Arc::clone(&less.calls), Arc::clone(&css.calls), Arc::clone(&sass.calls)];
        let bundler = bundler(vec![less, css, sass]);

        let text = bundler.bundle(&BundleRequest::new("only.css")).await.unwrap();
        assert_eq!(text.as_deref(), Some("c{}"));

        for calls in &calls {
            assert_eq!(calls.lock().unwrap().len(), 1);
        }
        assert!(calls[0].lock().unwrap()[0].0.is_empty());
        assert_eq!(calls[1].lock().unwrap()[0].0, vec![PathBuf::from("only.css")]);
        assert!(calls[2].lock().unwrap()[0].0.is_empty());
    }

    #[tokio::test]
    async fn test_partials_only_produce_no_output() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);

        let text = bundler.bundle(&BundleRequest::new("_partial.scss")).await.unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn test_plugins_only_reach_css() {
        struct Noop;
        impl crate::compiler::CssPlugin for Noop {
            fn name(&self) -> &str {
                "noop"
            }
            fn process(&self, css: String, _entry: &Path) -> Result<String, crate::BoxError> {
                Ok(css)
            }
        }

        let less = FakeCompiler::ok(Dialect::Less, "l{}", 0);
        let css = FakeCompiler::ok(Dialect::Css, "c{}", 0);
        let sass = FakeCompiler::ok(Dialect::Sass, "s{}", 0);
        let calls = [Arc::clone(&less.calls), Arc::clone(&css.calls), Arc::clone(&sass.calls)];
        let bundler = bundler(vec![less, css, sass]);

        bundler.bundle(&all_dialects().plugin(Arc::new(Noop))).await.unwrap();

        assert_eq!(calls[0].lock().unwrap()[0].1, 0);
        assert_eq!(calls[1].lock().unwrap()[0].1, 1);
        assert_eq!(calls[2].lock().unwrap()[0].1, 0);
    }

    #[tokio::test]
    async fn test_transform_runs_on_success() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::ok(Dialect::Css, ".x{background:red}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);
        let request = BundleRequest::new("a.css")
            .transform(|css| Ok(css.split("background").collect::<Vec<_>>().join("color")));

        let text = bundler.bundle(&request).await.unwrap();
        assert_eq!(text.as_deref(), Some(".x{color:red}"));
    }

    #[tokio::test]
    async fn test_transform_error_is_the_outcome() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);
        let request = BundleRequest::new("a.css").transform(|_| Err("bad transform".into()));

        let err = bundler.bundle(&request).await.unwrap_err();
        assert!(matches!(err, StylepackError::Transform(_)));
        assert!(err.to_string().contains("bad transform"));
    }

    #[tokio::test]
    async fn test_transform_skipped_on_error() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::failing(Dialect::Css, "broken", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let request = BundleRequest::new("a.css").transform(move |css| {
            flag.store(true, Ordering::SeqCst);
            Ok(css)
        });

        assert!(bundler.bundle(&request).await.is_err());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_same_request_twice_is_identical() {
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 10),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 5),
        ]);

        let first = bundler.bundle(&all_dialects()).await.unwrap();
        let second = bundler.bundle(&all_dialects()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_variables_fail_before_dispatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("variables-malformed.json");
        fs::write(&path, "{ not json").unwrap();

        let css = FakeCompiler::ok(Dialect::Css, "c{}", 0);
        let calls = Arc::clone(&css.calls);
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            css,
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);
        let request = BundleRequest::new("a.css").variables(Variables::File(path));

        let err = bundler.bundle(&request).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unable to parse"), "got: {message}");
        assert!(message.contains("variables-malformed.json"), "got: {message}");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_compiler_is_a_precondition_error() {
        let bundler = bundler(vec![FakeCompiler::ok(Dialect::Css, "c{}", 0)]);

        let err = bundler.bundle(&BundleRequest::new("a.css")).await.unwrap_err();
        assert!(matches!(err, StylepackError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_callback_runs_once_after_write() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("nested/dir/bundle.css");
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);

        let calls = Arc::new(AtomicUsize::new(0));
        let written = Arc::new(Mutex::new(None));
        let (calls_in, written_in, output_in) =
            (Arc::clone(&calls), Arc::clone(&written), output.clone());

        let request = BundleRequest::new("a.css").output(&output);
        bundler
            .bundle_with(
                request,
                Completion::callback(move |result| {
                    calls_in.fetch_add(1, Ordering::SeqCst);
                    let on_disk = fs::read_to_string(&output_in).ok();
                    *written_in.lock().unwrap() = Some((result.unwrap(), on_disk));
                }),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (text, on_disk) = written.lock().unwrap().take().unwrap();
        assert_eq!(text.as_deref(), Some("c{}"));
        assert_eq!(on_disk.as_deref(), Some("c{}"));
    }

    #[tokio::test]
    async fn test_output_completion_writes_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out/bundle.css");
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::ok(Dialect::Css, "c{}", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);

        bundler.bundle_with(all_dialects(), Completion::output(&output)).await;

        assert_eq!(fs::read_to_string(&output).unwrap(), "l{}\nc{}\ns{}");
    }

    #[tokio::test]
    async fn test_output_completion_error_writes_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out/bundle.css");
        let bundler = bundler(vec![
            FakeCompiler::ok(Dialect::Less, "l{}", 0),
            FakeCompiler::failing(Dialect::Css, "broken", 0),
            FakeCompiler::ok(Dialect::Sass, "s{}", 0),
        ]);

        bundler.bundle_with(all_dialects(), Completion::output(&output)).await;

        assert!(!output.exists());
    }
}
