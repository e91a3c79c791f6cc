use super::{Compiler, CssCompiler, LessCompiler, SassCompiler};
use crate::dialect::Dialect;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Registry of compilers mapped by dialect
pub struct CompilerRegistry {
    compilers: FxHashMap<Dialect, Arc<dyn Compiler>>,
}

impl CompilerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { compilers: FxHashMap::default() }
    }

    /// Create a registry with the built-in CSS, LESS and Sass compilers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register a compiler for its dialect, replacing any previous one
    pub fn register(&mut self, compiler: Arc<dyn Compiler>) {
        self.compilers.insert(compiler.dialect(), compiler);
    }

    /// Register built-in compilers for dialects that have none yet
    pub fn register_builtins(&mut self) {
        let builtins: Vec<Arc<dyn Compiler>> = vec![
            Arc::new(LessCompiler::new()),
            Arc::new(CssCompiler::new()),
            Arc::new(SassCompiler::new()),
        ];

        for compiler in builtins {
            self.compilers.entry(compiler.dialect()).or_insert(compiler);
        }
    }

    /// Get the compiler for a dialect
    pub fn get(&self, dialect: Dialect) -> Option<&Arc<dyn Compiler>> {
        self.compilers.get(&dialect)
    }

    /// Check if a compiler is registered for the given dialect
    pub fn has_compiler(&self, dialect: Dialect) -> bool {
        self.compilers.contains_key(&dialect)
    }
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, CompileOutcome};
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl Compiler for Fixed {
        fn dialect(&self) -> Dialect {
            Dialect::Less
        }

        async fn compile(&self, _options: CompileOptions) -> CompileOutcome {
            Ok(Some("fixed{}".to_string()))
        }
    }

    #[test]
    fn test_builtins_cover_every_dialect() {
        let registry = CompilerRegistry::with_builtins();
        for dialect in Dialect::JOIN_ORDER {
            assert!(registry.has_compiler(dialect), "missing {dialect}");
            assert_eq!(registry.get(dialect).unwrap().dialect(), dialect);
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = CompilerRegistry::new();
        assert!(!registry.has_compiler(Dialect::Css));
    }

    #[tokio::test]
    async fn test_register_replaces_compiler() {
        let mut registry = CompilerRegistry::with_builtins();
        registry.register(Arc::new(Fixed));

        let compiler = registry.get(Dialect::Less).unwrap();
        let output = compiler.compile(CompileOptions::default()).await.unwrap();
        assert_eq!(output.as_deref(), Some("fixed{}"));
    }

    #[tokio::test]
    async fn test_builtins_do_not_override_registered() {
        let mut registry = CompilerRegistry::new();
        registry.register(Arc::new(Fixed));
        registry.register_builtins();

        let output =
            registry.get(Dialect::Less).unwrap().compile(CompileOptions::default()).await.unwrap();
        assert_eq!(output.as_deref(), Some("fixed{}"));
        assert!(registry.has_compiler(Dialect::Sass));
    }
}
