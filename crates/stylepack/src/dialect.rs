use std::fmt;
use std::path::{Path, PathBuf};

/// Stylesheet source syntax, each served by its own compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Less,
    Css,
    Sass,
}

impl Dialect {
    /// Order in which compiled outputs are concatenated into the bundle
    pub const JOIN_ORDER: [Dialect; 3] = [Dialect::Less, Dialect::Css, Dialect::Sass];

    /// Position of this dialect's output in the bundle
    pub fn join_index(self) -> usize {
        match self {
            Dialect::Less => 0,
            Dialect::Css => 1,
            Dialect::Sass => 2,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Less => "less",
            Dialect::Css => "css",
            Dialect::Sass => "sass",
        };
        f.write_str(name)
    }
}

fn extension_is(path: &Path, candidates: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| candidates.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

pub fn is_less_path(path: &Path) -> bool {
    extension_is(path, &["less"])
}

/// True for `.sass` and `.scss` files, partials included
pub fn is_sass_path(path: &Path) -> bool {
    extension_is(path, &["sass", "scss"])
}

/// Partials start with `_` and are only meant to be imported by other Sass files
pub fn is_partial_path(path: &Path) -> bool {
    if !is_sass_path(path) {
        return false;
    }

    path.file_name().and_then(|name| name.to_str()).is_some_and(|name| name.starts_with('_'))
}

/// Sass files that can be compiled on their own
pub fn is_compilable_sass_path(path: &Path) -> bool {
    is_sass_path(path) && !is_partial_path(path)
}

/// Everything that is neither LESS nor Sass is treated as plain CSS
pub fn is_css_path(path: &Path) -> bool {
    !is_less_path(path) && !is_sass_path(path)
}

/// Assign a path to its dialect. Sass partials belong to none.
pub fn classify(path: &Path) -> Option<Dialect> {
    if is_less_path(path) {
        Some(Dialect::Less)
    } else if is_compilable_sass_path(path) {
        Some(Dialect::Sass)
    } else if is_css_path(path) {
        Some(Dialect::Css)
    } else {
        None
    }
}

/// Entry paths split by dialect, each list in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialectSubsets {
    pub less: Vec<PathBuf>,
    pub css: Vec<PathBuf>,
    pub sass: Vec<PathBuf>,
}

impl DialectSubsets {
    pub fn partition<P: AsRef<Path>>(entries: &[P]) -> Self {
        let mut subsets = Self::default();

        for entry in entries {
            let path = entry.as_ref();
            match classify(path) {
                Some(dialect) => subsets.bucket_mut(dialect).push(path.to_path_buf()),
                None => tracing::debug!(path = %path.display(), "skipping sass partial"),
            }
        }

        subsets
    }

    pub fn get(&self, dialect: Dialect) -> &[PathBuf] {
        match dialect {
            Dialect::Less => &self.less,
            Dialect::Css => &self.css,
            Dialect::Sass => &self.sass,
        }
    }

    /// Move one dialect's entries out, leaving that subset empty
    pub fn take(&mut self, dialect: Dialect) -> Vec<PathBuf> {
        std::mem::take(self.bucket_mut(dialect))
    }

    fn bucket_mut(&mut self, dialect: Dialect) -> &mut Vec<PathBuf> {
        match dialect {
            Dialect::Less => &mut self.less,
            Dialect::Css => &mut self.css,
            Dialect::Sass => &mut self.sass,
        }
    }
}
