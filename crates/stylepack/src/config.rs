use crate::types::{FileConfig, StylepackError};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 2] = ["stylepack.json", "stylepack.jsonc"];

/// Find default config file in directory
pub fn find_default_config(dir: &Path) -> Option<PathBuf> {
    CONFIG_NAMES.iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

/// Load config from file path, supporting .json and .jsonc
pub fn load_config_file(path: &Path) -> Result<FileConfig, StylepackError> {
    let to_error =
        |message: String| StylepackError::Config { path: path.to_path_buf(), message };

    let mut content = fs::read_to_string(path).map_err(|e| to_error(e.to_string()))?;
    json_strip_comments::strip(&mut content).map_err(|e| to_error(e.to_string()))?;
    let mut config: FileConfig =
        serde_json::from_str(&content).map_err(|e| to_error(e.to_string()))?;

    // Paths in the file are relative to the file itself
    if let Some(base) = path.parent() {
        config.rebase(base);
    }

    Ok(config)
}

impl FileConfig {
    fn rebase(&mut self, base: &Path) {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };

        self.entries = self.entries.iter().map(join).collect();
        self.include_paths = self.include_paths.iter().map(join).collect();
        self.output = self.output.as_ref().map(join);
        if let Some(crate::types::Variables::File(file)) = &mut self.variables {
            *file = join(&*file);
        }
    }
}
