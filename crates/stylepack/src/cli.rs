use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stylepack")]
#[command(about = "Bundle CSS, LESS and Sass entry files into one stylesheet")]
pub struct Cli {
    /// Entry files to bundle
    pub entries: Vec<PathBuf>,

    /// Path to config file (stylepack.json or stylepack.jsonc)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the bundle to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Minify the output
    #[arg(long)]
    pub compress: bool,

    /// Emit source annotations
    #[arg(long)]
    pub debug: bool,

    /// Extra search paths for imports
    #[arg(short = 'I', long = "include-path")]
    pub include_paths: Vec<PathBuf>,

    /// JSON file of variables to substitute
    #[arg(long)]
    pub variables: Option<PathBuf>,

    /// LESS compiler executable [default: lessc]
    #[arg(long)]
    pub lessc: Option<String>,

    /// Working directory
    #[arg(short = 'C', long, default_value = ".")]
    pub cwd: PathBuf,

    /// Log compiler activity
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "stylepack",
            "a.css",
            "b.less",
            "-o",
            "dist/bundle.css",
            "--compress",
            "-I",
            "vendor",
            "--include-path",
            "node_modules",
            "--variables",
            "vars.json",
            "--lessc",
            "/usr/local/bin/lessc",
        ])
        .unwrap();

        assert_eq!(cli.entries, vec![PathBuf::from("a.css"), PathBuf::from("b.less")]);
        assert_eq!(cli.output, Some(PathBuf::from("dist/bundle.css")));
        assert!(cli.compress);
        assert!(!cli.debug);
        assert_eq!(cli.include_paths, vec![PathBuf::from("vendor"), PathBuf::from("node_modules")]);
        assert_eq!(cli.variables, Some(PathBuf::from("vars.json")));
        assert_eq!(cli.lessc.as_deref(), Some("/usr/local/bin/lessc"));
        assert_eq!(cli.cwd, PathBuf::from("."));
    }

    #[test]
    fn test_entries_may_come_from_config() {
        let cli = Cli::try_parse_from(["stylepack", "--config", "stylepack.json"]).unwrap();
        assert!(cli.entries.is_empty());
        assert_eq!(cli.config, Some(PathBuf::from("stylepack.json")));
    }
}
