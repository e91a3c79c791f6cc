use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use stylepack::cli::Cli;
use stylepack::config::{find_default_config, load_config_file};
use stylepack::{
    BundleRequest, Bundler, CompilerRegistry, FileConfig, LessCompiler, StylepackError, Variables,
};

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "stylepack=debug" } else { "stylepack=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config named on the command line, or the default one in cwd
fn load_file_config(cli: &Cli) -> Result<FileConfig, StylepackError> {
    if let Some(config_path) = &cli.config {
        if !config_path.exists() {
            eprintln!("Error: Config file not found: {}", config_path.display());
            std::process::exit(1);
        }
        return load_config_file(config_path);
    }

    match find_default_config(Path::new(".")) {
        Some(path) => match load_config_file(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("Failed to parse config file '{}': {}", path.display(), e);
                Ok(FileConfig::default())
            }
        },
        None => Ok(FileConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    std::env::set_current_dir(&cli.cwd)?;
    let FileConfig { entries, compress, debug, include_paths, variables, output, lessc } =
        load_file_config(&cli)?;

    // Merge config: CLI args override file config
    let entries = if !cli.entries.is_empty() { cli.entries } else { entries };
    let Ok(mut request) = BundleRequest::from_entries(entries) else {
        eprintln!("Error: No entry files specified. Pass entry paths or provide a config file.");
        std::process::exit(1);
    };

    let include_paths =
        if !cli.include_paths.is_empty() { cli.include_paths } else { include_paths };
    request = request
        .compress(cli.compress || compress)
        .debug(cli.debug || debug)
        .include_paths(include_paths);

    if let Some(variables) = cli.variables.map(Variables::File).or(variables) {
        request = request.variables(variables);
    }
    if let Some(output) = cli.output.or(output) {
        request = request.output(output);
    }

    let mut registry = CompilerRegistry::new();
    if let Some(binary) = cli.lessc.or(lessc) {
        registry.register(Arc::new(LessCompiler::with_binary(binary)));
    }
    registry.register_builtins();
    let bundler = Bundler::with_registry(registry);

    match bundler.bundle(&request).await {
        Ok(Some(css)) => {
            if request.output.is_none() {
                print!("{css}");
                if !css.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(None) => {
            tracing::warn!("No stylesheet produced from {} entries", request.entries().len());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
