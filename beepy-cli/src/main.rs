//! BeePy CLI - Command line interface
//!
//! Runs the loader against a local directory that stands in for the web
//! server, with a recording interpreter in place of the real engine.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use beepy_config::{ConfigValue, LoaderConfig};
use beepy_loader::{
    Bootstrapper, DryRunInterpreter, FileGateway, LoadContext, LoadModuleOptions, ModuleLoader,
    PathResolver, Separator, StaticEngineHost, ROOT_PACKAGE,
};
use beepy_vfs::{memory_fs, EntryKind, MemoryFileSystem};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};

mod config;
mod logging;
mod origin;

use crate::config::LogConfig;
use crate::logging::LogFormat;
use crate::origin::{LocalOrigin, LOCAL_ORIGIN};

const TARGET: &str = "beepy::cli";

#[derive(Parser)]
#[command(
    name = "beepy",
    about = "BeePy loader - resolve, load and boot against a local directory",
    version = "0.1.0"
)]
struct Cli {
    /// Log level spec, e.g. "info" or "warn,gateway=debug"
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split an identifier into directory and leaf
    Resolve {
        /// Dotted module name, or a slashed path with --file
        identifier: String,
        /// Treat the identifier as a file path
        #[arg(long)]
        file: bool,
        /// Last loaded file, for relative resolution
        #[arg(long)]
        from: Option<String>,
    },
    /// Load one module from a directory
    Load {
        /// Module identifier ("" for the root package)
        module: String,
        /// Directory served as the page origin
        #[arg(long, default_value = ".")]
        origin: PathBuf,
        /// Last loaded file, for relative resolution
        #[arg(long)]
        from: Option<String>,
        /// Probe with HEAD before fetching
        #[arg(long)]
        check_exists: bool,
        /// Export the virtual filesystem to this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the full load sequence with a recording interpreter
    Boot {
        /// Directory served as the page origin
        #[arg(long, default_value = ".")]
        origin: PathBuf,
        /// Loader configuration (JSON), merged over the defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Export the virtual filesystem to this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_config = match LogConfig::parse(&cli.log_level) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    if let Err(e) = logging::init_with_file(&log_config, cli.log_format, cli.log_file.as_ref()) {
        eprintln!("Error: 无法打开日志文件: {}", e);
        process::exit(2);
    }

    let result = match cli.command {
        Command::Resolve {
            identifier,
            file,
            from,
        } => handle_resolve(&identifier, file, from.as_deref()),
        Command::Load {
            module,
            origin,
            from,
            check_exists,
            out,
        } => handle_load(&module, &origin, from.as_deref(), check_exists, out.as_deref()),
        Command::Boot {
            origin,
            config,
            out,
        } => handle_boot(&origin, config.as_deref(), out.as_deref()),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_resolve(identifier: &str, file: bool, from: Option<&str>) -> Result<String, String> {
    let fs = Arc::new(memory_fs());
    let resolver = PathResolver::new(fs.clone(), ROOT_PACKAGE);
    resolver.ensure_root().map_err(|e| e.to_string())?;

    let ctx = from.map(LoadContext::at).unwrap_or_default();
    let separator = if file { Separator::File } else { Separator::Module };
    let resolved = resolver
        .resolve(&ctx, identifier, separator, from.is_some())
        .map_err(|e| e.to_string())?;

    let packages: Vec<String> = fs
        .snapshot()
        .into_iter()
        .filter(|e| e.kind == EntryKind::Dir && e.path != ROOT_PACKAGE)
        .map(|e| e.path)
        .collect();
    to_json(&json!({
        "resolved": resolved,
        "fullPath": resolved.full_path(),
        "createdPackages": packages,
    }))
}

fn build_loader(origin: &Path) -> (Arc<MemoryFileSystem>, ModuleLoader) {
    let fs = Arc::new(memory_fs());
    let gateway = Arc::new(FileGateway::new(
        Arc::new(LocalOrigin::new(origin)),
        LOCAL_ORIGIN,
        ROOT_PACKAGE,
    ));
    let loader = ModuleLoader::new(fs.clone(), gateway, ROOT_PACKAGE);
    (fs, loader)
}

fn handle_load(
    module: &str,
    origin: &Path,
    from: Option<&str>,
    check_exists: bool,
    out: Option<&Path>,
) -> Result<String, String> {
    let (fs, loader) = build_loader(origin);
    loader.resolver().ensure_root().map_err(|e| e.to_string())?;

    let mut ctx = from.map(LoadContext::at).unwrap_or_default();
    let options = LoadModuleOptions {
        check_exists,
        ..Default::default()
    };
    let loaded = loader
        .load_module(&mut ctx, module, options)
        .map_err(|e| e.to_string())?;

    if let Some(out) = out {
        let written = export(&fs, out)?;
        info!(target: TARGET, files = written, out = %out.display(), "exported virtual filesystem");
    }
    to_json(&json!({
        "loaded": loaded,
        "tree": tree_json(&fs),
    }))
}

fn handle_boot(origin: &Path, config: Option<&Path>, out: Option<&Path>) -> Result<String, String> {
    let config = read_config(config)?;
    let (fs, loader) = build_loader(origin);
    let interp = Arc::new(DryRunInterpreter::new());
    let host = Arc::new(StaticEngineHost::new(interp.clone()));
    let mut boot = Bootstrapper::new(config, host.clone(), loader);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| format!("无法创建运行时: {}", e))?;
    let result = runtime.block_on(boot.load());

    if let Some(out) = out {
        let written = export(&fs, out)?;
        info!(target: TARGET, files = written, out = %out.display(), "exported virtual filesystem");
    }
    result.map_err(|e| e.to_string())?;

    to_json(&json!({
        "state": boot.state(),
        "scripts": host.scripts(),
        "calls": interp.calls(),
        "modules": boot.registry().modules(),
        "tree": tree_json(&fs),
    }))
}

/// Read a JSON config file, or use the defaults
fn read_config(path: Option<&Path>) -> Result<LoaderConfig, String> {
    let Some(path) = path else {
        return Ok(LoaderConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("无法读取 '{}': {}", path.display(), e))?;
    let value: ConfigValue = serde_json::from_str(&content)
        .map_err(|e| format!("解析 '{}' 失败: {}", path.display(), e))?;
    debug!(target: TARGET, config = %path.display(), "config loaded");
    LoaderConfig::from_value(&value).map_err(|e| format!("'{}': {}", path.display(), e))
}

/// Virtual filesystem entries as JSON, in path order
fn tree_json(fs: &MemoryFileSystem) -> serde_json::Value {
    fs.snapshot()
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::Dir => json!({ "path": entry.path, "kind": "dir" }),
            EntryKind::File => json!({
                "path": entry.path,
                "kind": "file",
                "content": String::from_utf8_lossy(&entry.content),
            }),
        })
        .collect()
}

/// Write every virtual file under `out`; returns the number of files
fn export(fs: &MemoryFileSystem, out: &Path) -> Result<usize, String> {
    let mut files = 0;
    for entry in fs.snapshot() {
        let target = out.join(&entry.path);
        let result = match entry.kind {
            EntryKind::Dir => std::fs::create_dir_all(&target),
            EntryKind::File => {
                files += 1;
                std::fs::write(&target, &entry.content)
            }
        };
        result.map_err(|e| format!("无法写入 '{}': {}", target.display(), e))?;
    }
    Ok(files)
}

fn to_json(value: &serde_json::Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
