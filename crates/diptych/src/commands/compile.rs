//! Compile command - Rewrite source files for one environment

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use diptych::config::load_config;
use diptych::host::{normalize, FsHost, SCRIPT_EXTENSIONS};
use diptych_atelier::{CompileDiagnostic, Compiler};
use futures::future::join_all;
use ignore::Walk;
use serde::Serialize;

use super::{EnvArg, ModeArg};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Output rewritten JavaScript
    #[default]
    Js,
    /// Output JSON with code, source map and warnings
    Json,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Files or directories to compile
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target environment (falls back to `env` of diptych.config.json)
    #[arg(long, value_enum)]
    pub env: Option<EnvArg>,

    /// Project root (default: current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Compilation mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Environment hosting server function implementations
    #[arg(long)]
    pub provider_env: Option<String>,

    /// Framework name (react, solid, ...)
    #[arg(long)]
    pub framework: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "js")]
    pub format: OutputFormat,

    /// Output directory (default: print to stdout)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Also output the discovered server functions
    #[arg(long)]
    pub manifest: bool,
}

#[derive(Debug, Serialize)]
struct FileOutput {
    file: String,
    code: String,
    map: Option<serde_json::Value>,
    warnings: Vec<CompileDiagnostic>,
}

pub fn run(args: CompileArgs) -> bool {
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let root = normalize(&std::path::absolute(&root).unwrap_or(root));
    let config = load_config(Some(&root));

    let Some(env) = args.env.map(Into::into).or(config.env) else {
        eprintln!("No environment given: pass --env or set \"env\" in diptych.config.json");
        return false;
    };

    let mut options = config.compiler_options(env);
    if options.root.is_empty() || args.root.is_some() {
        options.root = root.to_string_lossy().into_owned();
    }
    if let Some(mode) = args.mode {
        options.mode = mode.into();
    }
    if let Some(provider_env) = &args.provider_env {
        options.provider_env_name = provider_env.clone();
    }
    if let Some(framework) = &args.framework {
        options.framework = framework.clone();
    }

    let files = collect_files(&args.paths);
    if files.is_empty() {
        eprintln!("No source files found");
        return false;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return false;
        }
    };

    let libraries = options
        .resolved_lookup_configurations()
        .into_iter()
        .map(|config| config.lib_name);
    let compiler = Compiler::new(options, FsHost::new(libraries));

    let start = Instant::now();
    let results = runtime.block_on(join_all(
        files.iter().map(|path| compile_file(&compiler, path)),
    ));
    tracing::debug!(
        files = files.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "compiled"
    );

    let mut ok = true;
    let mut outputs = Vec::new();
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(output) => {
                for warning in &output.warnings {
                    eprintln!(
                        "{}:{}:{}: warning: {}",
                        path.display(),
                        warning.line,
                        warning.column,
                        warning.message
                    );
                }
                outputs.push((path, output));
            }
            Err(e) => {
                eprintln!("Error compiling {}: {}", path.display(), e);
                ok = false;
            }
        }
    }

    ok &= match &args.out_dir {
        Some(out_dir) => write_outputs(out_dir, &root, args.format, &outputs),
        None => print_outputs(args.format, &outputs),
    };

    if args.manifest {
        let manifest =
            serde_json::to_string_pretty(&compiler.host().discovered()).unwrap_or_default();
        match &args.out_dir {
            Some(out_dir) => {
                let path = out_dir.join("server-fns.json");
                if let Err(e) = fs::write(&path, manifest) {
                    eprintln!("Failed to write {}: {}", path.display(), e);
                    ok = false;
                }
            }
            None => println!("{manifest}"),
        }
    }

    ok
}

async fn compile_file(compiler: &Compiler<FsHost>, path: &Path) -> Result<FileOutput, String> {
    let id = path.to_string_lossy().into_owned();
    let code = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read: {e}"))?;

    let detected = compiler.detect(&code);
    let output = compiler
        .compile(&id, &code, Some(detected))
        .await
        .map_err(|e| e.to_string())?;
    Ok(match output {
        Some(output) => FileOutput {
            file: id,
            code: output.code,
            map: serde_json::to_value(&output.map).ok(),
            warnings: output.warnings,
        },
        None => FileOutput {
            file: id,
            code,
            map: None,
            warnings: Vec::new(),
        },
    })
}

fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        let path = normalize(&std::path::absolute(path).unwrap_or_else(|_| path.clone()));
        if path.is_file() {
            files.push(path);
            continue;
        }
        for entry in Walk::new(&path).flatten() {
            let entry_path = entry.path();
            let is_script = entry_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
            if entry_path.is_file() && is_script {
                files.push(entry_path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn print_outputs(format: OutputFormat, outputs: &[(&PathBuf, FileOutput)]) -> bool {
    match format {
        OutputFormat::Js => {
            for (path, output) in outputs {
                println!("// {}", path.display());
                println!("{}", output.code);
            }
        }
        OutputFormat::Json => {
            let entries: Vec<&FileOutput> = outputs.iter().map(|(_, output)| output).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).unwrap_or_default()
            );
        }
    }
    true
}

fn write_outputs(
    out_dir: &Path,
    root: &Path,
    format: OutputFormat,
    outputs: &[(&PathBuf, FileOutput)],
) -> bool {
    let mut ok = true;
    for (path, output) in outputs {
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let relative = relative.strip_prefix("/").unwrap_or(relative);
        let mut out_path = out_dir.join(relative);
        let content = match format {
            OutputFormat::Js => output.code.clone(),
            OutputFormat::Json => {
                out_path = out_path.with_extension("json");
                serde_json::to_string_pretty(output).unwrap_or_default()
            }
        };

        if let Some(parent) = out_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create {}: {}", parent.display(), e);
                ok = false;
                continue;
            }
        }
        if let Err(e) = fs::write(&out_path, content) {
            eprintln!("Failed to write {}: {}", out_path.display(), e);
            ok = false;
        }
    }
    ok
}
