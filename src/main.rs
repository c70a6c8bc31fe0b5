use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use ttgen::{Artifact, ArtifactKind, Config, GoLoader};

#[derive(Parser)]
#[command(name = "ttgen")]
#[command(about = "ttgen - table test templates and gomock mockers for Go code")]
struct Cli {
    /// Package of the tested code: import path, `.` or a relative directory
    #[arg(short, long, global = true, default_value = ".")]
    pkg_path: String,

    /// Config file, `ttgen.toml` in the current directory by default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print generated artifacts as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a table test for a function
    Function {
        #[arg(value_parser = go_identifier)]
        name: String,
    },
    /// Generate a table test and a mocker for a method
    Method {
        #[arg(value_parser = go_identifier)]
        type_name: String,
        #[arg(value_parser = go_identifier)]
        name: String,
    },
    /// Print the version
    Version,
}

/// Name the request span and diagnostics carry
struct RunContext {
    app_name: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = RunContext {
        app_name: env!("CARGO_PKG_NAME").to_string(),
    };

    match &cli.command {
        Commands::Version => {
            println!("{} {}", ctx.app_name, env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Function { name } => run(&cli, &ctx, |g| g.generate_for_function(&cli.pkg_path, name)),
        Commands::Method { type_name, name } => {
            run(&cli, &ctx, |g| g.generate_for_method(&cli.pkg_path, type_name, name))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(
    cli: &Cli,
    ctx: &RunContext,
    request: impl FnOnce(&mut ttgen::Generator) -> Result<Vec<Artifact>, ttgen::GenerateError>,
) -> Result<()> {
    let start = Instant::now();
    let cwd = env::current_dir().context("get current directory")?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&cwd)?.0,
    };
    let loader = GoLoader::discover(&cwd)?;
    let mut generator = config.into_builder(loader)?.app_name(ctx.app_name.clone()).build();

    let artifacts = request(&mut generator)?;
    let written = generator.write()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
    } else {
        let base = cwd.canonicalize().unwrap_or(cwd);
        report(&artifacts, &base, written.len(), start.elapsed());
    }
    Ok(())
}

fn go_identifier(s: &str) -> Result<String, String> {
    let mut chars = s.chars();
    let valid = match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => chars.all(|c| c == '_' || c.is_alphanumeric()),
        _ => false,
    };
    if valid {
        Ok(s.to_string())
    } else {
        Err(format!("{s:?} is not a Go identifier"))
    }
}

fn report(artifacts: &[Artifact], base: &Path, files: usize, elapsed: Duration) {
    let color = io::stderr().is_terminal();
    for artifact in artifacts {
        let line = artifact_line(artifact, base);
        if color {
            eprintln!("  \x1b[32m+\x1b[0m {line}");
        } else {
            eprintln!("  + {line}");
        }
    }
    eprintln!("{}", summary(artifacts, files, elapsed));
}

fn artifact_line(artifact: &Artifact, base: &Path) -> String {
    let kind = match artifact.kind {
        ArtifactKind::TestTable => "test",
        ArtifactKind::MockerAggregate => "mocker",
    };
    let path = artifact.path.strip_prefix(base).unwrap_or(&artifact.path);
    format!("{kind:<6} {} in {}", artifact.name, path.display())
}

fn summary(artifacts: &[Artifact], files: usize, elapsed: Duration) -> String {
    let tables = artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::TestTable)
        .count();
    let mut what = vec![counted(tables, "test table")];
    if artifacts.len() > tables {
        what.push(counted(artifacts.len() - tables, "mocker"));
    }
    format!(
        "{} generated, {} written in {:.1}ms",
        what.join(" and "),
        counted(files, "file"),
        elapsed.as_secs_f64() * 1000.0
    )
}

fn counted(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
