use std::panic;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use interjudge::{
    core::{domain::Language, pipeline::judging},
    native::problem::{BudgetSource, Submission},
};

/// Judges a built submission against one test file of an interactive problem.
#[derive(Debug, Parser)]
#[command(name = "interjudge", version)]
struct Cli {
    /// Problem directory holding the interactor and answer files
    #[arg(long, env = "INTERJUDGE_PROBLEM_DIR")]
    problem_dir: PathBuf,

    /// Built solution artifact
    #[arg(long, env = "INTERJUDGE_EXECUTABLE")]
    executable: PathBuf,

    #[arg(long, value_enum, default_value = "cpp", env = "INTERJUDGE_LANGUAGE")]
    language: LanguageArg,

    /// Test input file
    #[arg(long, env = "INTERJUDGE_TEST")]
    test: PathBuf,

    #[arg(long, default_value_t = 2000, env = "INTERJUDGE_TIME_LIMIT_MS")]
    time_limit_ms: u64,

    /// Recorded only, not enforced
    #[arg(long, default_value_t = 256, env = "INTERJUDGE_MEMORY_LIMIT_MB")]
    memory_limit_mb: u64,

    #[arg(long, value_enum, default_value = "per-case", env = "INTERJUDGE_BUDGET")]
    budget: BudgetArg,

    /// Longest silence allowed between two competitor lines
    #[arg(long, env = "INTERJUDGE_IDLE_LIMIT_MS")]
    idle_limit_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LanguageArg {
    Cpp,
    Python,
    Java,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BudgetArg {
    Static,
    Global,
    PerCase,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Cpp => Language::GnuCpp,
            LanguageArg::Python => Language::Python,
            LanguageArg::Java => Language::Java,
        }
    }
}

impl From<BudgetArg> for BudgetSource {
    fn from(arg: BudgetArg) -> Self {
        match arg {
            BudgetArg::Static => BudgetSource::File,
            BudgetArg::Global => BudgetSource::Global,
            BudgetArg::PerCase => BudgetSource::PerCase,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let cli = Cli::parse();
    tracing::debug!("Parsed arguments: {:?}", cli);

    let request = Submission {
        executable: cli.executable,
        language: cli.language.into(),
        problem_dir: cli.problem_dir,
        test_path: cli.test,
        time_limit_ms: cli.time_limit_ms,
        memory_limit_mb: cli.memory_limit_mb,
        query_budget: cli.budget.into(),
        idle_limit_ms: cli.idle_limit_ms,
    }
    .into_request()?;

    let outcome = judging::judge(&request).await;
    println!("{}", serde_json::to_string(&outcome)?);

    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
