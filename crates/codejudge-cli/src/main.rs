//! Codejudge CLI
//!
//! A command-line tool for running and judging submitted code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codejudge::{
    Collaborators, Config, EXAMPLE_CONFIG, FsContentStore, Judge, JudgeError, MemoryStore,
    Question, SubmitRequest,
};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codejudge")]
#[command(about = "A tool for running and judging submitted code")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: codejudge.toml)
        #[arg(short, long, default_value = "codejudge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program once (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (e.g., cpp, c++, python, py, java)
        #[arg(short, long)]
        language: String,

        /// Input file (default: empty input)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Judge a program against a question's test cases
    Submit {
        /// Source file to judge
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language (e.g., cpp, c++, python, py, java)
        #[arg(short, long)]
        language: String,

        /// Question manifest (TOML)
        #[arg(short, long)]
        question: PathBuf,

        /// Directory test case references are resolved against
        /// (default: `content_dir` from the configuration)
        #[arg(long)]
        content_dir: Option<PathBuf>,

        /// Submitting user
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// List available languages
    Languages,

    /// Show configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr, keeping stdout clean for program output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            source,
            language,
            input,
        } => run_execute(&config, &source, &language, input.as_deref(), cli.json).await,
        Commands::Submit {
            source,
            language,
            question,
            content_dir,
            owner,
        } => {
            let content_dir = content_dir.unwrap_or_else(|| config.content_dir.clone());
            run_submit(
                &config,
                &source,
                &language,
                &question,
                &content_dir,
                owner,
                cli.json,
            )
            .await
        }
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Report a request-level error and exit with status 1
fn fail(err: &JudgeError, json: bool) -> ! {
    if json {
        match serde_json::to_string(&err.payload()) {
            Ok(body) => println!("{body}"),
            Err(_) => eprintln!("{err}"),
        }
    } else {
        eprintln!("{err}");
    }
    std::process::exit(1);
}

async fn run_execute(
    config: &Config,
    source: &Path,
    language: &str,
    input: Option<&Path>,
    json: bool,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let input_data = if let Some(input_path) = input {
        tokio::fs::read_to_string(input_path)
            .await
            .context("failed to read input file")?
    } else {
        String::new()
    };

    let store = Arc::new(MemoryStore::new());
    let judge = Judge::new(config, Collaborators::shared(store)).context("failed to start judge")?;

    info!(language, "running program");
    match judge.run_code(language, &code, &input_data).await {
        Ok(output) if json => {
            println!("{}", serde_json::json!({ "output": output }));
            Ok(())
        }
        Ok(output) => {
            print!("{output}");
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

async fn run_submit(
    config: &Config,
    source: &Path,
    language: &str,
    question_path: &Path,
    content_dir: &Path,
    owner: String,
    json: bool,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let question = Question::from_file(question_path).context("failed to load question")?;

    let records = Arc::new(MemoryStore::new());
    let question_id = question.question_id.clone();
    records.insert_question(question).await;

    let stores = Collaborators {
        content: Arc::new(FsContentStore::new(content_dir)),
        questions: records.clone(),
        users: records.clone(),
        submissions: records,
    };
    let judge = Judge::new(config, stores).context("failed to start judge")?;

    let request = SubmitRequest {
        owner_id: owner,
        language: language.to_owned(),
        code,
        question_id,
    };

    info!(question = %request.question_id, language, "judging submission");
    let result = match judge.submit(&request).await {
        Ok(result) => result,
        Err(e) => fail(&e, json),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to serialize result")?
        );
    } else if result.passed {
        println!("Accepted");
    } else {
        println!("Wrong answer");
        println!("Failed cases:");
        for case in &result.failed_cases {
            println!("  {case}");
        }
    }

    info!(submission_id = %result.submission_id, passed = result.passed, "submission recorded");

    if result.passed {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        if lang.aliases.is_empty() {
            println!("  {:<15} {} ({})", id, lang.name, lang_type);
        } else {
            println!(
                "  {:<15} {} ({}), aliases: {}",
                id,
                lang.name,
                lang_type,
                lang.aliases.join(", ")
            );
        }
    }
}

fn show_config(config: &Config) {
    println!("Code directory: {}", config.code_dir.display());
    println!("Output directory: {}", config.output_dir.display());
    println!("Content directory: {}", config.content_dir.display());
    println!();
    println!("Max concurrent jobs: {}", config.max_concurrent_jobs);
    println!("Per-case timeout: {}s", config.per_case_timeout);
    println!("Compile timeout: {}s", config.compile_timeout);
    println!("Output limit: {} bytes per stream", config.max_output);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
