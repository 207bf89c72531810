use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use routerag_answer::llm::LlmClient;
use routerag_answer::pipeline::AnswerPipeline;
use routerag_core::{ClassificationResult, OutputFormat, RouteragConfig, API_KEY_ENV};
use routerag_index::corpus::{chunk_texts, corpus_fingerprint, load_chunks};
use routerag_index::embedding::EmbeddingClient;
use routerag_index::generator::EmbeddingGenerator;
use routerag_index::index::SimilarityIndex;
use routerag_index::matrix::write_npy;
use routerag_index::store::IndexStore;
use routerag_router::{CategoryVectors, HybridClassifier, LexicalRouter, SemanticRouter};

const CONFIG_FILE: &str = ".routerag.toml";

#[derive(Parser)]
#[command(
    name = "routerag",
    version,
    about = "Route questions about your documents and answer them from the closest chunk",
    long_about = "Routerag answers questions about a personal document corpus.\n\n\
                   Queries are routed to a category (interview, project, resume) by keyword\n\
                   rules first and embedding similarity second, then answered from the\n\
                   closest chunks in an exact inner-product index.\n\n\
                   Examples:\n  \
                     routerag build                              Embed chunks.json and write the index\n  \
                     routerag ask \"What was your GPA?\"           Answer a question\n  \
                     routerag classify \"Tell me about a conflict\"  Show how a query is routed"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .routerag.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable output (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Embed the chunk corpus and build the similarity index
    #[command(long_about = "Embed the chunk corpus and build the similarity index.\n\n\
        Reads the JSON array of chunks, embeds every chunk in batches, writes the\n\
        normalized matrix as .npy and stores the index in SQLite.\n\n\
        Examples:\n  routerag build\n  routerag build --chunks data/chunks.json")]
    Build {
        /// Chunk file (default: paths.chunks from config)
        #[arg(long)]
        chunks: Option<PathBuf>,
    },
    /// Answer a question from the indexed corpus
    #[command(long_about = "Answer a question from the indexed corpus.\n\n\
        Classifies the query, retrieves the closest chunks, asks the completion\n\
        model and saves the query and answer to paths.answer_output.\n\n\
        Examples:\n  routerag ask \"What was your GPA?\"\n  routerag ask \"Walk me through the PM2.5 project\" --top-k 3")]
    Ask {
        /// The question to answer
        query: String,

        /// Chunks to retrieve (default: retrieval.top_k from config)
        #[arg(
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        top_k: Option<usize>,
    },
    /// Show which category a query is routed to
    Classify {
        /// The query to classify
        query: String,
    },
    /// Create a default .routerag.toml configuration file
    #[command(long_about = "Create a default .routerag.toml configuration file.\n\n\
        Writes the default routing rules and category descriptions so they can be\n\
        edited. Fails if .routerag.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# Routerag Configuration

[embedding]
# provider = "openai"
# model = "text-embedding-3-small"
# base_url = "https://api.openai.com/v1"
# api_key = "..."            # falls back to OPENAI_API_KEY
# batch_size = 32

[llm]
# model = "gpt-4o-mini"
# temperature = 0.2

[retrieval]
# top_k = 1

[paths]
# chunks = "chunks.json"
# embeddings = "embeddings.npy"
# index = "index.db"
# answer_output = "rag_answer.txt"

# Keyword rules are checked in the order written; the first match wins.
[router]
rule_confidence = 0.9

[[router.rules]]
category = "interview"
keywords = ["conflict", "failure", "strength", "weakness", "stress", "leadership", "team", "criticism"]

[[router.rules]]
category = "project"
keywords = ["pm2.5", "kaggle", "model", "pipeline", "feature", "evaluation", "metric", "leakage"]

[[router.rules]]
category = "resume"
keywords = ["education", "gpa", "experience", "skills", "background", "tool"]

# Used when no keyword matches; on equal similarity the first entry wins.
[[router.descriptions]]
category = "interview"
description = "behavioral interview questions about teamwork, conflict, leadership, failure"

[[router.descriptions]]
category = "project"
description = "technical machine learning project details, modeling, evaluation, time series"

[[router.descriptions]]
category = "resume"
description = "education background, work experience, skills, internships"
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyOutput<'a> {
    query: &'a str,
    #[serde(flatten)]
    result: ClassificationResult,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RouteragConfig> {
    let config = match path {
        Some(path) => RouteragConfig::from_file(path)
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                RouteragConfig::from_file(default_path).wrap_err("loading .routerag.toml")?
            } else {
                RouteragConfig::default()
            }
        }
    };
    Ok(config)
}

fn require_api_key(configured: Option<&str>, section: &str, provider: &str) -> Result<()> {
    let from_config = configured.is_some_and(|k| !k.is_empty());
    let from_env = std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty());
    if !from_config && !from_env {
        miette::bail!(miette::miette!(
            help = format!("Set {API_KEY_ENV} or add api_key in your .routerag.toml under [{section}]"),
            "No API key configured for {section} provider '{provider}'"
        ));
    }
    Ok(())
}

fn progress_bar(batches: u64) -> indicatif::ProgressBar {
    if !std::io::stderr().is_terminal() {
        return indicatif::ProgressBar::hidden();
    }
    let pb = indicatif::ProgressBar::new(batches);
    if let Ok(style) = indicatif::ProgressStyle::with_template(
        "{spinner:.cyan} embedding [{bar:30}] {pos}/{len} batches ({elapsed})",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

async fn run_build(config: &RouteragConfig, chunks_path: &Path, format: OutputFormat) -> Result<()> {
    require_api_key(
        config.embedding.api_key.as_deref(),
        "embedding",
        &config.embedding.provider,
    )?;

    let chunks = load_chunks(chunks_path).wrap_err(format!("loading {}", chunks_path.display()))?;
    if chunks.is_empty() {
        println!("No chunks found.");
        return Ok(());
    }

    let client = EmbeddingClient::with_config(&config.embedding)?;
    let texts = chunk_texts(&chunks);
    let batch_size = config.embedding.batch_size;
    let generator = EmbeddingGenerator::new(&client, batch_size)
        .with_progress(progress_bar(texts.len().div_ceil(batch_size.max(1)) as u64));
    let matrix = generator.generate(&texts).await?;

    write_npy(&config.paths.embeddings, &matrix)
        .wrap_err(format!("writing {}", config.paths.embeddings.display()))?;

    let index = SimilarityIndex::build(matrix);
    let mut store = IndexStore::open(&config.paths.index)?;
    let metadata = store.save(&index, client.model(), &corpus_fingerprint(&chunks))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&metadata).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!(
                "Embedded {} chunks ({} dimensions, model {})",
                metadata.rows, metadata.dimensions, metadata.model
            );
            println!("Saved embeddings to {}", config.paths.embeddings.display());
            println!("Saved index to {}", config.paths.index.display());
        }
    }
    Ok(())
}

async fn run_ask(
    config: &RouteragConfig,
    query: &str,
    top_k: usize,
    format: OutputFormat,
) -> Result<()> {
    require_api_key(
        config.embedding.api_key.as_deref(),
        "embedding",
        &config.embedding.provider,
    )?;
    require_api_key(config.llm.api_key.as_deref(), "llm", &config.llm.provider)?;

    let chunks = load_chunks(&config.paths.chunks)
        .wrap_err(format!("loading {}", config.paths.chunks.display()))?;
    let store = IndexStore::open_existing(&config.paths.index).map_err(|e| {
        miette::miette!(help = "Run `routerag build` first", "{e}")
    })?;
    let (index, metadata) = store.load()?;
    metadata
        .ensure_matches(chunks.len(), &corpus_fingerprint(&chunks))
        .map_err(|e| miette::miette!(help = "Run `routerag build` to rebuild the index", "{e}"))?;

    let client = EmbeddingClient::with_config(&config.embedding)?;
    if metadata.model != client.model() {
        warn!(
            index_model = %metadata.model,
            query_model = %client.model(),
            "index was built with a different embedding model"
        );
    }
    let generator = EmbeddingGenerator::new(&client, config.embedding.batch_size);
    let vectors = CategoryVectors::build(&config.router.descriptions, &generator).await?;
    let semantic = SemanticRouter::new(&vectors, &generator);
    let classifier = HybridClassifier::new(LexicalRouter::from_config(&config.router), &semantic);
    let llm = LlmClient::new(&config.llm)?;

    let pipeline =
        AnswerPipeline::new(&classifier, &generator, &index, &chunks, &llm)?.with_top_k(top_k);
    let answer = pipeline.answer(query).await?;

    let output_path = &config.paths.answer_output;
    std::fs::write(output_path, transcript(query, &answer.text))
        .into_diagnostic()
        .wrap_err(format!("writing {}", output_path.display()))?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "query": query, "answer": answer });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Text => {
            print!("{}", banner(query, &answer.text));
            let shown = std::fs::canonicalize(output_path).unwrap_or_else(|_| output_path.clone());
            println!("\nSaved answer to {}", shown.display());
        }
    }
    Ok(())
}

/// Contents of `paths.answer_output` after `ask`.
fn transcript(query: &str, answer: &str) -> String {
    format!("Query:\n{query}\n\nAnswer:\n{answer}\n")
}

/// The query and answer between two rules, as printed by `ask`.
fn banner(query: &str, answer: &str) -> String {
    let rule = "=".repeat(80);
    format!("\n{rule}\nQuery:\n{query}\n\nAnswer:\n{answer}\n{rule}\n")
}

async fn run_classify(config: &RouteragConfig, query: &str, format: OutputFormat) -> Result<()> {
    require_api_key(
        config.embedding.api_key.as_deref(),
        "embedding",
        &config.embedding.provider,
    )?;

    let client = EmbeddingClient::with_config(&config.embedding)?;
    let generator = EmbeddingGenerator::new(&client, config.embedding.batch_size);
    let vectors = CategoryVectors::build(&config.router.descriptions, &generator).await?;
    let semantic = SemanticRouter::new(&vectors, &generator);
    let classifier = HybridClassifier::new(LexicalRouter::from_config(&config.router), &semantic);
    let result = classifier.classify(query).await?;

    match format {
        OutputFormat::Json => {
            let output = ClassifyOutput { query, result };
            println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
        }
        OutputFormat::Text => {
            let category = result
                .category
                .map_or_else(|| "none".to_string(), |c| c.to_string());
            println!("Category:   {category}");
            println!("Confidence: {:.2}", result.confidence);
            println!("Provenance: {}", result.provenance);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "routerag", &mut std::io::stdout());
        }
        Command::Build { ref chunks } => {
            let config = load_config(cli.config.as_deref())?;
            let chunks_path = chunks.as_deref().unwrap_or(&config.paths.chunks);
            run_build(&config, chunks_path, cli.format).await?;
        }
        Command::Ask { ref query, top_k } => {
            let config = load_config(cli.config.as_deref())?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            run_ask(&config, query, top_k, cli.format).await?;
        }
        Command::Classify { ref query } => {
            let config = load_config(cli.config.as_deref())?;
            run_classify(&config, query, cli.format).await?;
        }
    }

    Ok(())
}
