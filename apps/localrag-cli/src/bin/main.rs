use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use localrag_cli::{init_tracing, parse_weight};
use localrag_core::config::Config;
use localrag_core::options::RetrievalOptions;
use localrag_rank::AssemblyOptions;
use localrag_retriever::{build_source, Augmented, Retriever, SourceSpec};

#[derive(Parser)]
#[command(name = "localrag", about = "Query a local retrieval index")]
struct Cli {
    /// Load a precomputed artifact directory (index.json + embeddings.f32)
    #[arg(long, global = true, conflicts_with = "corpus")]
    artifact: Option<PathBuf>,
    /// Build the index from a corpus directory
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieve passages and print the assembled context
    Query(QueryArgs),
    /// Print index diagnostics
    Info,
}

#[derive(Args)]
struct QueryArgs {
    query: String,
    #[arg(long)]
    k: Option<usize>,
    /// Allowed domain (repeatable)
    #[arg(long = "domain")]
    domains: Vec<String>,
    /// Domain weight as DOMAIN=WEIGHT (repeatable)
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f32)>,
    /// Re-rank with maximal marginal relevance
    #[arg(long)]
    diversify: bool,
    #[arg(long)]
    lambda: Option<f32>,
    #[arg(long)]
    pool: Option<usize>,
    #[arg(long)]
    max_tokens: Option<usize>,
    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

impl QueryArgs {
    fn options(&self) -> RetrievalOptions {
        let mut options = RetrievalOptions::default().with_domains(self.domains.iter().cloned());
        if let Some(k) = self.k {
            options = options.with_k(k);
        }
        for (domain, weight) in &self.weights {
            options = options.with_domain_weight(domain.clone(), *weight);
        }
        if self.diversify || self.lambda.is_some() || self.pool.is_some() {
            options = options.with_diversification(self.lambda, self.pool);
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let spec = match (&cli.artifact, &cli.corpus) {
        (Some(dir), _) => SourceSpec::Artifact(dir.clone()),
        (None, Some(dir)) => SourceSpec::Corpus(dir.clone()),
        (None, None) => SourceSpec::from_settings(&settings, &std::env::current_dir()?),
    };
    let source = build_source(spec, &settings)?;
    let retriever = Retriever::from_settings(source, &settings);

    match cli.command {
        Command::Info => {
            let info = retriever.info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Query(args) => {
            let mut prompt = AssemblyOptions::from(&settings.prompt);
            if let Some(max_tokens) = args.max_tokens {
                prompt = prompt.with_max_tokens(max_tokens);
            }
            let retriever = retriever.with_prompt(prompt);
            let augmented = retriever.augment(&args.query, &args.options()).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&augmented)?);
                return Ok(());
            }
            match &augmented {
                Augmented::Grounded { prompt, result } => {
                    println!("🔍 {} hits in {:.1} ms", result.top_k.len(), result.elapsed_ms);
                    for (i, hit) in result.top_k.iter().enumerate() {
                        let domain = hit.chunk.domain.as_deref().unwrap_or("-");
                        println!(
                            "{:>2}. {:.4} (raw {:.4}) [{}] {} {}",
                            i + 1,
                            hit.weighted_score,
                            hit.raw_score,
                            domain,
                            hit.chunk.title,
                            hit.chunk.id
                        );
                    }
                    println!("\n{prompt}");
                }
                Augmented::Unaugmented { query, reason } => {
                    println!("⚠️  No context ({reason}); query passed through unchanged:\n{query}");
                }
            }
        }
    }
    Ok(())
}
