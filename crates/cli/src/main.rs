use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use loopwalk_agents::WalkAgent;
use loopwalk_core::intent::normalize_text;
use loopwalk_core::{classify_goal, rank_routes, IntentWeights, RouteRequest, RouteSummary};
use loopwalk_observability::{init_tracing_with_writer, AppMetrics};
use loopwalk_providers::{
    build_http_client, GoogleMapsClient, GoogleMapsConfig, OpenAiConfig, OpenAiTextGenerator,
};

#[derive(Debug, Parser)]
#[command(name = "loopwalk")]
#[command(about = "Walking route recommender")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch candidate routes and run the full recommendation pipeline.
    Recommend(RecommendArgs),
    /// Rank route summaries from a JSON file with fixed weights.
    Score {
        #[arg(long)]
        routes: PathBuf,
        /// `name=value`, repeatable. Missing weights count as zero.
        #[arg(long = "weight", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,
    },
    /// Print the goal label derived from free text.
    Goal { text: Vec<String> },
}

#[derive(Debug, Args)]
struct RecommendArgs {
    #[arg(long)]
    origin: String,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    query: String,
    #[arg(long)]
    goal: Option<String>,
    #[arg(long = "enrich", default_values_t = ["cafe".to_string()])]
    enrichment_queries: Vec<String>,

    #[arg(long, env = "LOOPWALK_GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    maps_api_key: Option<String>,
    #[arg(long, env = "LOOPWALK_OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "LOOPWALK_OPENAI_MODEL")]
    model: Option<String>,
    #[arg(long, env = "LOOPWALK_OPENAI_BASE_URL")]
    openai_base_url: Option<String>,
    #[arg(long, env = "LOOPWALK_PLACES_RADIUS_METERS")]
    places_radius_meters: Option<u32>,
    #[arg(long, env = "LOOPWALK_HTTP_TIMEOUT_SECONDS", default_value_t = 20)]
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing_with_writer("loopwalk_cli", std::io::stderr);
    let cli = Cli::parse();

    match cli.command {
        Command::Recommend(args) => run_recommend(args).await?,
        Command::Score { routes, weights } => {
            let raw = std::fs::read_to_string(&routes)
                .with_context(|| format!("failed to read {}", routes.display()))?;
            let summaries: Vec<RouteSummary> =
                serde_json::from_str(&raw).context("routes file is not a list of route summaries")?;

            let lookup: HashMap<String, f64> = weights.into_iter().collect();
            let ranking = rank_routes(&IntentWeights::from_lookup(&lookup), &summaries);
            println!("{}", serde_json::to_string_pretty(&ranking)?);
        }
        Command::Goal { text } => {
            let text = normalize_text(&text.join(" "));
            println!("{}", classify_goal(&text).label());
        }
    }

    Ok(())
}

async fn run_recommend(args: RecommendArgs) -> Result<()> {
    let maps_key = args
        .maps_api_key
        .or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok())
        .context("LOOPWALK_GOOGLE_MAPS_API_KEY is not set")?;
    let openai_key = args
        .openai_api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context("LOOPWALK_OPENAI_API_KEY is not set")?;

    let mut maps_config = GoogleMapsConfig::new(maps_key);
    if let Some(radius) = args.places_radius_meters {
        maps_config.places_radius_meters = radius;
    }
    let mut openai_config = OpenAiConfig::new(openai_key);
    if let Some(model) = args.model {
        openai_config.model = model;
    }
    if let Some(base_url) = args.openai_base_url {
        openai_config.base_url = base_url;
    }

    let http = build_http_client(Duration::from_secs(args.timeout_seconds))?;
    let agent = WalkAgent::new(
        Arc::new(GoogleMapsClient::new(http.clone(), maps_config)),
        Arc::new(OpenAiTextGenerator::new(http, openai_config)),
        AppMetrics::shared(),
    );

    let recommendation = agent
        .recommend(RouteRequest {
            origin: args.origin,
            destination: args.destination,
            user_query: args.query,
            enrichment_queries: args.enrichment_queries,
            goal: args.goal,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

fn parse_weight(raw: &str) -> Result<(String, f64)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected name=value, got `{raw}`");
    };
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid weight value in `{raw}`"))?;
    Ok((name.trim().to_string(), value))
}
