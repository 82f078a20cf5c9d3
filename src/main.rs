use anyhow::{bail, Context, Result};
use article_discovery::config::{default_config_path, load_config, Config};
use article_discovery::engines::EngineRegistry;
use article_discovery::models::{DateRange, Provider, SearchParams};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Article Discovery - Federated article search over EBSCO EDS, Primo and Summon
#[derive(Parser, Debug)]
#[command(name = "article-discovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search library-discovery vendors through one canonical model", long_about = None)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Provider to use, overriding the configured one
    #[arg(long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a search and print the normalized response as JSON
    Search {
        /// Free-text query
        query: String,

        /// Generic search-field name (title, author, subject, ...)
        #[arg(long)]
        field: Option<String>,

        /// Facet filter as name=value (repeatable)
        #[arg(long = "facet")]
        facets: Vec<String>,

        /// Sort key (relevance, date)
        #[arg(long)]
        sort: Option<String>,

        /// 1-based page
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Results per page
        #[arg(long, default_value_t = 10)]
        per_page: u32,

        /// Absolute 1-based result position (single-item fetch)
        #[arg(long)]
        index: Option<u64>,

        /// Lower date bound (year or YYYY-MM)
        #[arg(long)]
        from: Option<String>,

        /// Upper date bound
        #[arg(long)]
        to: Option<String>,
    },

    /// Fetch one record by composite or native id
    Lookup {
        /// Provider-scoped document id
        id: String,
    },

    /// Write a starter configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("article_discovery=debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::InitConfig = cli.command {
        return init_config(cli.config);
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if let Some(provider) = &cli.provider {
        let provider: Provider = provider
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        config.provider = Some(provider);
    }

    let registry = EngineRegistry::from_config(&config)?;
    let engine = registry.active()?;

    let response = match cli.command {
        Commands::Search {
            query,
            field,
            facets,
            sort,
            page,
            per_page,
            index,
            from,
            to,
        } => {
            let mut params = SearchParams::new(query).page(page, per_page);
            if let Some(field) = field {
                params = params.field(field);
            }
            if let Some(sort) = sort {
                params = params.sort(sort);
            }
            if let Some(index) = index {
                params = params.index(index);
            }
            for facet in facets {
                let (name, value) = facet
                    .split_once('=')
                    .with_context(|| format!("Facet '{}' is not name=value", facet))?;
                params = params.facet(name, value);
            }
            if from.is_some() || to.is_some() {
                params = params.date_range(DateRange { from, to });
            }
            engine.search(&params).await?
        }
        Commands::Lookup { id } => engine.lookup_by_id(&id, &SearchParams::default()).await?,
        Commands::InitConfig => unreachable!(),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(default_config_path);
    if path.exists() {
        bail!("Refusing to overwrite existing config at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let starter = toml::to_string_pretty(&Config::default())?;
    std::fs::write(&path, starter)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}
