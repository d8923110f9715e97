use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use egress_store::config::{DatabaseConfig, connect};
use egress_store::{EgressDestination, EgressStores, NewEgressPolicy, Protocol, StoreBuilder};

/// egress policy store の操作
#[derive(Parser, Debug)]
#[command(name = "egress")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 設定ファイル（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 接続先（設定ファイルより優先）
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// サンプルの destination と policy を作成して一覧を表示
    Demo,
    /// すべての policy を表示
    List,
    /// source の app / space guid で policy を表示
    BySource {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// policy を削除して、削除したものを表示
    DeletePolicy {
        #[arg(required = true)]
        guids: Vec<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Debug, Deserialize)]
struct LogConfig {
    #[serde(default = "default_filter")]
    filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl CliConfig {
    fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let input = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str::<CliConfig>(&input)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => CliConfig::default(),
        };
        if let Some(url) = &cli.database_url {
            config.database = DatabaseConfig {
                driver: driver_for_url(url).to_string(),
                url: url.clone(),
            };
        }
        Ok(config)
    }
}

fn driver_for_url(url: &str) -> &'static str {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        "postgres"
    } else {
        "sqlite"
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// デモ用のデータを作成
async fn seed(stores: &EgressStores) -> Result<()> {
    let destinations = stores
        .destinations
        .create(&[
            EgressDestination::new("web", Protocol::Tcp)
                .with_description("public web")
                .with_ports(443, 443)
                .with_ip_range("93.184.216.0", "93.184.216.255"),
            EgressDestination::new("dns", Protocol::Udp)
                .with_ports(53, 53)
                .with_ip_range("8.8.8.8", "8.8.8.8")
                .with_ip_range("8.8.4.4", "8.8.4.4"),
            EgressDestination::new("ping", Protocol::Icmp)
                .with_icmp(8, 0)
                .with_ip_range("10.0.0.0", "10.255.255.255"),
        ])
        .await?;

    let policies = stores
        .policies
        .create(&[
            NewEgressPolicy::app("demo-app", destinations[0].guid.clone()),
            NewEgressPolicy::app("demo-app", destinations[1].guid.clone()),
            NewEgressPolicy::space("demo-space", destinations[2].guid.clone()),
        ])
        .await?;
    info!(
        destinations = destinations.len(),
        policies = policies.len(),
        "seeded demo data"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli)?;

    // RUST_LOG があればそちらを優先
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let database = connect(&config.database)
        .await
        .with_context(|| format!("connecting to {}", config.database.driver))?;
    let stores = StoreBuilder::new().database(database).build()?;

    match cli.command {
        Commands::Demo => {
            seed(&stores).await?;
            print_json(&stores.policies.all().await?)?;
        }
        Commands::List => print_json(&stores.policies.all().await?)?,
        Commands::BySource { ids } => print_json(&stores.policies.by_source_guids(&ids).await?)?,
        Commands::DeletePolicy { guids } => print_json(&stores.policies.delete(&guids).await?)?,
    }
    Ok(())
}
