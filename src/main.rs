use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use scoped_query::config::Config;
use scoped_query::db::{self, RecordTable};
use scoped_query::report;
use scoped_query::roles::RoleDirectory;
use scoped_query::{
    output_columns, validate_access, AccessScope, FilterValue, Intent, IntentCategory,
    JsonRecordStore, QueryExecutor, RecordStore, Table,
};

#[derive(Parser)]
#[command(name = "scoped-query")]
#[command(about = "Scope-enforced answers to questions about school records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Json,
    Postgres,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// List administrators and their access scopes
    Admins,
    /// Answer a parsed question on behalf of one administrator
    #[command(group(
        ArgGroup::new("intent")
            .args(["intent_json", "category"])
            .required(true)
            .multiple(false)
    ))]
    Query {
        #[arg(long)]
        admin: String,
        /// JSON produced by the question parser
        #[arg(long)]
        intent_json: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// key=value; repeat a key to request several values
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        #[arg(long, value_enum, default_value_t = Source::Json)]
        source: Source,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import records from a CSV file
    Import {
        #[arg(long, value_enum)]
        table: RecordTable,
        #[arg(long)]
        csv: PathBuf,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing filter key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn build_intent(category: &str, filters: Vec<(String, String)>, confidence: f64) -> Intent {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in filters {
        grouped.entry(key).or_default().push(value);
    }

    grouped.into_iter().fold(
        Intent::new(IntentCategory::from_label(category)).with_confidence(confidence),
        |intent, (key, mut values)| {
            let value = if values.len() == 1 {
                FilterValue::One(values.remove(0))
            } else {
                FilterValue::Many(values)
            };
            intent.with_filter(key, value)
        },
    )
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn run<S: RecordStore>(store: S, intent: Intent, scope: &AccessScope) -> anyhow::Result<Table> {
    let table = QueryExecutor::new(store).execute(intent, scope)?;
    Ok(table)
}

async fn answer(
    config: &Config,
    source: Source,
    intent: Intent,
    scope: &AccessScope,
) -> anyhow::Result<Table> {
    if !validate_access(intent.filters(), scope) {
        tracing::warn!("requested parameters fall outside the admin's scope");
        return Ok(Table::empty(output_columns(intent.category()).iter().copied()));
    }

    match source {
        Source::Json => run(JsonRecordStore::new(&config.school_data_path), intent, scope),
        Source::Postgres => {
            let pool = connect(config).await?;
            let snapshot = db::load_snapshot(&pool).await?;
            run(snapshot, intent, scope)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Admins => {
            let roles = RoleDirectory::load(&config.admin_roles_path)?;
            if roles.all().is_empty() {
                println!("No administrators configured.");
                return Ok(());
            }

            println!("Administrators:");
            for admin in roles.all() {
                println!("- {} [{}]", admin, admin.id());
            }
        }
        Commands::Query {
            admin,
            intent_json,
            category,
            filters,
            confidence,
            source,
            format,
            out,
        } => {
            let roles = RoleDirectory::load(&config.admin_roles_path)?;
            let scope = roles
                .find(&admin)
                .with_context(|| format!("unknown administrator '{admin}'"))?;

            let intent = match intent_json {
                Some(raw) => Intent::from_parser_output(&raw),
                None => build_intent(category.as_deref().unwrap_or_default(), filters, confidence),
            };

            let query_id = Uuid::new_v4();
            let details = [
                ("Query", query_id.to_string()),
                ("Admin", scope.to_string()),
                ("Intent", intent.to_string()),
            ];
            let span = tracing::info_span!(
                "query",
                %query_id,
                admin = scope.id(),
                category = %intent.category()
            );
            let table = answer(&config, source, intent, scope)
                .instrument(span)
                .await?;

            match (format, out) {
                (Format::Markdown, None) => {
                    print!("{}", report::build_report("Query Results", &details, &table));
                }
                (Format::Markdown, Some(path)) => {
                    std::fs::write(&path, report::build_report("Query Results", &details, &table))?;
                    println!("{}; report written to {}.", report::summary_line(&table), path.display());
                }
                (Format::Csv, None) => {
                    report::write_csv(&table, std::io::stdout().lock())?;
                }
                (Format::Csv, Some(path)) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    report::write_csv(&table, file)?;
                    println!("{}; CSV written to {}.", report::summary_line(&table), path.display());
                }
            }
        }
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} rows).");
        }
        Commands::Import { table, csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, table, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
    }

    Ok(())
}
