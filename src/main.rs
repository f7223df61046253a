use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use detective::api::HttpServer;
use detective::db::{migrate, Db};
use detective::error::DetectiveError;
use detective::store::{MemoryStore, SqliteStore, Store};
use detective::{Config, PersonService};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "detective")]
#[command(about = "Relationship graph service for Detective case files", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Keep persons and relationships in memory instead of SQLite
        #[arg(long)]
        in_memory: bool,
    },
    /// Apply migrations and verify the database schema (default)
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.detective.log_level.as_str()),
    )
    .init();

    match args.command.unwrap_or(Command::Verify) {
        Command::Serve { in_memory } => run_http_server(config, in_memory).await?,
        Command::Verify => run_schema_verification(config).await?,
    }

    Ok(())
}

/// Open the configured database and bring its schema up to date
async fn open_database(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;

    log::info!("Database initialized: {}", db.path().display());
    Ok(db)
}

async fn run_http_server(config: Config, in_memory: bool) -> Result<()> {
    log::info!("Starting Detective v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn Store> = if in_memory {
        log::warn!("Using the in-memory store: data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::new(open_database(&config).await?))
    };

    let service = Arc::new(PersonService::new(store, config.graph.clone()));
    let server = HttpServer::new(service, &config.http_server)?;
    server
        .run(&config.http_server.host, config.http_server.port)
        .await?;

    Ok(())
}

async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Detective v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Database path: {}", config.db_path().display());
    log::info!(
        "Traversal depth: default {}, max {}",
        config.graph.default_depth,
        config.graph.max_depth
    );

    let db = open_database(&config).await?;
    verify_database_schema(&db).await?;

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["persons", "relationships", "schema_migrations"];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if tables.iter().any(|t| t == table) {
                log::debug!("✓ Table exists: {}", table);
            } else {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            }
        }
        if !all_tables_exist {
            return Err(DetectiveError::Config(
                "Not all required tables exist".to_string(),
            ));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let index_exists: bool = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name='idx_relationships_person2'")?
            .exists([])?;
        if !index_exists {
            log::warn!("Index idx_relationships_person2 not found: reverse lookups will scan");
        }

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(DetectiveError::Config(format!(
                "Journal mode is not WAL: {}",
                journal_mode
            )));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(DetectiveError::Config(
                "Foreign keys not enabled".to_string(),
            ));
        }

        // Rows whose reverse row is missing
        let broken_pairs: i64 = conn.query_row(
            "SELECT COUNT(*) FROM relationships r
             WHERE NOT EXISTS (
                 SELECT 1 FROM relationships o
                 WHERE o.person1_id = r.person2_id AND o.person2_id = r.person1_id
             )",
            [],
            |row| row.get(0),
        )?;
        if broken_pairs > 0 {
            return Err(DetectiveError::StoreConsistency(format!(
                "{} relationship rows have no reverse row",
                broken_pairs
            )));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(DetectiveError::Config(format!(
                "Database integrity check failed: {}",
                integrity
            )));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    })
    .await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
