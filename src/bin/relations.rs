use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use detective::api::dto::RelationshipsQuery;
use detective::db::{migrate, Db};
use detective::store::SqliteStore;
use detective::{Config, PersonService, RelationshipType};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "relations")]
#[command(about = "Inspect and edit person relationships in the Detective database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the relationship neighborhood of a person
    Show {
        person_id: Uuid,
        /// Traversal depth (defaults to graph.default_depth)
        #[arg(short, long)]
        depth: Option<usize>,
        /// Comma-separated types to keep
        #[arg(long)]
        only: Option<String>,
        /// Comma-separated types to skip
        #[arg(long)]
        exclude: Option<String>,
        /// Keep a whole group: family or work
        #[arg(long)]
        group: Option<String>,
    },
    /// Print the relationship stored from one person to another
    Get { person1_id: Uuid, person2_id: Uuid },
    /// Create or replace the relationship between two persons
    Set {
        person1_id: Uuid,
        person2_id: Uuid,
        /// Relationship of person1 to person2, e.g. Parent
        kind: RelationshipType,
    },
    /// Delete the relationship between two persons
    Delete { person1_id: Uuid, person2_id: Uuid },
    /// Register a person and print the new id
    AddPerson {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List the known relationship types
    Types,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();

    if let Command::Types = args.command {
        for kind in RelationshipType::ALL {
            let group = kind
                .group()
                .map(|g| format!("{:?}", g).to_lowercase())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<14} inverse {:<14} group {:<7} {}", kind, kind.inverse(), group, kind.label());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .context("Failed to migrate database")?;

    let service = PersonService::new(Arc::new(SqliteStore::new(db)), config.graph.clone());

    match args.command {
        Command::Show {
            person_id,
            depth,
            only,
            exclude,
            group,
        } => {
            let query = RelationshipsQuery {
                depth,
                only,
                exclude,
                group,
            };
            let filter = query.type_filter()?;
            let edges = service
                .get_person_relationships(person_id, query.depth, &filter, &CancellationToken::new())
                .await?;

            if edges.is_empty() {
                println!("No relationships found for {}", person_id);
            }
            for edge in edges {
                println!("{}  is {}  of  {}", edge.person_id1, edge.kind, edge.person_id2);
            }
        }
        Command::Get {
            person1_id,
            person2_id,
        } => {
            let kind = service.get_persons_relationship(person1_id, person2_id).await?;
            println!("{}  is {}  of  {}", person1_id, kind, person2_id);
        }
        Command::Set {
            person1_id,
            person2_id,
            kind,
        } => {
            service
                .set_persons_relationship(person1_id, person2_id, kind)
                .await?;
            println!(
                "✓ {} is {} of {} ({} in reverse)",
                person1_id,
                kind,
                person2_id,
                kind.inverse()
            );
        }
        Command::Delete {
            person1_id,
            person2_id,
        } => {
            service.delete_relationship(person1_id, person2_id).await?;
            println!("✓ Relationship between {} and {} deleted", person1_id, person2_id);
        }
        Command::AddPerson { name } => {
            let person = service.create_person(name).await?;
            println!("{}", person.id);
        }
        Command::Types => {}
    }

    Ok(())
}
