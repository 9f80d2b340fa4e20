use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use school_admin::authz::Role;
use school_admin::db::SqliteStore;
use school_admin::models::user::UserCreateRequest;
use school_admin::services::users;

#[derive(Parser, Debug)]
#[command(author, version, about = "school-admin maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration {
        name: String,
        /// Write an .up.sql/.down.sql pair so the migration can be rolled back
        #[arg(long, short)]
        reversible: bool,
    },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the latest applied reversible migration
    MigrateRollback,
    /// Create an admin account. Admins cannot self-register over the API.
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

/// Database handle plus the migration set found on disk.
struct Maintenance {
    pool: SqlitePool,
    migrator: Migrator,
}

impl Maintenance {
    async fn connect() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to database")?;

        let dir = migrations_dir();
        let migrator = Migrator::new(dir.clone())
            .await
            .with_context(|| format!("failed to load migrations from {}", dir.display()))?;

        Ok(Self { pool, migrator })
    }

    /// Successfully applied versions, empty before the first run.
    async fn applied_versions(&self) -> anyhow::Result<Vec<i64>> {
        let has_table = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !has_table {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("version").map_err(Into::into))
            .collect()
    }

    async fn print_status(&self) -> anyhow::Result<()> {
        let applied: HashSet<i64> = self.applied_versions().await?.into_iter().collect();

        println!("{:<8} {:<16} {}", "Status", "Version", "Name");
        for migration in self.migrator.iter().filter(|m| !m.migration_type.is_down_migration()) {
            let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
            let name = match migration.description.trim() {
                "" => "unknown",
                desc => desc,
            };
            println!("{:<8} {:<16} {}", status, migration.version, name);
        }
        Ok(())
    }

    /// Reverts only the newest applied version. Returns it, or `None` when
    /// nothing is applied.
    async fn rollback_latest(&self) -> anyhow::Result<Option<i64>> {
        let applied = self.applied_versions().await?;
        let Some((&latest, rest)) = applied.split_last() else {
            return Ok(None);
        };

        let reversible = self
            .migrator
            .iter()
            .any(|m| m.version == latest && m.migration_type.is_down_migration());
        if !reversible {
            anyhow::bail!("migration {latest} has no .down.sql and cannot be rolled back");
        }

        let target = rest.last().copied().unwrap_or(0);
        self.migrator
            .undo(&self.pool, target)
            .await
            .with_context(|| format!("failed to roll back migration {latest}"))?;
        Ok(Some(latest))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // fall back to the crate-local .env when the CWD has none
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    match Cli::parse().command {
        Commands::MakeMigration { name, reversible } => {
            for path in write_migration(&name, reversible)? {
                println!("Created migration: {}", path.display());
            }
        }
        Commands::MigrateRun => {
            let db = Maintenance::connect().await?;
            db.migrator.run(&db.pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            Maintenance::connect().await?.print_status().await?;
        }
        Commands::MigrateRollback => match Maintenance::connect().await?.rollback_latest().await? {
            Some(version) => println!("Rolled back migration {version}"),
            None => println!("Nothing to roll back"),
        },
        Commands::CreateAdmin { name, email, password } => {
            let db = Maintenance::connect().await?;
            db.migrator.run(&db.pool).await?;

            let store = SqliteStore::new(db.pool);
            let request = UserCreateRequest {
                name: Some(name),
                email: Some(email),
                password: Some(password),
                role: Some(Role::Admin),
                ..Default::default()
            };
            let admin = users::create_user(&store, request)
                .await
                .map_err(|err| anyhow::anyhow!("failed to create admin: {err}"))?;
            println!("Created admin {} ({})", admin.email, admin.id);
        }
    }

    Ok(())
}

/// `./migrations` when run from the repo root, else the crate's own folder.
fn migrations_dir() -> PathBuf {
    let local = Path::new("migrations");
    if local.is_dir() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }
}

/// File stem `<version>_<slug>`, where the version is the all-digit UTC
/// timestamp sqlx orders migrations by.
fn migration_stem(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), slug)
}

fn write_migration(name: &str, reversible: bool) -> anyhow::Result<Vec<PathBuf>> {
    let dir = migrations_dir();
    let stem = migration_stem(name);
    let files: Vec<(PathBuf, &str)> = if reversible {
        vec![
            (dir.join(format!("{stem}.up.sql")), "-- Write your migration SQL here\n"),
            (dir.join(format!("{stem}.down.sql")), "-- Undo the matching .up.sql here\n"),
        ]
    } else {
        vec![(dir.join(format!("{stem}.sql")), "-- Write your migration SQL here\n")]
    };

    if let Some((existing, _)) = files.iter().find(|(path, _)| path.exists()) {
        anyhow::bail!("migration already exists: {}", existing.display());
    }
    for (path, body) in &files {
        fs::write(path, body).with_context(|| format!("failed to create migration at {}", path.display()))?;
    }

    Ok(files.into_iter().map(|(path, _)| path).collect())
}
