//! dbsync CLI
//!
//! Command-line tool for synchronizing a database with its schema and
//! static-data documents.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dbsync::prelude::*;

/// Declarative schema and static-data synchronization.
#[derive(Parser)]
#[command(name = "dbsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:...` or `mysql://...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Schema document.
    #[arg(short, long, env = "DBSYNC_SCHEMA", default_value = "xml/dbschema.json")]
    schema: PathBuf,

    /// Static-data document.
    #[arg(long, env = "DBSYNC_STATIC", default_value = "xml/dbstatic.json")]
    static_data: PathBuf,

    /// Directory holding semaphore files.
    #[arg(long, env = "DBSYNC_LOCK_DIR")]
    lock_dir: Option<PathBuf>,

    /// Seconds to wait for the semaphore.
    #[arg(long, env = "DBSYNC_LOCK_TIMEOUT", default_value_t = 30)]
    lock_timeout: u64,

    /// Table holding the stored hashes.
    #[arg(long, default_value = "dbsync_state")]
    state_table: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Pass {
    Schema,
    Static,
}

impl From<Pass> for SyncKind {
    fn from(pass: Pass) -> Self {
        match pass {
            Pass::Schema => SyncKind::Schema,
            Pass::Static => SyncKind::Static,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the schema pass, then the static pass.
    Sync,

    /// Run the schema pass.
    Schema,

    /// Run the static pass.
    Static,

    /// Show whether the stored hashes match the documents.
    Check,

    /// Show the SQL a pass would run, without executing it.
    Plan {
        /// Pass to plan.
        #[arg(value_enum, default_value = "schema")]
        pass: Pass,
    },

    /// Show live tables and detected capabilities.
    Inspect,

    /// Show the derived schema the schema pass converges to.
    Catalog,
}

impl Cli {
    fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.database.clone())
            .schema_path(&self.schema)
            .static_path(&self.static_data)
            .lock_timeout(Duration::from_secs(self.lock_timeout))
            .state_table(self.state_table.clone());
        if let Some(dir) = &self.lock_dir {
            config = config.lock_dir(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let context = SyncContext::connect(cli.config()).await?;
    info!(backend = %context.backend(), "Connected");

    if let Commands::Inspect = cli.command {
        return inspect(&context).await;
    }

    let synchronizer = Synchronizer::from_config(context)?;
    match cli.command {
        Commands::Sync => {
            for report in synchronizer.bootstrap().await? {
                print!("{report}");
                println!();
            }
        }

        Commands::Schema => {
            let report = synchronizer.sync(SyncKind::Schema).await?;
            println!("{report}");
        }

        Commands::Static => {
            let report = synchronizer.sync(SyncKind::Static).await?;
            println!("{report}");
        }

        Commands::Check => {
            for kind in [SyncKind::Schema, SyncKind::Static] {
                let status = if synchronizer.check(kind).await? {
                    "up to date"
                } else {
                    "pending"
                };
                println!("{kind}: {status}");
            }
        }

        Commands::Plan { pass } => {
            let report = synchronizer.plan(pass.into()).await?;
            if report.statements.is_empty() {
                println!("-- {}: nothing to do", report.kind);
            }
            for line in &report.history {
                println!("-- {line}");
            }
            for sql in &report.statements {
                println!("{sql};");
            }
        }

        Commands::Catalog => print_catalog(synchronizer.catalog()),

        Commands::Inspect => {}
    }

    Ok(())
}

async fn inspect(context: &SyncContext) -> anyhow::Result<()> {
    let capabilities = context.capabilities();
    println!("Backend: {}", capabilities.backend);
    println!("Fulltext: {}", capabilities.fulltext);
    if !capabilities.engines.is_empty() {
        let engines: Vec<&str> = capabilities.engines.iter().map(String::as_str).collect();
        println!("Engines: {}", engines.join(", "));
    }

    let live = context.introspector().snapshot().await?;
    println!("\nTables ({}):", live.len());
    for name in live.table_names() {
        let Some(table) = live.get_table(name) else {
            continue;
        };
        println!("  {name}");
        for field in &table.fields {
            println!("    {} {}", field.name, field.sql_type);
        }
        for (index, fields) in &table.indexes {
            println!("    index {index} ({})", fields.join(", "));
        }
    }
    Ok(())
}

fn print_catalog(catalog: &SchemaCatalog) {
    println!("Backend: {}", catalog.backend());
    println!("Hash: {}", catalog.hash());
    println!("\nTables ({}):", catalog.tables().len());
    for table in catalog.tables() {
        println!("  {}", table.name);
        for field in &table.fields {
            match &field.foreign_key {
                Some(target) => println!("    {} {} -> {target}", field.name, field.sql_type),
                None => println!("    {} {}", field.name, field.sql_type),
            }
        }
        for index in &table.indexes {
            println!("    index {} ({})", index.name, index.fields.join(", "));
        }
    }

    let fulltext: Vec<&str> = catalog.fulltext_tables().collect();
    if !fulltext.is_empty() {
        println!("\nFulltext: {}", fulltext.join(", "));
    }
    if !catalog.ignored().is_empty() {
        let ignored: Vec<&str> = catalog.ignored().iter().map(String::as_str).collect();
        println!("Ignored: {}", ignored.join(", "));
    }
}
