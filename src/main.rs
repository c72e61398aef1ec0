use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use marginalia::capture::{ADD_COMMENT_COMMAND, ADD_COMMENT_COMMAND_NAME};
use marginalia::commands::{self, Target};
use marginalia::{Error, ErrorClass, diagnostics, vault, watch};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "marginalia", about = "Highlight comments for markdown, kept outside the document")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Vault root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = ADD_COMMENT_COMMAND, visible_alias = "add", about = ADD_COMMENT_COMMAND_NAME)]
    Add {
        /// Comment text; read from stdin when omitted
        #[arg(long, short)]
        comment: Option<String>,
        /// Document path, relative to the vault root
        document: String,
        /// Exclusive end offset (with --start)
        #[arg(long, requires = "start", conflicts_with = "quote")]
        end: Option<usize>,
        /// Which occurrence of the quote to select, starting at 1
        #[arg(long, default_value_t = 1, requires = "quote")]
        occurrence: usize,
        /// Text to highlight, as it appears in the rendered document
        #[arg(long, short, required_unless_present = "start")]
        quote: Option<String>,
        /// Inclusive start offset (with --end)
        #[arg(long, requires = "end")]
        start: Option<usize>,
    },
    /// List stored comments
    List {
        /// Only this document
        document: Option<String>,
    },
    /// Move inline %%highlight-start%% markers into the comment store
    Migrate {
        /// Document path, relative to the vault root
        document: String,
        /// Show what would be migrated without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete a comment by its list index
    Remove {
        /// Document path, relative to the vault root
        document: String,
        /// Index shown by `list`
        index: usize,
    },
    /// Render documents to HTML with comments overlaid
    Render {
        /// Only this document; all documents when omitted
        document: Option<String>,
        /// Print the page instead of writing it to the output directory
        #[arg(long, requires = "document")]
        stdout: bool,
    },
    /// Print a document's rendered text with character offsets
    Text {
        /// Document path, relative to the vault root
        document: String,
    },
    /// Render everything, then re-render as documents and comments change
    Watch,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Add { comment, document, end, occurrence, quote, start } => {
            let target = match (quote, start, end) {
                (Some(text), _, _) => Target::Quote { occurrence, text },
                (None, Some(start), Some(end)) => Target::Offsets { end, start },
                (None, _, _) => {
                    diagnostics::print_error(&Error::EmptySelection);
                    return ExitCode::from(1);
                },
            };
            commands::add(&cli.root, &document, target, comment)
        },
        Commands::List { document } => commands::list(&cli.root, document.as_deref()),
        Commands::Migrate { document, dry_run } => commands::migrate(&cli.root, &document, dry_run),
        Commands::Remove { document, index } => commands::remove(&cli.root, &document, index),
        Commands::Render { document, stdout } => commands::render(&cli.root, document.as_deref(), stdout),
        Commands::Text { document } => commands::text(&cli.root, &document),
        Commands::Watch => vault::Vault::open(&cli.root).and_then(watch::run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            exit_code_for(&e)
        },
    }
}

/// Exit code priority: validation (1), storage or corrupt store (2), anything else (3).
fn exit_code_for(e: &Error) -> ExitCode {
    match e.class() {
        ErrorClass::Validation => ExitCode::from(1),
        ErrorClass::CorruptStore | ErrorClass::Storage => ExitCode::from(2),
        ErrorClass::Runtime => ExitCode::from(3),
    }
}

/// Log to stderr, filtered by `MARGINALIA_LOG` (falling back to `RUST_LOG`), default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("MARGINALIA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
