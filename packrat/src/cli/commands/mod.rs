use std::path::PathBuf;

use clap::Subcommand;

pub mod convert;
pub mod diff;
pub mod extract;
pub mod list;

use crate::pack::WarnSink;

/// Warning sink used by every command: streamed to stderr, never aborts
/// the batch.
pub(crate) fn stderr_warnings() -> WarnSink {
    WarnSink::new(|entry, message| {
        eprintln!("warning: {entry}: {message}");
    })
}

#[derive(Subcommand)]
pub enum Commands {
    /// List entries of one or more archives
    List {
        /// Archives to list (directories, .pak, .grp, .pk3/.zip)
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Only list entries whose name contains this substring (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes and timestamps
        #[arg(short, long)]
        long: bool,

        /// Print only the number of matching entries
        #[arg(long)]
        count: bool,
    },

    /// Merge archives into one output; later archives override earlier ones
    Convert {
        /// Source archives, in override order
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Output archive (format chosen by extension)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract archives into per-archive subfolders
    Extract {
        /// Archives to extract
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Directory to create the per-archive subfolders in
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,
    },

    /// Compare two archives by content
    Diff {
        /// First archive
        first: PathBuf,

        /// Second archive
        second: PathBuf,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Suppress the summary line
        #[arg(short, long)]
        quiet: bool,
    },
}

impl Commands {
    pub fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::List {
                archives,
                filter,
                long,
                count,
            } => list::execute(&archives, filter.as_deref(), long, count),
            Commands::Convert { sources, output } => convert::execute(&sources, &output),
            Commands::Extract {
                archives,
                destination,
            } => extract::execute(&archives, &destination),
            Commands::Diff {
                first,
                second,
                format,
                quiet,
            } => {
                let found = diff::execute(&first, &second, &format, quiet)?;
                if found {
                    // Differences map to a non-zero exit status.
                    std::process::exit(1);
                }
                Ok(())
            }
        }
    }
}
