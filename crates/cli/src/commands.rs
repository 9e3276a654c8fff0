use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Extract, assemble and upload every configured key range
    Run {
        #[arg(long, help = "Job file path")]
        config: PathBuf,
    },
    /// Resolve data source columns and print the index mapping
    Probe {
        #[arg(long, help = "Job file path")]
        config: PathBuf,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Print the key-range slices a run would extract
    Ranges {
        #[arg(long, help = "Job file path")]
        config: PathBuf,
    },
    /// Test a connection string against a given driver
    TestConn {
        /// Driver: "postgres", "mysql", …
        #[arg(long)]
        driver: String,

        /// Connection string
        #[arg(long)]
        url: String,
    },
}
