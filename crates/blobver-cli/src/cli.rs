use std::path::PathBuf;

use blobver_types::PathTemplate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blobver",
    about = "blobver: publish standard input as versioned and latest blobs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the store's containers [default: .]
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Publish standard input as a direct and/or latest blob
    Upload(UploadArgs),
    /// Write the latest blob to standard output
    Latest(LatestArgs),
    /// Delete consecutive duplicate direct blobs
    Collapse(CollapseArgs),
}

#[derive(Args)]
pub struct TargetArgs {
    /// The container name
    #[arg(short, long)]
    pub container: String,

    /// Path template with one `{0}` placeholder
    #[arg(short = 'f', long, default_value = "{0}.txt")]
    pub path_format: PathTemplate,
}

#[derive(Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Content type to set on the blobs
    #[arg(short = 't', long, default_value = "text/plain")]
    pub content_type: String,

    /// Don't upload the direct blob
    #[arg(long)]
    pub no_direct: bool,

    /// Don't upload the latest blob
    #[arg(long, conflicts_with = "no_direct")]
    pub no_latest: bool,

    /// Only upload if the content differs from the latest blob
    #[arg(short = 'u', long)]
    pub only_unique: bool,

    /// Compare content as JSON values when deciding uniqueness
    #[arg(long, requires = "only_unique")]
    pub json_equality: bool,

    /// Use sequence numbers instead of timestamps for direct blobs
    #[arg(long)]
    pub number: bool,

    /// Use this sequence number instead of the next one
    #[arg(long, requires = "number")]
    pub next_number: Option<u64>,

    /// Expected ETag of the latest-number marker
    #[arg(long, requires = "number")]
    pub marker_etag: Option<String>,

    /// Expected ETag of the latest blob [default: its current ETag]
    #[arg(long, conflicts_with = "only_unique")]
    pub latest_etag: Option<String>,

    /// Overwrite the latest blob unconditionally
    #[arg(long, conflicts_with = "latest_etag")]
    pub no_etags: bool,
}

#[derive(Args)]
pub struct LatestArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args)]
pub struct CollapseArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Order direct blobs by sequence number instead of by name
    #[arg(long)]
    pub numeric: bool,

    /// Report what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_upload_defaults() {
        let cli = Cli::try_parse_from(["blobver", "upload", "-c", "logs"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.log_level(), tracing::Level::INFO);
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.target.container, "logs");
            assert_eq!(args.target.path_format.as_str(), "{0}.txt");
            assert_eq!(args.content_type, "text/plain");
            assert!(!args.no_direct && !args.no_latest && !args.only_unique && !args.number);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_upload_number_override() {
        let cli = Cli::try_parse_from([
            "blobver",
            "upload",
            "-c",
            "logs",
            "-f",
            "runs/{0}.json",
            "--number",
            "--next-number",
            "5",
            "--marker-etag",
            "\"0x1\"",
        ])
        .unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.next_number, Some(5));
            assert_eq!(args.marker_etag.as_deref(), Some("\"0x1\""));
            assert_eq!(args.target.path_format.suffix(), ".json");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn rejects_invalid_template() {
        assert!(Cli::try_parse_from(["blobver", "upload", "-c", "x", "-f", "static.txt"]).is_err());
        assert!(Cli::try_parse_from(["blobver", "upload", "-c", "x", "-f", "{1}.txt"]).is_err());
    }

    #[test]
    fn rejects_uploading_nothing() {
        assert!(
            Cli::try_parse_from(["blobver", "upload", "-c", "x", "--no-direct", "--no-latest"])
                .is_err()
        );
    }

    #[test]
    fn number_flags_require_number_mode() {
        assert!(Cli::try_parse_from(["blobver", "upload", "-c", "x", "--next-number", "3"]).is_err());
        assert!(Cli::try_parse_from(["blobver", "upload", "-c", "x", "--json-equality"]).is_err());
    }

    #[test]
    fn container_is_required() {
        assert!(Cli::try_parse_from(["blobver", "latest"]).is_err());
    }

    #[test]
    fn parse_collapse_with_globals() {
        let cli = Cli::try_parse_from([
            "blobver", "collapse", "-c", "logs", "--numeric", "--dry-run", "-q", "--format",
            "json", "--root", "/tmp/store",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), tracing::Level::WARN);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/store")));
        if let Command::Collapse(args) = cli.command {
            assert!(args.numeric && args.dry_run);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["blobver", "latest", "-c", "x", "-v", "-q"]).is_err());
    }
}
