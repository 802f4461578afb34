use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gitvm-ledger",
    about = "GitVM audit ledger: tamper-evident, hash-chained receipts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Recompute the whole chain and check the root pointer
    Verify(DirArgs),
    /// Print the current root
    Root(DirArgs),
    /// Show the most recent receipts
    Log(LogArgs),
    /// Print raw log lines matching filters, with a resume cursor
    Slice(SliceArgs),
    /// Append one event read from a file or stdin
    Emit(EmitArgs),
    /// Repair a root pointer left behind by an interrupted append
    Reconcile(DirArgs),
    /// Start the HTTP read API
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct DirArgs {
    /// Ledger directory
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct LogArgs {
    pub dir: PathBuf,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct SliceArgs {
    pub dir: PathBuf,
    /// Byte offset to resume from
    #[arg(long, default_value = "0")]
    pub cursor: u64,
    #[arg(long)]
    pub since_ts: Option<i64>,
    #[arg(long)]
    pub until_ts: Option<i64>,
    /// Start strictly after the receipt with this root
    #[arg(long)]
    pub since_root: Option<String>,
    /// Stop strictly before the receipt with this root
    #[arg(long)]
    pub until_root: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct EmitArgs {
    pub dir: PathBuf,
    /// Event JSON file; stdin when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Ledger directory (overrides `ledger_dir` from the config file)
    #[arg(long)]
    pub ledger: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_verify() {
        let cli = Cli::try_parse_from(["gitvm-ledger", "verify", "/var/ledger"]).unwrap();
        if let Command::Verify(args) = cli.command {
            assert_eq!(args.dir, PathBuf::from("/var/ledger"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn verify_requires_dir() {
        assert!(Cli::try_parse_from(["gitvm-ledger", "verify"]).is_err());
    }

    #[test]
    fn parse_log_limit() {
        let cli = Cli::try_parse_from(["gitvm-ledger", "log", "ledger", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.limit, 5);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_slice_filters() {
        let cli = Cli::try_parse_from([
            "gitvm-ledger",
            "slice",
            "ledger",
            "--cursor",
            "128",
            "--since-ts",
            "1000",
            "--until-root",
            "b3:ff",
            "--limit",
            "10",
        ])
        .unwrap();
        if let Command::Slice(args) = cli.command {
            assert_eq!(args.cursor, 128);
            assert_eq!(args.since_ts, Some(1000));
            assert_eq!(args.until_ts, None);
            assert_eq!(args.until_root.as_deref(), Some("b3:ff"));
            assert_eq!(args.limit, Some(10));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_emit_from_file() {
        let cli =
            Cli::try_parse_from(["gitvm-ledger", "emit", "ledger", "--file", "event.json"]).unwrap();
        if let Command::Emit(args) = cli.command {
            assert_eq!(args.file, Some(PathBuf::from("event.json")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "gitvm-ledger",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--ledger",
            "/srv/ledger",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
            assert_eq!(args.ledger, Some(PathBuf::from("/srv/ledger")));
            assert!(args.config.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        assert!(Cli::try_parse_from(["gitvm-ledger", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["gitvm-ledger", "--verbose", "root", "ledger"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["gitvm-ledger", "--format", "json", "reconcile", "ledger"])
            .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
