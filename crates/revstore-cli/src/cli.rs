use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use revstore_types::StoragePath;

#[derive(Parser)]
#[command(
    name = "revstore",
    about = "Revision-controlled blob storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage root holding one directory per file
    #[arg(long, global = true, default_value = ".revstore")]
    pub root: PathBuf,

    /// TOML engine configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a file
    Create(FileArgs),
    /// Delete a file and its storage directory
    Delete(FileArgs),
    /// Write a value at a path
    Write(WriteArgs),
    /// Read the value at a path
    Read(ReadArgs),
    /// Remove a path, or every path under a prefix
    Remove(RemoveArgs),
    /// List bound paths under a prefix
    List(ListArgs),
    /// Block until a path is bound
    Wait(WaitArgs),
    /// Show a file's revision and size
    Info(FileArgs),
    /// List files under the storage root
    Files,
}

#[derive(Args)]
pub struct FileArgs {
    pub file: String,
}

#[derive(Args)]
pub struct WriteArgs {
    pub file: String,
    pub path: StoragePath,
    pub value: String,
    /// Fail unless the path is currently unbound
    #[arg(long)]
    pub if_absent: bool,
}

#[derive(Args)]
pub struct ReadArgs {
    pub file: String,
    pub path: StoragePath,
    /// Read at an earlier revision
    #[arg(long)]
    pub rev: Option<u64>,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub file: String,
    pub path: StoragePath,
    #[arg(long)]
    pub prefix: bool,
}

#[derive(Args)]
pub struct ListArgs {
    pub file: String,
    pub prefix: StoragePath,
}

#[derive(Args)]
pub struct WaitArgs {
    pub file: String,
    pub path: StoragePath,
    /// Give up after this many milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create() {
        let cli = Cli::try_parse_from(["revstore", "create", "notes"]).unwrap();
        if let Command::Create(args) = cli.command {
            assert_eq!(args.file, "notes");
        } else { panic!("wrong command"); }
        assert_eq!(cli.root, PathBuf::from(".revstore"));
    }

    #[test]
    fn parse_write_if_absent() {
        let cli = Cli::try_parse_from(["revstore", "write", "notes", "/a/b", "hello", "--if-absent"]).unwrap();
        if let Command::Write(args) = cli.command {
            assert_eq!(args.path.as_str(), "/a/b");
            assert_eq!(args.value, "hello");
            assert!(args.if_absent);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_read_at_revision() {
        let cli = Cli::try_parse_from(["revstore", "read", "notes", "/a", "--rev", "3"]).unwrap();
        if let Command::Read(args) = cli.command {
            assert_eq!(args.rev, Some(3));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn rejects_invalid_path() {
        assert!(Cli::try_parse_from(["revstore", "read", "notes", "no-slash"]).is_err());
        assert!(Cli::try_parse_from(["revstore", "list", "notes", "/a//b"]).is_err());
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "revstore", "files", "--root", "/tmp/store", "--config", "revstore.toml", "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Files));
        assert_eq!(cli.root, PathBuf::from("/tmp/store"));
        assert_eq!(cli.config, Some(PathBuf::from("revstore.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_remove_prefix() {
        let cli = Cli::try_parse_from(["revstore", "remove", "notes", "/bakery", "--prefix"]).unwrap();
        if let Command::Remove(args) = cli.command {
            assert!(args.prefix);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_wait_timeout() {
        let cli = Cli::try_parse_from(["revstore", "wait", "notes", "/ready", "--timeout", "500"]).unwrap();
        if let Command::Wait(args) = cli.command {
            assert_eq!(args.timeout, Some(500));
        } else { panic!("wrong command"); }
    }
}
