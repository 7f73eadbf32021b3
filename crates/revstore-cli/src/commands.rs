use anyhow::Context;
use colored::Colorize;

use revstore_file::{FileConfig, LocalFile, LocalFileStore};
use revstore_txn::{TransactionOp, TransactionSpec};
use revstore_types::{Blob, StorageId};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FileConfig::default(),
    };
    let store = LocalFileStore::new(&cli.root, config);

    match cli.command {
        Command::Create(args) => cmd_create(&store, args).await,
        Command::Delete(args) => cmd_delete(&store, args).await,
        Command::Write(args) => cmd_write(&store, args).await,
        Command::Read(args) => cmd_read(&store, args).await,
        Command::Remove(args) => cmd_remove(&store, args).await,
        Command::List(args) => cmd_list(&store, args).await,
        Command::Wait(args) => cmd_wait(&store, args).await,
        Command::Info(args) => cmd_info(&store, args).await,
        Command::Files => cmd_files(&store).await,
    }
}

fn display_blob(blob: &Blob) -> String {
    match blob.as_str() {
        Some(text) => text.to_string(),
        None => format!("<{} bytes, {}>", blob.len(), blob.hash().short_hex()),
    }
}

async fn transact(
    file: &LocalFile,
    ops: Vec<TransactionOp>,
) -> anyhow::Result<revstore_txn::TransactionResult> {
    let spec = TransactionSpec::new(ops)?;
    Ok(file.transact(&spec).await?)
}

async fn cmd_create(store: &LocalFileStore, args: FileArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    if file.create().await? {
        file.flush().await?;
        println!("{} Created {} in {}", "✓".green().bold(), args.file.bold(), file.dir().display());
    } else {
        println!("{} already exists", args.file.bold());
    }
    Ok(())
}

async fn cmd_delete(store: &LocalFileStore, args: FileArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    if file.delete().await? {
        file.flush().await?;
        println!("{} Deleted {}", "✓".green().bold(), args.file.bold());
    } else {
        println!("{} does not exist", args.file.bold());
    }
    Ok(())
}

async fn cmd_write(store: &LocalFileStore, args: WriteArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let mut ops = Vec::new();
    if args.if_absent {
        ops.push(TransactionOp::check_path_absent(args.path.clone()));
    }
    ops.push(TransactionOp::write_path(args.path.clone(), Blob::from(args.value.as_str())));

    let result = transact(&file, ops).await?;
    file.flush().await?;
    println!(
        "{} {} → revision {}",
        "✓".green().bold(),
        args.path.as_str().cyan(),
        result.new_rev_num.unwrap_or(result.rev_num).to_string().yellow()
    );
    Ok(())
}

async fn cmd_read(store: &LocalFileStore, args: ReadArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let snapshot = file.snapshot(args.rev).await?;
    match snapshot.get_path(&args.path) {
        Some(blob) => println!("{}", display_blob(blob)),
        None => anyhow::bail!("{} is not bound at revision {}", args.path, snapshot.rev_num()),
    }
    Ok(())
}

async fn cmd_remove(store: &LocalFileStore, args: RemoveArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let op = if args.prefix {
        TransactionOp::delete_path_prefix(args.path.clone())
    } else {
        TransactionOp::delete_path(args.path.clone())
    };
    let result = transact(&file, vec![op]).await?;
    file.flush().await?;
    println!(
        "{} Removed {}{} → revision {}",
        "✓".green().bold(),
        args.path.as_str().cyan(),
        if args.prefix { "/**" } else { "" },
        result.new_rev_num.unwrap_or(result.rev_num).to_string().yellow()
    );
    Ok(())
}

async fn cmd_list(store: &LocalFileStore, args: ListArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let result = transact(&file, vec![TransactionOp::list_path_prefix(args.prefix)]).await?;
    let paths = result.paths.unwrap_or_default();
    if paths.is_empty() {
        println!("No paths.");
    }
    for path in paths {
        println!("{path}");
    }
    Ok(())
}

async fn cmd_wait(store: &LocalFileStore, args: WaitArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let mut ops = vec![TransactionOp::when_path_present(args.path.clone())];
    if let Some(msec) = args.timeout {
        ops.push(TransactionOp::timeout(msec));
    }
    let result = transact(&file, ops).await?;
    println!(
        "{} {} bound at revision {}",
        "✓".green().bold(),
        args.path.as_str().cyan(),
        result.rev_num.to_string().yellow()
    );
    Ok(())
}

async fn cmd_info(store: &LocalFileStore, args: FileArgs) -> anyhow::Result<()> {
    let file = store.file(&args.file)?;
    let snapshot = file.snapshot(None).await?;
    let (paths, blobs) = snapshot
        .entries()
        .fold((0usize, 0usize), |(paths, blobs), (id, _)| match id {
            StorageId::Path(_) => (paths + 1, blobs),
            StorageId::Hash(_) => (paths, blobs + 1),
        });
    println!("File {}", args.file.bold());
    println!("  Directory: {}", file.dir().display());
    println!("  Revision: {}", snapshot.rev_num().to_string().yellow());
    println!("  Paths: {paths}");
    println!("  Blobs: {blobs}");
    Ok(())
}

async fn cmd_files(store: &LocalFileStore) -> anyhow::Result<()> {
    let ids = store.file_ids().await?;
    if ids.is_empty() {
        println!("No files under {}.", store.root().display());
    }
    for id in ids {
        let file = store.file(&id)?;
        if file.exists().await? {
            println!("{} (revision {})", id.bold(), file.current_rev_num().await?);
        } else {
            println!("{} {}", id.bold(), "(no revisions)".dimmed());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use revstore_types::StoragePath;

    async fn run(root: &std::path::Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["revstore", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap()).await
    }

    #[tokio::test]
    async fn write_then_read_persists() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["create", "notes"]).await.unwrap();
        run(root.path(), &["write", "notes", "/a", "hello"]).await.unwrap();

        let store = LocalFileStore::new(root.path(), FileConfig::default());
        let snapshot = store.file("notes").unwrap().snapshot(None).await.unwrap();
        assert_eq!(snapshot.rev_num(), 1);
        assert_eq!(
            snapshot.get_path(&StoragePath::parse("/a").unwrap()).and_then(Blob::as_str),
            Some("hello")
        );
        run(root.path(), &["read", "notes", "/a"]).await.unwrap();
    }

    #[tokio::test]
    async fn write_if_absent_refuses_overwrite() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["create", "notes"]).await.unwrap();
        run(root.path(), &["write", "notes", "/a", "1", "--if-absent"]).await.unwrap();
        assert!(run(root.path(), &["write", "notes", "/a", "2", "--if-absent"]).await.is_err());
    }

    #[tokio::test]
    async fn commands_on_missing_file_fail() {
        let root = tempfile::tempdir().unwrap();
        assert!(run(root.path(), &["read", "ghost", "/a"]).await.is_err());
        assert!(run(root.path(), &["write", "ghost", "/a", "x"]).await.is_err());
        run(root.path(), &["files"]).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["create", "notes"]).await.unwrap();
        assert!(root.path().join("notes").exists());
        run(root.path(), &["delete", "notes"]).await.unwrap();
        assert!(!root.path().join("notes").exists());
    }
}
