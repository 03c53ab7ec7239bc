use anyhow::Context;
use std::env;
use tokio::io::AsyncReadExt;
use unifs::{BackendConfig, FileSystem};

/// Copies a local file into a backend described by a JSON config, lists
/// the target directory and reads the file back.
///
/// `cargo run --example transfer -- '{"type":"sftp","host":"localhost","user":"root","password":"pass"}' ./Cargo.toml /tmp/unifs-demo`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let config: BackendConfig =
        serde_json::from_str(&args.next().context("missing backend config")?)?;
    let source = args.next().context("missing source file")?;
    let target_dir = args.next().context("missing target directory")?;

    let local = unifs::LocalFileSystem::new();
    let remote = unifs::connect(&config).await?;

    let name = source.rsplit('/').next().unwrap_or(&source);
    let target = format!("{}/{}", target_dir.trim_end_matches('/'), name);

    remote.mkdir(&target_dir, true).await?;
    remote.put(local.get(&source).await?, &target).await?;

    for entry in remote.list(&target_dir).await? {
        println!(
            "{:>10} {}{}",
            entry.size().map_or("-".to_owned(), |s| s.to_string()),
            entry.name(),
            if entry.is_dir() { "/" } else { "" }
        );
    }

    let mut copy = Vec::new();
    remote.get(&target).await?.read_to_end(&mut copy).await?;
    println!("read back {} bytes from {target}", copy.len());

    remote.close().await?;
    Ok(())
}
