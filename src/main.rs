#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examgrader_rust::run().await {
        eprintln!("examgrader-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
