use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fragmenter_cli::run().await
}
