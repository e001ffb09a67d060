#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trialsage_server::start().await
}
