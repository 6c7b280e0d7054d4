#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boxoffice::server::run().await
}
