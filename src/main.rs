#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ticketchain::server::run().await
}
