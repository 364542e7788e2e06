#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portfolio_server::start_server().await
}
