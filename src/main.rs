#[tokio::main]
async fn main() {
    org_block_language_server::run().await;
}
