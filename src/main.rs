#![allow(missing_docs)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    media_harvest_lib::run().await
}
