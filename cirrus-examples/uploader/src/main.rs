use anyhow::Result;
use uploader::Command;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let command = Command::parse(std::env::args().skip(1))?;
    uploader::run(command).await
}
