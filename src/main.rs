use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file when present.
    // Deployed instances configure the process environment directly.
    dotenvy::dotenv().ok();

    api::start().await?;

    Ok(())
}
