use pixels::{Config, app};

use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // An address given on the command line wins over PIXELS_ADDR
    let config = Config::from_env().with_args(env::args().skip(1));

    app::run(config).await?;

    Ok(())
}
