mod input;
mod network;

use clap::Parser;
use shared::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT))]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let client = network::Client::connect(&args.server).await?;
    println!("Type /help for local commands");

    client.run().await?;

    // stdin is read on a blocking thread; don't wait for it to finish.
    std::process::exit(0);
}
