use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use url::Url;

use rewrite_proxy::rewrite::{self, RewriteContext};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Operator CLI for the rewriting proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the proxy liveness endpoint
    Health,
    /// Fetch a target through the running proxy and print the body
    Fetch {
        /// Absolute http(s) URL to fetch
        target: String,
    },
    /// Rewrite a local HTML/CSS file offline
    Rewrite {
        /// URL the document was fetched from
        #[arg(long)]
        base: String,
        /// Origin of the proxy, e.g. http://localhost:8080
        #[arg(long)]
        origin: String,
        /// Media type of the file
        #[arg(long, default_value = "text/html")]
        media_type: String,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/healthz", cli.url)).send().await?;
            print_json(res).await?;
        }
        Commands::Fetch { target } => {
            let res = client
                .get(format!("{}/proxy", cli.url))
                .query(&[("url", target.as_str())])
                .send()
                .await?;
            let status = res.status();
            if let Some(content_type) = res.headers().get(reqwest::header::CONTENT_TYPE) {
                eprintln!("{} ({})", status, content_type.to_str().unwrap_or("?"));
            } else {
                eprintln!("{}", status);
            }
            println!("{}", res.text().await?);
        }
        Commands::Rewrite {
            base,
            origin,
            media_type,
            file,
        } => {
            let body = std::fs::read_to_string(&file)?;
            let ctx = RewriteContext::new(Url::parse(&base)?, origin);
            println!("{}", rewrite::rewrite(&body, &media_type, &ctx));
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
