use std::sync::Arc;

use clap::{Parser, Subcommand};

use adrelay::api;
use adrelay::config::CONFIG;
use adrelay::feed::FeedClient;
use adrelay::navigator::Navigator;

#[derive(Parser)]
#[command(name = "adrelay", about = "Relay for a syndicated search-ads feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the browser-facing proxy server
    Serve {
        /// Address to bind, e.g. 0.0.0.0:3000
        #[arg(long)]
        addr: Option<String>,
    },
    /// Run a one-shot search against the feed and print the listings
    Search {
        keyword: String,
        /// Market code sent to the feed
        #[arg(long)]
        market: Option<String>,
        /// Extra pages to fetch with the continuation token
        #[arg(long, default_value_t = 0)]
        pages: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { addr } => serve(addr).await,
        Command::Search {
            keyword,
            market,
            pages,
        } => search(keyword, market, pages).await,
    }
}

async fn serve(addr: Option<String>) -> anyhow::Result<()> {
    let addr = addr.unwrap_or_else(|| CONFIG.bind_addr.clone());
    let feed = Arc::new(FeedClient::from_config()?);
    let app = api::create_router(feed);

    log::info!("relaying {} on {addr}", CONFIG.feed_base_url);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn search(keyword: String, market: Option<String>, pages: usize) -> anyhow::Result<()> {
    let market = market.unwrap_or_else(|| CONFIG.default_market.clone());
    let navigator = Navigator::new(FeedClient::from_config()?, market);

    navigator.search(&keyword).await;
    for _ in 0..pages {
        if !navigator.has_more() {
            break;
        }
        navigator.load_more().await;
    }

    let session = navigator.snapshot();
    if let Some(error) = &session.error {
        println!("search failed: {error}");
        return Ok(());
    }
    if session.listings.is_empty() {
        println!("no results for '{}'", session.keyword);
        return Ok(());
    }
    for listing in &session.listings {
        println!("{}", listing.title.as_deref().unwrap_or("-- --"));
        if let Some(description) = &listing.description {
            println!("  {description}");
        }
        if let Some(url) = &listing.url {
            println!("  {url}");
        }
        println!();
    }
    if session.has_more() {
        println!("(more results available)");
    }
    Ok(())
}
