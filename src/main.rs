use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;

use tk_rewards::http;
use tk_rewards::store::Store;

/// Reward backend for the Telegram mini-app: the ad network's postback
/// endpoint plus the account/spin/withdraw API the webview talks to.
#[derive(Debug, Parser)]
#[command(name = "tk-rewards", version, about)]
struct Opts {
    /// Address to listen on.
    #[arg(long, env = "TK_BIND", default_value = "0.0.0.0:8080")]
    bind: String,
    /// Path of the JSON state snapshot. Omit for a volatile in-memory
    /// store (useful for local development only).
    #[arg(long, env = "TK_STATE_FILE")]
    state_file: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let opts = Opts::parse();
    let store = match &opts.state_file {
        Some(path) => Store::open(path.clone()).map_err(std::io::Error::other)?,
        None => {
            log::warn!("no --state-file given; ledger state will not survive a restart");
            Store::in_memory()
        }
    };
    let store = web::Data::new(store);

    log::info!("listening on {}", opts.bind);
    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            // The ad network's servers and the Telegram webview call in
            // from origins we do not control.
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(http::configure)
    })
    .bind(&opts.bind)?
    .run()
    .await
}
