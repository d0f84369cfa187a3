//! atrium-server binary
//!
//! Loads the room document, then serves the room protocol over WebSockets.
//!
//! ## Configuration (env / CLI via `clap`)
//!
//! | Key          | Default                 | Description                      |
//! |--------------|-------------------------|----------------------------------|
//! | `CLIENT_URL` | `http://localhost:5173` | Allowed cross-origin caller      |
//! | `PORT`       | `3000`                  | Listening port                   |
//! | `ROOMS_FILE` | `rooms.json`            | Persisted room document path     |

use anyhow::Result;
use atrium::coordinator::RoomCoordinator;
use atrium::server::{router, AppState};
use atrium::store::{spawn_persist_writer, RoomStore};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "atrium-server", about = "Atrium Room Service", version)]
struct Args {
    /// Allowed cross-origin caller
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:5173")]
    client_url: String,

    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Persisted room document
    #[arg(long, env = "ROOMS_FILE", default_value = "rooms.json")]
    rooms_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atrium=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    // No usable room document is a refusal to start, not a degraded boot.
    let mut store = RoomStore::load(&args.rooms_file)?;
    store.set_writer(spawn_persist_writer(args.rooms_file.clone()));

    let state = AppState::new(RoomCoordinator::new(store));
    let app = router(state, &args.client_url);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    log::info!(
        "atrium-server listening on {} (allowed origin: {})",
        addr,
        args.client_url
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("atrium-server shutting down (SIGINT)");
        })
        .await?;

    Ok(())
}
