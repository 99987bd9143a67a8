// Library root
// -----------
// Client for uploading videos to Vimeo with its resumable upload protocol.
// The binary (`main.rs`) only parses arguments and hands over to `ui`.
//
// Module responsibilities:
// - `transport`: one HTTP exchange behind the `Transport` trait.
// - `api`: `ApiClient`, credential headers and the read-only queries.
// - `upload`: the ticket / transfer / verify / complete session.
// - `picture`: thumbnail upload and activation.
// - `progress`: progress observer trait and the console bar.
// - `watch`: one pass over a drop folder.
// - `credentials`, `config`, `models`, `error`: supporting types.
// - `ui`: command-line commands and console output.
pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod picture;
pub mod progress;
pub mod transport;
pub mod ui;
pub mod upload;
pub mod watch;

pub use api::ApiClient;
pub use error::{Error, Result, TransportError};
pub use models::VideoId;

/// Initialize tracing for the CLI. Logs go to stderr so command output on
/// stdout stays clean; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
