pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod logseq;
pub mod text;
pub mod timelog;

/// Install the `fmt` subscriber, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
