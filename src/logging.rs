use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a fmt subscriber filtered by `RUST_LOG`. Returns false if a
/// global subscriber was already set; the library itself never calls this.
pub fn init() -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
