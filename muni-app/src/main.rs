use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let demo_mode = std::env::args().any(|arg| arg == "--demo");
    let result = if demo_mode {
        muni_app::run_demo().await
    } else {
        muni_app::run().await
    };

    if let Err(err) = result {
        eprintln!("muni-app failed: {err}");
        std::process::exit(1);
    }
}
