use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = fleet_console::cli::run() {
        tracing::error!(error = %e, "command failed");
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
