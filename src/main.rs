use glidepath::cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        error!(error = %e, "glidepathd exited with an error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
