#[tokio::main]
async fn main() {
    if let Err(e) = doctriage::run().await {
        tracing::error!("Fatal: {e}");
        eprintln!("doctriage: {e}");
        std::process::exit(1);
    }
}
