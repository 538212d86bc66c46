#[tokio::main]
async fn main() {
    pilldoc::services::settings::load_dotenv();
    if let Err(err) = pilldoc::mcp::server::run_stdio().await {
        eprintln!("pilldoc: {}", err);
        std::process::exit(1);
    }
}
