// src/main.rs
use grid_packer::{api, logging};
use grid_packer::config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    if let Err(err) = logging::init(app_config.log_level) {
        eprintln!("⚠️ Could not install logger: {}", err);
    }
    let packing = app_config.optimizer.packing_config();

    println!("🚀 Grid packer starting...");
    println!(
        "⚙️ max_candidates={}, min_box_divisor={}, rotations={}",
        packing.max_candidates, packing.min_box_divisor, packing.allow_item_rotation
    );

    let addr = app_config.api.socket_addr();
    if let Err(err) = api::start_api_server(app_config.api, app_config.optimizer).await {
        eprintln!("❌ API server on {} terminated with an error: {}", addr, err);
        std::process::exit(1);
    }
}
