#[tokio::main]
async fn main() {
    if let Err(e) = led_scales_lib::run().await {
        log::error!("{}", e);
        eprintln!("led-scales: {}", e);
        std::process::exit(1);
    }
}
