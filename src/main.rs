#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dataanyone::app::run().await
}
