#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = webshim_api::server::bootstrap()?;

    let app = webshim_api::app::build_hello_app();

    webshim_api::server::serve(&config, app).await
}
