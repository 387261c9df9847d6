use webshim_api::context::StreamContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = webshim_api::server::bootstrap()?;

    let app = webshim_api::app::build_streaming_app(StreamContext::from_time_unit(config.time_unit));

    webshim_api::server::serve(&config, app).await
}
