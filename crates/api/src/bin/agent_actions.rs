use std::sync::Arc;

use webshim_agent::AgentConfig;
use webshim_api::app::routes::storage::InMemoryBucketCatalog;
use webshim_api::context::CatalogContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = webshim_api::server::bootstrap()?;

    let ctx = CatalogContext::new(Arc::new(InMemoryBucketCatalog::sample()));
    let agent = AgentConfig::default().with_invocation_path(config.agent_path.clone());
    let app = webshim_api::app::build_agent_app(ctx, agent);

    webshim_api::server::serve(&config, app).await
}
