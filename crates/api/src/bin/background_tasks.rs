use webshim_api::context::TaskContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = webshim_api::server::bootstrap()?;

    let (queue, runner) = webshim_api::server::start_task_runner(&config).await?;
    let ctx = TaskContext::new(queue, runner.stats_probe(), config.time_unit);
    let app = webshim_api::app::build_tasks_app(ctx);

    let served = webshim_api::server::serve(&config, app).await;

    // Whatever was deferred by the last requests still runs.
    runner.shutdown().await;
    served
}
