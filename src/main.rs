use anyhow::Context;
use autobot::args::Args;
use autobot::config::ConfigLoader;
use autobot::logging::{init_logging, LoggingConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::for_verbosity(args.verbose))
        .map_err(|e| anyhow::anyhow!("无法初始化日志: {e}"))?;

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_config_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader
        .load(args.to_partial_config())
        .context("加载配置失败")?;

    let summary = autobot::app::run(&config).await?;
    if let Some(reason) = summary.halted {
        tracing::info!("本轮提前结束: {:?}", reason);
    }
    Ok(())
}
