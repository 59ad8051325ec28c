use anyhow::Result;
use bom_verify_loop::{logger, App, Config, RunOutcome};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::load()?;

    // 初始化并运行应用
    let mut app = App::initialize(config).await?;
    match app.run().await? {
        RunOutcome::Converged { round } => info!("✅ 第 {} 轮收敛", round),
        RunOutcome::RoundLimitReached { rounds } => info!("⏹️ 已运行 {} 轮，未收敛", rounds),
    }

    Ok(())
}
