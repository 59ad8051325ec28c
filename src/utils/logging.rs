//! 日志工具模块
//!
//! 提供启动、批次、轮次日志格式化和输出的辅助函数

use tracing::info;

use crate::config::Config;
use crate::models::{BoardOutcome, Category};

/// 记录程序启动信息
pub fn log_startup(config: &Config, round: u32, model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - BOM / 坐标抽取验证循环");
    info!("📁 样本目录: {}", config.watch_root.display());
    info!("📊 每批并发数: {}", config.batch_size);
    info!("🔁 从第 {} 轮继续，当前模型: {}", round, model);
    if let Some(max_rounds) = config.max_rounds {
        info!("⏹️ 最大轮数: {}", max_rounds);
    }
    info!("{}", "=".repeat(60));
}

/// 记录轮次开始
pub fn log_round_start(round: u32, model: &str) {
    info!("\n{}", "=".repeat(60));
    info!("🔄 [Round {}] 开始 (模型: {})", round, model);
    info!("{}", "=".repeat(60));
}

/// 记录扫描结果
pub fn log_boards_loaded(total: usize, batch_size: usize) {
    info!("📌 待处理的板: 共 {} 个", total);
    if total > 0 {
        info!("📋 将以每批 {} 个的方式处理\n", batch_size);
    }
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始板编号
/// - `end`: 结束板编号
/// - `total`: 板总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "─".repeat(60));
    info!("⚡ 第 {}/{} 批 [{}~{}/{}]", batch_num, total_batches, start, end, total);
    info!("{}", "─".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("✓ 第 {} 批完成: 通过 {}/{}", batch_num, success, total);
}

/// 单块板的一行摘要，例如
/// `❌ [PWR] ⏸️ 종류:학습전 ✅ SET:일치 ❌ 좌표X:불일치(2건) ...`
pub fn format_board_summary(outcome: &BoardOutcome, round: u32) -> String {
    let mut parts = Vec::with_capacity(Category::ALL.len());

    if round >= 2 {
        parts.push(category_part(outcome, Category::ItemType));
    } else {
        parts.push(format!("⏸️ {}:학습전", Category::ItemType.label()));
    }
    for category in [
        Category::Quantity,
        Category::ItemName,
        Category::CoordX,
        Category::CoordY,
        Category::Rotation,
        Category::Side,
    ] {
        parts.push(category_part(outcome, category));
    }

    let icon = if outcome.success { "✅" } else { "❌" };
    format!("{} [{}] {}", icon, outcome.name, parts.join(" "))
}

fn category_part(outcome: &BoardOutcome, category: Category) -> String {
    let fail = outcome.stats.get(category).fail;
    if fail == 0 {
        format!("✅ {}:일치", category.label())
    } else {
        format!("❌ {}:불일치({}건)", category.label(), fail)
    }
}

/// 与上一轮相比的变化符号：▲ 增加，▼ 减少，- 持平
pub fn delta_sign(current: usize, previous: usize) -> (&'static str, usize) {
    if current > previous {
        ("▲", current - previous)
    } else if current < previous {
        ("▼", previous - current)
    } else {
        ("-", 0)
    }
}

/// 记录本轮结果以及与上一轮的对比
///
/// # 参数
/// - `previous`: 上一轮的 (通过, 失败)，首轮为 None
pub fn log_round_result(
    round: u32,
    success: usize,
    failed: usize,
    unresolved: usize,
    previous: Option<(usize, usize)>,
) {
    info!("\n{}", "=".repeat(60));
    info!(
        "📊 Round {} 结果: 通过 {} / 失败 {} / 未处理 {}",
        round, success, failed, unresolved
    );
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    if let Some((prev_success, prev_failed)) = previous {
        let (success_sign, success_delta) = delta_sign(success, prev_success);
        let (fail_sign, fail_delta) = delta_sign(failed, prev_failed);
        info!("   - 通过: {} ({} {})", success, success_sign, success_delta);
        info!("   - 失败: {} ({} {})", failed, fail_sign, fail_delta);
        if success > prev_success {
            info!("   => 比上一轮多通过 {} 块板", success_delta);
        } else if success < prev_success {
            info!("   => 比上一轮少通过 {} 块板", success_delta);
        } else {
            info!("   => 与上一轮持平");
        }
    }
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComparisonStats;

    fn outcome(stats: ComparisonStats, success: bool) -> BoardOutcome {
        BoardOutcome {
            name: "PWR".to_string(),
            year: "2024".to_string(),
            success,
            diffs: Vec::new(),
            stats,
            contributed_samples: true,
        }
    }

    #[test]
    fn test_board_summary_round_one_pauses_type() {
        let mut stats = ComparisonStats::default();
        stats.record(Category::CoordX, false);
        stats.record(Category::CoordX, false);

        let line = format_board_summary(&outcome(stats, false), 1);
        assert!(line.starts_with("❌ [PWR] ⏸️ 종류:학습전 ✅ SET:일치"));
        assert!(line.contains("❌ 좌표X:불일치(2건)"));
        assert!(line.ends_with("✅ 면:일치"));
    }

    #[test]
    fn test_board_summary_round_two_checks_type() {
        let line = format_board_summary(&outcome(ComparisonStats::default(), true), 2);
        assert!(line.starts_with("✅ [PWR] ✅ 종류:일치"));
    }

    #[test]
    fn test_delta_sign() {
        assert_eq!(delta_sign(5, 3), ("▲", 2));
        assert_eq!(delta_sign(1, 4), ("▼", 3));
        assert_eq!(delta_sign(2, 2), ("-", 0));
    }
}
