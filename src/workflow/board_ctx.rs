//! 板处理上下文
//!
//! 封装"第几轮、这一批里的第几块板、用哪个模型"这一信息

use std::fmt::Display;

/// 板处理上下文
#[derive(Debug, Clone)]
pub struct BoardCtx {
    /// 当前轮次（从 1 开始）
    pub round: u32,

    /// 板在本轮扫描结果中的序号（从 1 开始，仅用于日志显示）
    pub board_index: usize,

    /// 本轮待处理总数
    pub total: usize,

    /// 学生模型 ID
    pub model: String,
}

impl BoardCtx {
    pub fn new(round: u32, board_index: usize, total: usize, model: impl Into<String>) -> Self {
        Self {
            round,
            board_index,
            total,
            model: model.into(),
        }
    }
}

impl Display for BoardCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Round {} 板 {}/{}]",
            self.round, self.board_index, self.total
        )
    }
}
