//! 样本目录扫描
//!
//! 目录结构：`<root>/<年份>/<板名>/`，隐藏目录跳过；不同年份下的同名板只保留第一个

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::{BoardFileSet, Classification};
use crate::services::RoleClassifier;

/// 一次扫描的结果
#[derive(Debug, Default)]
pub struct ScanResult {
    /// 已确定文件角色、本轮待处理的板
    pub boards: Vec<BoardFileSet>,
    /// 因缺少文件被跳过的板数
    pub skipped: usize,
    /// 本轮已完成而跳过的板数
    pub already_completed: usize,
}

/// 按名称排序列出子目录（跳过隐藏目录）
async fn list_subdirs(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            dirs.push((name, entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// 扫描根目录
///
/// 根目录不可读时记录日志并返回空结果
pub async fn scan_boards(
    root: &Path,
    classifier: &RoleClassifier,
    completed: &HashSet<String>,
) -> ScanResult {
    let mut result = ScanResult::default();

    let years = match list_subdirs(root).await {
        Ok(years) => years,
        Err(e) => {
            warn!("⚠️ 无法读取样本目录 {}: {}", root.display(), e);
            return result;
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    for (year, year_path) in years {
        let boards = match list_subdirs(&year_path).await {
            Ok(boards) => boards,
            Err(e) => {
                warn!("⚠️ 无法读取年份目录 {}: {}", year_path.display(), e);
                continue;
            }
        };

        for (board, board_path) in boards {
            if !seen.insert(board.clone()) {
                debug!("[{}/{}] 与其他年份的板同名，跳过", year, board);
                continue;
            }
            if completed.contains(&board) {
                result.already_completed += 1;
                continue;
            }

            match classifier.classify(&year, &board, &board_path).await {
                Ok(Classification::Resolved(set)) => result.boards.push(set),
                Ok(Classification::Skipped(warning)) => {
                    warn!("⚠️ [Skip] {}: {}", board, warning);
                    result.skipped += 1;
                }
                Err(e) => {
                    warn!("⚠️ [Skip] {}: {}", board, e);
                    result.skipped += 1;
                }
            }
        }
    }

    result
}
