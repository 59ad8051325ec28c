//! 表格转文本 - 基础设施层
//!
//! 把 BOM / 坐标 / 标准答案文件转成按行排列的纯文本，只暴露"读文本"的能力

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

/// 连续空行达到该数量后停止读取当前工作表
const MAX_CONSECUTIVE_EMPTY_ROWS: usize = 5;

/// 直接按文本读取的扩展名
const DELIMITED_TEXT_EXTENSIONS: [&str; 5] = ["txt", "csv", "bom", "cpl", "pnp"];

/// 是否为分隔符文本文件（按扩展名判断，忽略大小写）
pub fn is_delimited_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            DELIMITED_TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// 文本来源
///
/// 任何读取失败都返回空字符串，不向上传播错误
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn read_text(&self, path: &Path) -> String;
}

/// 基于 calamine 的实现
///
/// - 分隔符文本：原样读取（非法 UTF-8 以替换字符处理）
/// - 工作簿：逐个工作表输出 `[SHEET: 名称]`，随后是以制表符连接的非空行
#[derive(Debug, Default, Clone)]
pub struct WorkbookTextSource;

impl WorkbookTextSource {
    pub fn new() -> Self {
        Self
    }

    fn read_blocking(path: &Path) -> Result<String, String> {
        if is_delimited_text(path) {
            let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;
        let mut out = String::new();

        for sheet_name in workbook.sheet_names() {
            out.push_str(&format!("[SHEET: {}]\n", sheet_name));

            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    debug!("工作表 {} 读取失败: {}", sheet_name, e);
                    out.push('\n');
                    continue;
                }
            };

            let mut empty_rows = 0;
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                if cells.iter().all(|c| c.is_empty()) {
                    empty_rows += 1;
                    if empty_rows >= MAX_CONSECUTIVE_EMPTY_ROWS {
                        break;
                    }
                    continue;
                }
                empty_rows = 0;
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
            out.push('\n');
        }

        Ok(out)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[async_trait]
impl TextSource for WorkbookTextSource {
    async fn read_text(&self, path: &Path) -> String {
        let owned: PathBuf = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || Self::read_blocking(&owned)).await;

        match result {
            Ok(Ok(text)) => {
                debug!("读取 {} 完成，{} 字符", path.display(), text.chars().count());
                text
            }
            Ok(Err(e)) => {
                warn!("⚠️ 读取文件失败 {}: {}", path.display(), e);
                String::new()
            }
            Err(e) => {
                warn!("⚠️ 读取任务异常 {}: {}", path.display(), e);
                String::new()
            }
        }
    }
}
