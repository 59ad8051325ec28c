//! 文件角色分类 - 业务能力层
//!
//! 只负责判断一个板目录里哪个文件是 BOM / 坐标 / 标准答案，不关心后续流程

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{is_delimited_text, TextSource};
use crate::models::{BoardFileSet, Classification, ClassificationWarning, MissingRole};

const SUPPORTED_EXTENSIONS: [&str; 7] = ["xlsx", "xls", "csv", "txt", "bom", "cpl", "pnp"];

/// 文件名规则判断出的初始角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameHint {
    Answer,
    Bom,
    Coord,
    Unknown,
}

/// 文件名中的 `(数字)`，例如 "main(1).xlsx"
static NUMBERED_COPY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+\)").expect("valid numbered copy regex"));

fn name_hint(name: &str) -> NameHint {
    let lower = name.to_lowercase();

    if NUMBERED_COPY.is_match(&lower) || lower.contains("완료") || lower.contains("정리") {
        NameHint::Answer
    } else if lower.contains("bom") || lower.contains("part") {
        NameHint::Bom
    } else if lower.contains("좌표")
        || lower.contains("pick")
        || lower.contains("position")
        || lower.ends_with(".cpl")
        || lower.ends_with(".pnp")
    {
        NameHint::Coord
    } else {
        NameHint::Unknown
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn looks_like_answer(text: &str) -> bool {
    (text.contains("품명") || text.contains("Part"))
        && (text.contains("Ref") || text.contains("Reference"))
        && (text.contains("SET") || text.contains("Qty"))
}

fn looks_like_bom(text: &str) -> bool {
    ["Footprint", "Comment", "Designator", "품명", "규격"]
        .iter()
        .any(|kw| text.contains(kw))
}

fn looks_like_coord(text: &str) -> bool {
    ["RefDes", "Location", "Rotation"]
        .iter()
        .any(|kw| text.contains(kw))
}

/// 目录中经过过滤的文件列表
#[derive(Debug, Default)]
struct Listing {
    /// NFC 规范化后的文件名，已排序
    candidates: Vec<String>,
    /// 规范化文件名 → 实际路径
    paths: HashMap<String, PathBuf>,
    pdf_count: usize,
}

impl Listing {
    fn from_names(dir: &Path, raw_names: impl IntoIterator<Item = String>) -> Self {
        let mut listing = Listing::default();
        for raw in raw_names {
            let name: String = raw.nfc().collect();
            if name.starts_with('.') || name.starts_with("~$") {
                continue;
            }
            match extension_of(&name).as_deref() {
                Some("pdf") => listing.pdf_count += 1,
                Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => {
                    listing.paths.insert(name.clone(), dir.join(&raw));
                    listing.candidates.push(name);
                }
                _ => {}
            }
        }
        listing.candidates.sort();
        listing.candidates.dedup();
        listing
    }
}

/// 文件角色分类器
///
/// 职责：
/// - 先按文件名规则分类，不足时读取内容嗅探
/// - 文件名命中标准答案的多个文件取排序后的最后一个，其余角色取第一个
/// - 缺少角色时返回警告，而不是错误
pub struct RoleClassifier {
    text_source: Arc<dyn TextSource>,
}

impl RoleClassifier {
    pub fn new(text_source: Arc<dyn TextSource>) -> Self {
        Self { text_source }
    }

    /// 分类一个板目录
    ///
    /// 只有目录本身无法读取时才返回错误
    pub async fn classify(&self, year: &str, name: &str, dir: &Path) -> AppResult<Classification> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| AppError::io(dir, e))?;

        let mut raw_names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| AppError::io(dir, e))? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                raw_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        let listing = Listing::from_names(dir, raw_names);
        Ok(self.classify_listing(year, name, dir, &listing).await)
    }

    async fn classify_listing(
        &self,
        year: &str,
        board_name: &str,
        dir: &Path,
        listing: &Listing,
    ) -> Classification {
        let mut sniffed: HashMap<String, String> = HashMap::new();

        let mut answer: Option<&str> = None;
        let mut bom_candidates: Vec<&str> = Vec::new();
        let mut coord_candidates: Vec<&str> = Vec::new();

        // 1-2. 文件名规则
        for name in &listing.candidates {
            match name_hint(name) {
                NameHint::Answer => answer = Some(name.as_str()),
                NameHint::Bom => bom_candidates.push(name.as_str()),
                NameHint::Coord => coord_candidates.push(name.as_str()),
                NameHint::Unknown => {}
            }
        }

        // 3. 文件名无法确定标准答案时按内容嗅探
        if answer.is_none() {
            for name in &listing.candidates {
                if coord_candidates.contains(&name.as_str())
                    || is_delimited_text(Path::new(name))
                {
                    continue;
                }
                let text = self.sniff(listing, &mut sniffed, name).await;
                if looks_like_answer(&text) {
                    answer = Some(name.as_str());
                    break;
                }
            }
        }

        // 4. 标准答案不能同时是 BOM / 坐标
        bom_candidates.retain(|f| Some(*f) != answer);
        coord_candidates.retain(|f| Some(*f) != answer);

        let mut bom = bom_candidates.first().copied();
        if bom.is_none() {
            for name in &listing.candidates {
                if Some(name.as_str()) == answer || coord_candidates.contains(&name.as_str()) {
                    continue;
                }
                let text = self.sniff(listing, &mut sniffed, name).await;
                if looks_like_bom(&text) {
                    bom = Some(name.as_str());
                    break;
                }
            }
        }

        // 5. 坐标
        let mut coord = coord_candidates.first().copied();
        if coord.is_none() {
            for name in &listing.candidates {
                if Some(name.as_str()) == answer
                    || Some(name.as_str()) == bom
                    || bom_candidates.contains(&name.as_str())
                {
                    continue;
                }
                let text = self.sniff(listing, &mut sniffed, name).await;
                if looks_like_coord(&text) {
                    coord = Some(name.as_str());
                    break;
                }
            }
        }

        debug!(
            "[{}/{}] 分类结果: bom={:?} coord={:?} answer={:?}",
            year, board_name, bom, coord, answer
        );

        if bom.is_none() && listing.pdf_count > 0 {
            return Classification::Skipped(ClassificationWarning::BomMissingWithPdfs {
                pdf_count: listing.pdf_count,
            });
        }

        match (bom, coord, answer) {
            (Some(bom), Some(coord), Some(answer)) => Classification::Resolved(BoardFileSet {
                name: board_name.to_string(),
                year: year.to_string(),
                dir: dir.to_path_buf(),
                bom: listing.paths[bom].clone(),
                coord: listing.paths[coord].clone(),
                answer: listing.paths[answer].clone(),
            }),
            _ => {
                let mut missing = Vec::new();
                if bom.is_none() {
                    missing.push(MissingRole::Bom);
                }
                if coord.is_none() {
                    missing.push(MissingRole::Coord);
                }
                if answer.is_none() {
                    missing.push(MissingRole::Answer);
                }
                Classification::Skipped(ClassificationWarning::MissingFiles(missing))
            }
        }
    }

    /// 读取（并缓存）文件内容用于嗅探
    async fn sniff(
        &self,
        listing: &Listing,
        cache: &mut HashMap<String, String>,
        name: &str,
    ) -> String {
        if let Some(text) = cache.get(name) {
            return text.clone();
        }
        let text = match listing.paths.get(name) {
            Some(path) => self.text_source.read_text(path).await,
            None => String::new(),
        };
        cache.insert(name.to_string(), text.clone());
        text
    }
}
