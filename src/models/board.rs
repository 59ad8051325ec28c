use std::fmt;
use std::path::PathBuf;

/// 一块板（一个样本目录）中已确定角色的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFileSet {
    /// 板名（目录名）
    pub name: String,
    /// 所在年份目录名
    pub year: String,
    /// 板目录
    pub dir: PathBuf,
    pub bom: PathBuf,
    pub coord: PathBuf,
    /// 人工整理的标准答案表
    pub answer: PathBuf,
}

impl fmt::Display for BoardFileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.year, self.name)
    }
}

/// 缺失的文件角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRole {
    Bom,
    Coord,
    Answer,
}

impl fmt::Display for MissingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MissingRole::Bom => "BOM 없음",
            MissingRole::Coord => "좌표 없음",
            MissingRole::Answer => "정답지 없음",
        };
        f.write_str(text)
    }
}

/// 跳过某块板的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationWarning {
    /// 只有 PDF，没有可用的 BOM
    BomMissingWithPdfs { pdf_count: usize },
    /// 缺少一个或多个角色
    MissingFiles(Vec<MissingRole>),
}

impl ClassificationWarning {
    /// 逐条原因
    pub fn reasons(&self) -> Vec<String> {
        match self {
            ClassificationWarning::BomMissingWithPdfs { pdf_count } => {
                vec![format!("BOM 없음 (PDF만 {}개)", pdf_count)]
            }
            ClassificationWarning::MissingFiles(roles) => {
                roles.iter().map(|r| r.to_string()).collect()
            }
        }
    }
}

impl fmt::Display for ClassificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reasons().join(", "))
    }
}

/// 角色分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Resolved(BoardFileSet),
    Skipped(ClassificationWarning),
}
