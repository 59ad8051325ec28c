//! 板处理流程 - 流程层
//!
//! 核心职责：定义"一块板"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取 BOM / 坐标 / 标准答案文本
//! 2. 学生抽取 ∥ 标准答案 BOM ∥ 标准答案坐标（并发，失败视为空结果）
//! 3. 比对 → 写训练样本 → 写生成物（在编排任务中顺序执行）

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::{ArtifactWriter, TextSource};
use crate::models::{BoardFileSet, BoardOutcome, ExtractionResult};
use crate::services::{compare, DatasetWriter, StructuredExtractor};
use crate::workflow::board_ctx::BoardCtx;

/// 一块板抽取阶段的产物
#[derive(Debug, Clone)]
pub struct BoardExtraction {
    pub set: BoardFileSet,
    pub bom_text: String,
    pub coord_text: String,
    pub student: ExtractionResult,
    pub truth: ExtractionResult,
}

/// 板处理流程
///
/// - `extract` 可在独立任务中并发运行，只做读取与模型调用
/// - `fold` 只在编排任务中顺序调用，负责所有写操作
pub struct BoardFlow {
    text_source: Arc<dyn TextSource>,
    extractor: StructuredExtractor,
    dataset: Arc<DatasetWriter>,
    artifact_writer: Arc<dyn ArtifactWriter>,
}

impl BoardFlow {
    pub fn new(
        text_source: Arc<dyn TextSource>,
        extractor: StructuredExtractor,
        dataset: Arc<DatasetWriter>,
        artifact_writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            text_source,
            extractor,
            dataset,
            artifact_writer,
        }
    }

    /// 抽取阶段：任何抽取失败都被转换为空结果，在比对阶段体现为差异
    pub async fn extract(&self, set: BoardFileSet, ctx: &BoardCtx) -> BoardExtraction {
        let (bom_text, coord_text, answer_text) = tokio::join!(
            self.text_source.read_text(&set.bom),
            self.text_source.read_text(&set.coord),
            self.text_source.read_text(&set.answer),
        );
        debug!(
            "{} {} 文本长度: bom={} coord={} answer={}",
            ctx,
            set.name,
            bom_text.len(),
            coord_text.len(),
            answer_text.len()
        );

        let (student, truth_items, truth_coords) = tokio::join!(
            self.extractor
                .extract_student(&ctx.model, &bom_text, &coord_text),
            self.extractor.extract_truth_bom(&answer_text),
            self.extractor.extract_truth_coords(&answer_text),
        );

        let student = student.unwrap_or_else(|e| {
            warn!("{} ⚠️ {} 学生模型抽取失败，按空结果处理: {}", ctx, set.name, e);
            ExtractionResult::default()
        });
        let items = truth_items.unwrap_or_else(|e| {
            warn!("{} ⚠️ {} 标准答案 BOM 抽取失败，按空结果处理: {}", ctx, set.name, e);
            Vec::new()
        });
        let coords = truth_coords.unwrap_or_else(|e| {
            warn!("{} ⚠️ {} 标准答案坐标抽取失败，按空结果处理: {}", ctx, set.name, e);
            Default::default()
        });

        BoardExtraction {
            set,
            bom_text,
            coord_text,
            student,
            truth: ExtractionResult { items, coords },
        }
    }

    /// 汇总阶段：比对、写训练样本（标准答案有项目时）、写生成物
    pub async fn fold(&self, extraction: BoardExtraction, ctx: &BoardCtx) -> AppResult<BoardOutcome> {
        let BoardExtraction {
            set,
            bom_text,
            coord_text,
            student,
            truth,
        } = extraction;

        let comparison = compare(&student, &truth, ctx.round);

        let contributed_samples = !truth.items.is_empty();
        if contributed_samples {
            self.dataset.append(&bom_text, &coord_text, &truth).await?;
        } else {
            debug!("{} {} 标准答案为空，不写训练样本", ctx, set.name);
        }

        self.artifact_writer.write(&set, &student).await?;

        Ok(BoardOutcome {
            success: comparison.is_success(),
            name: set.name,
            year: set.year,
            diffs: comparison.diffs,
            stats: comparison.stats,
            contributed_samples,
        })
    }
}
