//! 轮次循环 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责轮次循环与资源管理。
//!
//! ## 每一轮
//!
//! 1. **扫描**：列出 `<root>/<年份>/<板名>`，确定文件角色，跳过本轮已完成的板
//! 2. **分批**：每批 `batch_size` 块板，每块板一个 tokio 任务做抽取
//! 3. **汇总**：按完成顺序在本任务中比对、写样本、写断点（所有写操作串行）
//! 4. **决策**：收敛则结束；否则进入下一轮，必要时先微调学生模型
//!
//! ## 设计特点
//!
//! - **状态显式传递**：断点与当前模型在启动时加载为 `OrchestratorState`
//! - **失败不中断**：单块板的错误只变成一条 `Error: …` 差异
//! - **协作者可替换**：文本读取 / 模型调用 / 微调 / 生成物写入都通过 trait 注入

use std::sync::Arc;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{
    ArtifactWriter, CompletionService, FineTuneApi, JsonArtifactWriter, OpenAiCompletion,
    OpenAiFineTuneApi, TextSource, WorkbookTextSource,
};
use crate::models::{BoardFileSet, BoardOutcome, ComparisonStats, RoundReport};
use crate::orchestrator::scanner::scan_boards;
use crate::orchestrator::state::{OrchestratorState, StateStore};
use crate::services::{
    DatasetWriter, FineTuneManager, FineTuneOutcome, ReportWriter, RoleClassifier,
    StructuredExtractor,
};
use crate::utils::logging::{
    format_board_summary, log_batch_complete, log_batch_start, log_boards_loaded,
    log_round_result, log_round_start, log_startup,
};
use crate::utils::truncate_chars;
use crate::workflow::{BoardCtx, BoardFlow};

/// 外部协作者
pub struct Collaborators {
    pub text_source: Arc<dyn TextSource>,
    pub completion: Arc<dyn CompletionService>,
    pub fine_tune_api: Arc<dyn FineTuneApi>,
    pub artifact_writer: Arc<dyn ArtifactWriter>,
}

impl Collaborators {
    /// 生产环境实现：calamine 读表格、OpenAI 接口
    pub fn from_config(config: &Config) -> Self {
        Self {
            text_source: Arc::new(WorkbookTextSource::new()),
            completion: Arc::new(OpenAiCompletion::new(config)),
            fine_tune_api: Arc::new(OpenAiFineTuneApi::new(config)),
            artifact_writer: Arc::new(JsonArtifactWriter::new()),
        }
    }
}

/// 一轮结束时的汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    pub success_count: usize,
    pub fail_count: usize,
    /// 本次扫描到但没有写入断点的板
    pub unresolved: usize,
    pub has_records: bool,
}

/// 一轮结束后的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDecision {
    Terminate,
    Advance { fine_tune: bool },
}

/// 第 2 轮起全部通过且没有遗留的板时结束；否则进入下一轮，
/// 数据集有样本且（刚结束第 1 轮或有失败）时先微调
pub fn decide(summary: &RoundSummary) -> RoundDecision {
    if summary.round >= 2 && summary.fail_count == 0 && summary.unresolved == 0 {
        return RoundDecision::Terminate;
    }
    RoundDecision::Advance {
        fine_tune: summary.has_records && (summary.round == 1 || summary.fail_count > 0),
    }
}

/// 整个循环的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 在第 `round` 轮全部通过
    Converged { round: u32 },
    /// 达到 `max_rounds`
    RoundLimitReached { rounds: u32 },
}

/// 应用主结构
pub struct App {
    config: Config,
    state: OrchestratorState,
    classifier: RoleClassifier,
    flow: Arc<BoardFlow>,
    dataset: Arc<DatasetWriter>,
    fine_tuner: FineTuneManager,
    reports: ReportWriter,
    /// 上一轮的 (通过, 失败)，只用于日志对比
    previous: Option<(usize, usize)>,
}

impl App {
    /// 初始化应用（生产环境协作者）
    pub async fn initialize(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config);
        Ok(Self::with_components(config, collaborators))
    }

    /// 使用指定的协作者组装应用
    pub fn with_components(config: Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            text_source,
            completion,
            fine_tune_api,
            artifact_writer,
        } = collaborators;

        let store = StateStore::new(&config.checkpoint_file, &config.model_file);
        let state = OrchestratorState::load(store, &config.initial_model);

        let dataset = Arc::new(DatasetWriter::new(
            &config.dataset_file,
            config.input_char_budget,
        ));
        let extractor = StructuredExtractor::new(completion, &config);
        let flow = Arc::new(BoardFlow::new(
            text_source.clone(),
            extractor,
            dataset.clone(),
            artifact_writer,
        ));

        Self {
            classifier: RoleClassifier::new(text_source),
            fine_tuner: FineTuneManager::new(fine_tune_api, &config),
            reports: ReportWriter::new(&config.report_dir),
            config,
            state,
            flow,
            dataset,
            previous: None,
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// 运行轮次循环，直到收敛或达到最大轮数
    pub async fn run(&mut self) -> Result<RunOutcome> {
        log_startup(&self.config, self.state.round(), &self.state.active_model);

        loop {
            if let Some(max_rounds) = self.config.max_rounds {
                if self.state.round() > max_rounds {
                    info!("⏹️ 已达到最大轮数 {}，停止", max_rounds);
                    return Ok(RunOutcome::RoundLimitReached { rounds: max_rounds });
                }
            }

            let summary = self.run_round().await?;

            match decide(&summary) {
                RoundDecision::Terminate => {
                    info!("🎉 第 {} 轮全部通过，循环结束", summary.round);
                    return Ok(RunOutcome::Converged {
                        round: summary.round,
                    });
                }
                RoundDecision::Advance { fine_tune } => {
                    self.state.advance_round();
                    self.state.persist();

                    if fine_tune {
                        self.fine_tune().await;
                    } else {
                        info!("⏭️ 本轮不需要微调，继续使用 {}", self.state.active_model);
                    }
                }
            }
        }
    }

    /// 执行一轮（可能是从断点续跑的半轮）
    async fn run_round(&mut self) -> Result<RoundSummary> {
        let round = self.state.round();
        log_round_start(round, &self.state.active_model);

        if self.state.checkpoint.completed_boards.is_empty() {
            if let Err(e) = self.dataset.reset().await {
                error!("❌ 数据集清空失败，继续本轮: {}", e);
            }
        }

        info!("\n📁 正在扫描样本目录...");
        let completed = self.state.completed_set();
        let scan = scan_boards(&self.config.watch_root, &self.classifier, &completed).await;
        if scan.already_completed > 0 {
            info!("⏩ 本轮已完成 {} 块板，跳过", scan.already_completed);
        }

        let scanned = scan.boards.len();
        log_boards_loaded(scanned, self.config.batch_size);

        let outcomes = self.process_boards(scan.boards).await;
        let recorded = outcomes.len();

        let fail_count = self.state.fail_count();
        let success_count = self.state.checkpoint.completed_boards.len() - fail_count;
        let unresolved = scanned.saturating_sub(recorded);

        log_round_result(round, success_count, fail_count, unresolved, self.previous);
        self.previous = Some((success_count, fail_count));

        self.write_report(round, scanned, success_count, fail_count, unresolved, outcomes)
            .await;

        Ok(RoundSummary {
            round,
            success_count,
            fail_count,
            unresolved,
            has_records: self.dataset.has_records().await,
        })
    }

    /// 分批处理，返回本次写入断点的板的结果
    async fn process_boards(&mut self, boards: Vec<BoardFileSet>) -> Vec<BoardOutcome> {
        let total = boards.len();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let mut outcomes = Vec::with_capacity(total);

        let mut pending = boards.into_iter().enumerate().peekable();
        let mut batch_num = 0;
        while pending.peek().is_some() {
            batch_num += 1;
            let batch: Vec<(usize, BoardFileSet)> = pending.by_ref().take(batch_size).collect();
            let start = batch.first().map(|(i, _)| i + 1).unwrap_or(0);
            let end = batch.last().map(|(i, _)| i + 1).unwrap_or(0);
            log_batch_start(batch_num, total_batches, start, end, total);

            let batch_len = batch.len();
            let batch_outcomes = self.process_batch(batch, total).await;
            let success = batch_outcomes.iter().filter(|o| o.success).count();
            log_batch_complete(batch_num, success, batch_len);
            outcomes.extend(batch_outcomes);

            tokio::time::sleep(self.config.batch_cooldown()).await;
        }

        outcomes
    }

    /// 抽取并发进行；比对与所有写操作按完成顺序在当前任务中执行
    async fn process_batch(
        &mut self,
        batch: Vec<(usize, BoardFileSet)>,
        total: usize,
    ) -> Vec<BoardOutcome> {
        let round = self.state.round();
        let mut tasks = FuturesUnordered::new();

        for (idx, set) in batch {
            let ctx = BoardCtx::new(round, idx + 1, total, self.state.active_model.clone());
            let flow = self.flow.clone();
            let name = set.name.clone();
            let year = set.year.clone();
            let task_ctx = ctx.clone();

            let handle = tokio::spawn(async move { flow.extract(set, &task_ctx).await });
            tasks.push(async move { (name, year, ctx, handle.await) });
        }

        let mut outcomes = Vec::new();
        while let Some((name, year, ctx, joined)) = tasks.next().await {
            if self.state.is_completed(&name) {
                warn!("{} ⚠️ {} 本轮已记录，忽略重复结果", ctx, name);
                continue;
            }

            let outcome = match joined {
                Ok(extraction) => match self.flow.fold(extraction, &ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("{} ❌ {} 处理失败: {}", ctx, name, e);
                        BoardOutcome::failed(&name, &year, e)
                    }
                },
                Err(e) => {
                    error!("{} ❌ {} 任务执行失败: {}", ctx, name, e);
                    BoardOutcome::failed(&name, &year, e)
                }
            };

            if !self.state.record_board(&outcome.name, outcome.success) {
                warn!("{} ⚠️ {} 本轮已记录，忽略重复结果", ctx, outcome.name);
                continue;
            }
            self.state.persist();

            info!("{}", format_board_summary(&outcome, round));
            for diff in &outcome.diffs {
                info!("      - {}", truncate_chars(diff, 200));
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn write_report(
        &self,
        round: u32,
        scanned: usize,
        success_count: usize,
        fail_count: usize,
        unresolved: usize,
        boards: Vec<BoardOutcome>,
    ) {
        let mut totals = ComparisonStats::default();
        for board in &boards {
            totals.merge(&board.stats);
        }

        let report = RoundReport {
            round,
            model: self.state.active_model.clone(),
            finished_at: chrono::Local::now(),
            scanned,
            success_count,
            fail_count,
            unresolved,
            totals,
            boards,
        };

        match self.reports.write(&report).await {
            Ok(path) => info!("📝 本轮报告: {}", path.display()),
            Err(e) => error!("❌ 本轮报告写入失败: {}", e),
        }
    }

    /// 微调；成功时替换并保存当前模型，失败继续使用旧模型
    async fn fine_tune(&mut self) {
        info!("\n🧠 开始微调（基础模型 {}）", self.state.active_model);
        let outcome = self
            .fine_tuner
            .run(self.dataset.path(), &self.state.active_model)
            .await;

        match outcome {
            FineTuneOutcome::Succeeded(model) => {
                info!("✅ 微调完成，下一轮使用 {}", model);
                self.state.set_active_model(model);
            }
            FineTuneOutcome::Failed(reason) => {
                warn!(
                    "⚠️ 微调失败 ({})，继续使用 {}",
                    reason, self.state.active_model
                );
            }
        }
    }
}
