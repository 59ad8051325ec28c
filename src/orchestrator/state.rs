//! 编排状态 - 断点与当前模型
//!
//! - 断点文件记录轮次与本轮已完成的板，每块板完成后原子写入（临时文件 + rename）
//! - 模型文件只保存当前学生模型 ID（纯文本）
//! - 文件缺失或损坏时回退到默认值：第 1 轮、初始模型

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// 断点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub round: u32,
    #[serde(default)]
    pub completed_boards: Vec<String>,
    /// 本轮未通过的板（completedBoards 的子集）
    #[serde(default)]
    pub failed_boards: Vec<String>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            round: 1,
            completed_boards: Vec::new(),
            failed_boards: Vec::new(),
        }
    }
}

/// 断点 / 模型文件的读写
#[derive(Debug, Clone)]
pub struct StateStore {
    checkpoint_path: PathBuf,
    model_path: PathBuf,
}

impl StateStore {
    pub fn new(checkpoint_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            model_path: model_path.into(),
        }
    }

    /// 读取断点；缺失或无法解析时从第 1 轮开始
    pub fn load_checkpoint(&self) -> Checkpoint {
        let content = match fs::read_to_string(&self.checkpoint_path) {
            Ok(content) => content,
            Err(_) => {
                debug!("断点文件不存在: {}", self.checkpoint_path.display());
                return Checkpoint::default();
            }
        };

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(mut checkpoint) => {
                checkpoint.round = checkpoint.round.max(1);
                checkpoint
            }
            Err(e) => {
                warn!(
                    "⚠️ 断点文件损坏 ({}): {}，从第 1 轮开始",
                    self.checkpoint_path.display(),
                    e
                );
                Checkpoint::default()
            }
        }
    }

    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> AppResult<()> {
        let body = serde_json::to_string_pretty(checkpoint)?;
        write_atomic(&self.checkpoint_path, body.as_bytes())
    }

    /// 读取当前模型；缺失或为空时使用 `initial_model`
    pub fn load_model(&self, initial_model: &str) -> String {
        fs::read_to_string(&self.model_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| initial_model.to_string())
    }

    pub fn save_model(&self, model: &str) -> AppResult<()> {
        write_atomic(&self.model_path, model.as_bytes())
    }
}

/// 先写临时文件再 rename，避免中途崩溃留下半个文件
fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }
    }

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, contents).map_err(|e| AppError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| AppError::io(path, e))?;
    Ok(())
}

/// 编排状态：启动时从文件加载，之后显式地在循环中传递
#[derive(Debug)]
pub struct OrchestratorState {
    pub checkpoint: Checkpoint,
    pub active_model: String,
    store: StateStore,
}

impl OrchestratorState {
    pub fn load(store: StateStore, initial_model: &str) -> Self {
        let checkpoint = store.load_checkpoint();
        let active_model = store.load_model(initial_model);
        info!(
            "📂 加载断点: 第 {} 轮，已完成 {} 块板，模型 {}",
            checkpoint.round,
            checkpoint.completed_boards.len(),
            active_model
        );
        Self {
            checkpoint,
            active_model,
            store,
        }
    }

    pub fn round(&self) -> u32 {
        self.checkpoint.round
    }

    /// 本轮已完成的板
    pub fn completed_set(&self) -> HashSet<String> {
        self.checkpoint.completed_boards.iter().cloned().collect()
    }

    pub fn is_completed(&self, board: &str) -> bool {
        self.checkpoint.completed_boards.iter().any(|b| b == board)
    }

    pub fn fail_count(&self) -> usize {
        self.checkpoint.failed_boards.len()
    }

    /// 记录一块板的结果；同一轮内重复记录返回 false
    pub fn record_board(&mut self, board: &str, success: bool) -> bool {
        if self.is_completed(board) {
            return false;
        }
        self.checkpoint.completed_boards.push(board.to_string());
        if !success {
            self.checkpoint.failed_boards.push(board.to_string());
        }
        true
    }

    /// 进入下一轮并清空本轮记录
    pub fn advance_round(&mut self) {
        self.checkpoint.round += 1;
        self.checkpoint.completed_boards.clear();
        self.checkpoint.failed_boards.clear();
    }

    /// 持久化断点，失败只记录日志
    pub fn persist(&self) -> bool {
        match self.store.save_checkpoint(&self.checkpoint) {
            Ok(()) => true,
            Err(e) => {
                error!("❌ 断点保存失败: {}", e);
                false
            }
        }
    }

    /// 替换当前模型并持久化，失败只记录日志
    pub fn set_active_model(&mut self, model: String) -> bool {
        self.active_model = model;
        match self.store.save_model(&self.active_model) {
            Ok(()) => true,
            Err(e) => {
                error!("❌ 模型文件保存失败: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> StateStore {
        StateStore::new(
            dir.join("state").join("progress.json"),
            dir.join("state").join("last_model.txt"),
        )
    }

    #[test]
    fn test_defaults_when_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let state = OrchestratorState::load(store(dir.path()), "gpt-4o-mini-2024-07-18");

        assert_eq!(state.checkpoint, Checkpoint::default());
        assert_eq!(state.round(), 1);
        assert_eq!(state.active_model, "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn test_resumes_from_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = OrchestratorState::load(store(dir.path()), "base");
        state.advance_round();
        assert!(state.record_board("PWR", true));
        assert!(state.record_board("CTRL", false));
        assert!(!state.record_board("PWR", false));
        assert!(state.persist());
        assert!(state.set_active_model("ft:model-2".to_string()));

        let resumed = OrchestratorState::load(store(dir.path()), "base");
        assert_eq!(resumed.round(), 2);
        assert_eq!(resumed.checkpoint.completed_boards, vec!["PWR", "CTRL"]);
        assert_eq!(resumed.checkpoint.failed_boards, vec!["CTRL"]);
        assert_eq!(resumed.fail_count(), 1);
        assert!(resumed.is_completed("PWR"));
        assert_eq!(resumed.active_model, "ft:model-2");
        assert!(!dir.path().join("state").join("progress.json.tmp").exists());
    }

    #[test]
    fn test_reads_checkpoint_without_failed_boards() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("state")).unwrap();
        fs::write(
            dir.path().join("state").join("progress.json"),
            r#"{"round":3,"completedBoards":["A","B"]}"#,
        )
        .unwrap();

        let checkpoint = store.load_checkpoint();
        assert_eq!(checkpoint.round, 3);
        assert_eq!(checkpoint.completed_boards, vec!["A", "B"]);
        assert!(checkpoint.failed_boards.is_empty());
    }

    #[test]
    fn test_corrupt_checkpoint_and_blank_model_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(dir.path().join("state")).unwrap();
        fs::write(dir.path().join("state").join("progress.json"), "{not json").unwrap();
        fs::write(dir.path().join("state").join("last_model.txt"), "  \n").unwrap();

        assert_eq!(store.load_checkpoint(), Checkpoint::default());
        assert_eq!(store.load_model("base"), "base");
    }

    #[test]
    fn test_advance_round_clears_sets() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = OrchestratorState::load(store(dir.path()), "base");
        state.record_board("A", false);
        state.advance_round();

        assert_eq!(state.round(), 2);
        assert!(state.checkpoint.completed_boards.is_empty());
        assert_eq!(state.fail_count(), 0);
    }
}
