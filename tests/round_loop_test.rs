use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use bom_verify_loop::error::{CompletionError, FineTuneError};
use bom_verify_loop::infrastructure::{
    CompletionService, FineTuneApi, JsonArtifactWriter, WorkbookTextSource,
};
use bom_verify_loop::models::{FineTuneJob, JobStatus};
use bom_verify_loop::{App, Collaborators, Config, RunOutcome};

const BASE_MODEL: &str = "gpt-4o-mini-2024-07-18";

/// 根据提示词返回固定数据；学生模型在 `wrong_qty_model` 下给出错误的数量
struct ScriptedCompletion {
    wrong_qty_model: Option<String>,
    student_models: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    fn new(wrong_qty_model: Option<&str>) -> Self {
        Self {
            wrong_qty_model: wrong_qty_model.map(str::to_string),
            student_models: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete_json(&self, model: &str, prompt: &str) -> Result<Value, CompletionError> {
        let coords = json!({
            "R1": { "x": "1.0", "y": "2.0", "rot": "90", "side": "Top" },
            "R2": { "x": "3.5", "y": "2.0", "rot": "0", "side": "BOT" }
        });
        if prompt.contains("TRUE COORDINATES") || prompt.contains("pick-and-place") {
            return Ok(coords);
        }

        let qty = if prompt.contains("TRUE BOM") {
            "2"
        } else {
            self.student_models.lock().unwrap().push(model.to_string());
            if self.wrong_qty_model.as_deref() == Some(model) {
                "3"
            } else {
                "2"
            }
        };
        Ok(json!({
            "items": [{ "itemName": "R1005", "itemType": "Resistor", "qty": qty, "refs": ["R1", "R2"] }]
        }))
    }
}

/// 立即完成的微调接口
struct InstantFineTune {
    succeed: bool,
    submitted: Mutex<Vec<String>>,
}

impl InstantFineTune {
    fn new(succeed: bool) -> Self {
        Self {
            succeed,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FineTuneApi for InstantFineTune {
    async fn upload(&self, dataset: &Path) -> Result<String, FineTuneError> {
        assert!(dataset.exists());
        Ok("file-1".to_string())
    }

    async fn submit(
        &self,
        _file_id: &str,
        base_model: &str,
        _n_epochs: u32,
    ) -> Result<FineTuneJob, FineTuneError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(base_model.to_string());
        let (raw, model) = if self.succeed {
            ("succeeded", Some(format!("ft:round-{}", submitted.len())))
        } else {
            ("failed", None)
        };
        Ok(FineTuneJob {
            id: format!("ftjob-{}", submitted.len()),
            status: JobStatus::from_api(raw),
            raw_status: raw.to_string(),
            fine_tuned_model: model,
        })
    }

    async fn poll(&self, job_id: &str) -> Result<FineTuneJob, FineTuneError> {
        panic!("terminal job {} should not be polled", job_id);
    }
}

fn make_board(root: &Path, year: &str, board: &str) {
    let dir = root.join(year).join(board);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("bom.csv"), "Designator,Comment,Footprint\nR1,10k,R1005\n").unwrap();
    fs::write(dir.join("pick.txt"), "RefDes\tX\tY\tRotation\nR1\t1.0\t2.0\t90\n").unwrap();
    fs::write(dir.join("정리.csv"), "품명,SET,Ref\nR1005,2,R1 R2\n").unwrap();
}

fn test_config(root: &Path, state: &Path) -> Config {
    Config {
        watch_root: root.to_path_buf(),
        checkpoint_file: state.join("progress.json"),
        model_file: state.join("last_model.txt"),
        dataset_file: state.join("dataset.jsonl"),
        report_dir: state.join("reports"),
        initial_model: BASE_MODEL.to_string(),
        llm_api_key: "sk-test".to_string(),
        batch_size: 2,
        batch_cooldown_ms: 0,
        verifier_retry_delay_ms: 0,
        fine_tune_poll_interval_ms: 0,
        ..Config::default()
    }
}

fn collaborators(
    completion: Arc<ScriptedCompletion>,
    fine_tune: Arc<InstantFineTune>,
) -> Collaborators {
    Collaborators {
        text_source: Arc::new(WorkbookTextSource::new()),
        completion,
        fine_tune_api: fine_tune,
        artifact_writer: Arc::new(JsonArtifactWriter::new()),
    }
}

fn read_report(state: &Path, round: u32) -> Value {
    let path: PathBuf = state.join("reports").join(format!("round-{}.json", round));
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_converges_in_round_two_after_one_fine_tune() {
    let root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    make_board(root.path(), "2024", "PWR");
    make_board(root.path(), "2024", "CTRL");
    make_board(root.path(), "2025", "LED");

    let completion = Arc::new(ScriptedCompletion::new(None));
    let fine_tune = Arc::new(InstantFineTune::new(true));
    let mut app = App::with_components(
        test_config(root.path(), state.path()),
        collaborators(completion.clone(), fine_tune.clone()),
    );

    let outcome = app.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Converged { round: 2 });

    // 第 1 轮结束后以初始模型微调一次，第 2 轮使用新模型
    assert_eq!(*fine_tune.submitted.lock().unwrap(), vec![BASE_MODEL]);
    assert_eq!(
        fs::read_to_string(state.path().join("last_model.txt")).unwrap(),
        "ft:round-1"
    );
    let models = completion.student_models.lock().unwrap().clone();
    assert_eq!(models.len(), 6);
    assert_eq!(models.iter().filter(|m| *m == "ft:round-1").count(), 3);

    let checkpoint: Value =
        serde_json::from_str(&fs::read_to_string(state.path().join("progress.json")).unwrap())
            .unwrap();
    assert_eq!(checkpoint["round"], 2);
    assert_eq!(checkpoint["completedBoards"].as_array().unwrap().len(), 3);
    assert!(checkpoint["failedBoards"].as_array().unwrap().is_empty());

    // 第 2 轮开始时数据集被清空，每块板两行
    let dataset = fs::read_to_string(state.path().join("dataset.jsonl")).unwrap();
    assert_eq!(dataset.lines().count(), 6);

    let report = read_report(state.path(), 1);
    assert_eq!(report["success_count"], 3);
    assert_eq!(report["boards"].as_array().unwrap().len(), 3);
    assert!(state.path().join("reports").join("round-2.json").exists());

    assert!(root
        .path()
        .join("2024")
        .join("PWR")
        .join("generated")
        .join("PWR_generated.json")
        .exists());
}

#[tokio::test]
async fn test_fine_tuned_model_fixes_quantity_mismatch() {
    let root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    make_board(root.path(), "2024", "PWR");

    let completion = Arc::new(ScriptedCompletion::new(Some(BASE_MODEL)));
    let fine_tune = Arc::new(InstantFineTune::new(true));
    let mut app = App::with_components(
        test_config(root.path(), state.path()),
        collaborators(completion, fine_tune.clone()),
    );

    let outcome = app.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Converged { round: 2 });

    let report = read_report(state.path(), 1);
    assert_eq!(report["fail_count"], 1);
    assert_eq!(
        report["boards"][0]["diffs"][0],
        "[수량 불일치] R1005: AI(3) vs 정답(2)"
    );
    assert_eq!(app.state().active_model, "ft:round-1");
}

#[tokio::test]
async fn test_stops_at_round_limit_when_fine_tune_fails() {
    let root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    make_board(root.path(), "2024", "PWR");

    let completion = Arc::new(ScriptedCompletion::new(Some(BASE_MODEL)));
    let fine_tune = Arc::new(InstantFineTune::new(false));
    let config = Config {
        max_rounds: Some(2),
        ..test_config(root.path(), state.path())
    };
    let mut app = App::with_components(config, collaborators(completion, fine_tune.clone()));

    let outcome = app.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::RoundLimitReached { rounds: 2 });

    // 失败的微调不替换模型
    assert_eq!(fine_tune.submitted.lock().unwrap().len(), 2);
    assert_eq!(app.state().active_model, BASE_MODEL);
    assert!(!state.path().join("last_model.txt").exists());
    assert_eq!(app.state().round(), 3);
}

#[tokio::test]
async fn test_resumes_partially_completed_round() {
    let root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    make_board(root.path(), "2024", "PWR");
    make_board(root.path(), "2024", "CTRL");

    fs::write(
        state.path().join("progress.json"),
        r#"{"round":2,"completedBoards":["CTRL"],"failedBoards":[]}"#,
    )
    .unwrap();
    fs::write(state.path().join("last_model.txt"), "ft:resumed\n").unwrap();

    let completion = Arc::new(ScriptedCompletion::new(None));
    let fine_tune = Arc::new(InstantFineTune::new(true));
    let mut app = App::with_components(
        test_config(root.path(), state.path()),
        collaborators(completion.clone(), fine_tune.clone()),
    );

    let outcome = app.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Converged { round: 2 });

    // 只处理了 PWR，且使用断点中的模型
    assert_eq!(*completion.student_models.lock().unwrap(), vec!["ft:resumed"]);
    assert!(fine_tune.submitted.lock().unwrap().is_empty());

    let report = read_report(state.path(), 2);
    assert_eq!(report["scanned"], 1);
    assert_eq!(report["success_count"], 2);
}

#[tokio::test]
async fn test_unwritable_dataset_does_not_stop_the_loop() {
    let root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    make_board(root.path(), "2024", "PWR");

    // 数据集路径的父目录是普通文件，清空与追加都会失败
    let blocker = state.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let completion = Arc::new(ScriptedCompletion::new(None));
    let fine_tune = Arc::new(InstantFineTune::new(true));
    let config = Config {
        dataset_file: blocker.join("dataset.jsonl"),
        max_rounds: Some(1),
        ..test_config(root.path(), state.path())
    };
    let mut app = App::with_components(
        config,
        collaborators(completion.clone(), fine_tune.clone()),
    );

    let outcome = app.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::RoundLimitReached { rounds: 1 });

    // 板仍被处理，样本写入失败记为该板的错误
    assert_eq!(completion.student_models.lock().unwrap().len(), 1);
    let report = read_report(state.path(), 1);
    assert_eq!(report["fail_count"], 1);
    assert!(report["boards"][0]["diffs"][0]
        .as_str()
        .unwrap()
        .starts_with("Error: "));

    // 没有样本就不微调
    assert!(fine_tune.submitted.lock().unwrap().is_empty());
}
