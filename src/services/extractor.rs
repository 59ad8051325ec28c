//! 结构化抽取 - 业务能力层
//!
//! 学生模型：BOM / 坐标两个约定并发调用，任一失败则整体失败
//! 验证模型：固定模型 + 有限次重试，用于生成标准答案

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ExtractionError;
use crate::infrastructure::CompletionService;
use crate::models::extraction::{parse_bom_items, parse_coordinate_map};
use crate::models::{BomItem, Contract, Coordinate, ExtractionResult};
use crate::utils::truncate_chars;

fn student_bom_prompt(bom_text: &str) -> String {
    format!(
        r#"Analyze the BOM file and extract structured data.
### RULES
1. Group rows by the **'PCB Footprint'** column; the footprint is the itemName.
2. **qty** must equal the number of references in the group.
3. **refs** lists every reference designator (e.g. R1, R2 ...).
4. **itemType** is inferred from the part name. Identical itemName MUST have identical itemType.
### INPUT BOM
{}
### OUTPUT FORMAT (JSON)
{{ "items": [{{ "itemName": "R1005", "itemType": "Resistor", "qty": "5", "refs": ["R1", "R2"] }}] }}"#,
        bom_text
    )
}

fn student_coord_prompt(coord_text: &str) -> String {
    format!(
        r#"Extract coordinate data from the pick-and-place file.
### RULES
1. Ignore the 'Type' column. The key is **RefDes**.
### INPUT COORDS
{}
### OUTPUT FORMAT (JSON)
{{ "R1": {{ "x": "10.0", "y": "20.0", "rot": "90", "side": "Top" }} }}"#,
        coord_text
    )
}

fn truth_bom_prompt(answer_text: &str) -> String {
    format!(
        r#"Extract the **TRUE BOM LIST** from the answer sheet.
### TABLE LOCATION
- The BOM table is on the **FIRST sheet** (or a sheet named after the board).
- It is **NOT** on the 'TOP' or 'BOTTOM' sheets; those hold coordinates.
### COLUMNS
- No, Type, Part Name, **SET(Qty)**, Ref, Remark.
- **CRITICAL**: quantity comes from the **'SET'** column. Never use 'Total Qty' or '수량'.
- **CRITICAL**: an empty 'Type' cell INHERITS the type from the row above.
### INPUT EXCEL
{}
### OUTPUT (JSON)
{{ "items": [{{ "itemName": "R1005", "itemType": "Resistor", "qty": "5", "refs": "R1, R2" }}] }}"#,
        answer_text
    )
}

fn truth_coord_prompt(answer_text: &str) -> String {
    format!(
        r#"Extract the **TRUE COORDINATES** from the answer sheet.
### TARGET
- Only the **'TOP'** and **'BOTTOM'** sheets.
- Extract X, Y, Rotation and Side for each Ref.
### INPUT EXCEL
{}
### OUTPUT (JSON map)
{{ "R1": {{ "x": "10", "y": "20", "rot": "0", "side": "Top" }} }}"#,
        answer_text
    )
}

/// 结构化抽取服务
///
/// 职责：
/// - 拼装四种约定的提示词（含截断）
/// - 调用补全服务并把 JSON 收敛为强类型结果
/// - 不处理失败兜底（由流程层把 Err 转成空结果）
pub struct StructuredExtractor {
    completion: Arc<dyn CompletionService>,
    verifier_model: String,
    max_attempts: usize,
    retry_delay: Duration,
    input_char_budget: usize,
    truth_coord_char_budget: usize,
}

impl StructuredExtractor {
    pub fn new(completion: Arc<dyn CompletionService>, config: &Config) -> Self {
        Self {
            completion,
            verifier_model: config.verifier_model.clone(),
            max_attempts: config.verifier_max_attempts.max(1),
            retry_delay: config.verifier_retry_delay(),
            input_char_budget: config.input_char_budget,
            truth_coord_char_budget: config.truth_coord_char_budget,
        }
    }

    /// 学生模型抽取（BOM ∥ 坐标）
    pub async fn extract_student(
        &self,
        model: &str,
        bom_text: &str,
        coord_text: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let bom_prompt = student_bom_prompt(truncate_chars(bom_text, self.input_char_budget));
        let coord_prompt =
            student_coord_prompt(truncate_chars(coord_text, self.input_char_budget));

        let (bom_value, coord_value) = tokio::try_join!(
            self.completion.complete_json(model, &bom_prompt),
            self.completion.complete_json(model, &coord_prompt),
        )?;

        Ok(ExtractionResult {
            items: parse_bom_items(Contract::StudentBom, bom_value)?,
            coords: parse_coordinate_map(Contract::StudentCoord, coord_value)?,
        })
    }

    /// 标准答案 BOM
    pub async fn extract_truth_bom(&self, answer_text: &str) -> Result<Vec<BomItem>, ExtractionError> {
        let prompt = truth_bom_prompt(truncate_chars(answer_text, self.input_char_budget));
        self.call_verifier(Contract::TruthBom, &prompt, parse_bom_items)
            .await
    }

    /// 标准答案坐标（只看 TOP / BOTTOM 工作表）
    pub async fn extract_truth_coords(
        &self,
        answer_text: &str,
    ) -> Result<BTreeMap<String, Coordinate>, ExtractionError> {
        let prompt = truth_coord_prompt(truncate_chars(answer_text, self.truth_coord_char_budget));
        self.call_verifier(Contract::TruthCoord, &prompt, parse_coordinate_map)
            .await
    }

    /// 带重试的验证模型调用，最后一次失败后不再等待
    async fn call_verifier<T>(
        &self,
        contract: Contract,
        prompt: &str,
        parse: fn(Contract, Value) -> Result<T, ExtractionError>,
    ) -> Result<T, ExtractionError> {
        let mut attempt = 1;
        loop {
            let result = match self
                .completion
                .complete_json(&self.verifier_model, prompt)
                .await
            {
                Ok(value) => parse(contract, value),
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(parsed) => {
                    debug!("{} 第 {} 次调用成功", contract, attempt);
                    return Ok(parsed);
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "⚠️ {} 第 {}/{} 次调用失败: {}，{}ms 后重试",
                        contract,
                        attempt,
                        self.max_attempts,
                        e,
                        self.retry_delay.as_millis()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("❌ {} 重试 {} 次后仍失败: {}", contract, self.max_attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按调用顺序返回预设响应，并记录 (模型, 提示词)
    #[derive(Default)]
    struct ScriptedCompletion {
        responses: Mutex<VecDeque<Result<Value, CompletionError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        fn new(responses: Vec<Result<Value, CompletionError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete_json(&self, model: &str, prompt: &str) -> Result<Value, CompletionError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionError::EmptyContent {
                    model: model.to_string(),
                }))
        }
    }

    fn api_error() -> Result<Value, CompletionError> {
        Err(CompletionError::api_call_failed("gpt-4o", "timeout"))
    }

    fn test_config() -> Config {
        Config {
            llm_api_key: "sk-test".to_string(),
            verifier_retry_delay_ms: 0,
            input_char_budget: 10,
            truth_coord_char_budget: 20,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_verifier_retries_then_succeeds() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            api_error(),
            Ok(json!({ "items": [{ "itemName": "R1005", "qty": 2, "refs": "R1,R2" }] })),
        ]));
        let extractor = StructuredExtractor::new(completion.clone(), &test_config());

        let items = extractor.extract_truth_bom("answer").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].refs, vec!["R1", "R2"]);

        let calls = completion.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(model, _)| model == "gpt-4o"));
    }

    #[tokio::test]
    async fn test_verifier_gives_up_after_budget() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            api_error(),
            Ok(json!("not an object")),
            api_error(),
            Ok(json!({ "R1": { "x": "1" } })),
        ]));
        let extractor = StructuredExtractor::new(completion.clone(), &test_config());

        let result = extractor.extract_truth_coords("answer").await;
        assert!(matches!(result, Err(ExtractionError::Completion(_))));
        // 默认 3 次，第 4 个响应不会被消费
        assert_eq!(completion.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_student_uses_active_model_and_truncates_input() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            Ok(json!({ "items": [] })),
            Ok(json!({ "R1": { "x": "1", "y": "2" } })),
        ]));
        let extractor = StructuredExtractor::new(completion.clone(), &test_config());

        let result = extractor
            .extract_student("ft:student-1", "0123456789ABCDEF", "RefDes")
            .await
            .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.coords["R1"].y.as_deref(), Some("2"));

        let calls = completion.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(model, _)| model == "ft:student-1"));
        let bom_prompt = calls
            .iter()
            .map(|(_, p)| p)
            .find(|p| p.contains("PCB Footprint"))
            .unwrap();
        assert!(bom_prompt.contains("0123456789\n"));
        assert!(!bom_prompt.contains("ABCDEF"));
    }

    #[tokio::test]
    async fn test_student_failure_is_an_error_not_a_retry() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            Ok(json!({ "items": [] })),
            api_error(),
        ]));
        let extractor = StructuredExtractor::new(completion.clone(), &test_config());

        assert!(extractor.extract_student("m", "bom", "coord").await.is_err());
        assert_eq!(completion.calls().len(), 2);
    }

    #[test]
    fn test_prompts_escape_braces() {
        assert!(student_coord_prompt("X").contains(r#"{ "R1": { "x""#));
        assert!(truth_bom_prompt("X").contains("SET"));
    }
}
