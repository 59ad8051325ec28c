//! 比对器 - 业务能力层
//!
//! 学生抽取结果 vs 标准答案，逐字段比对，输出有序差异列表与七类统计。
//! 纯函数，无 IO。

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{BomItem, Category, ComparisonStats, Coordinate, ExtractionResult};

/// 品名 / 种类比对用的键：转大写并去掉空白、`-`、`_`
pub fn normalize_key(s: &str) -> String {
    s.to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

/// 贴装面归一：含 BOT → BOTTOM，含 TOP 或等于 T → TOP
fn normalize_side(s: &str) -> String {
    let upper = s.trim().to_uppercase();
    if upper.contains("BOT") {
        "BOTTOM".to_string()
    } else if upper.contains("TOP") || upper == "T" {
        "TOP".to_string()
    } else {
        upper
    }
}

/// 开头的十进制数字（可带符号、小数、指数），后面的单位等字符忽略
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
});

/// 取字符串开头的数字部分，`"10.5mm"` → 10.5；没有数字时为 None
fn leading_number(value: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(value.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 坐标分量比较：取开头数字精确比较；任一边没有数字时不算不一致
fn same_axis(student: Option<&str>, truth: Option<&str>) -> bool {
    match (
        student.and_then(leading_number),
        truth.and_then(leading_number),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// 一块板的比对结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub diffs: Vec<String>,
    pub stats: ComparisonStats,
}

impl ComparisonOutcome {
    /// 没有任何差异即视为通过
    pub fn is_success(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// 比对学生结果与标准答案
///
/// `round` 从 1 开始；种类（종류）只在第 2 轮及以后参与比对
pub fn compare(student: &ExtractionResult, truth: &ExtractionResult, round: u32) -> ComparisonOutcome {
    let mut diffs = Vec::new();
    let mut stats = ComparisonStats::default();

    // 重复键以最后一个为准
    let truth_items: HashMap<String, &BomItem> = truth
        .items
        .iter()
        .map(|item| (normalize_key(&item.item_name), item))
        .collect();
    let mut matched: HashSet<String> = HashSet::new();

    for item in &student.items {
        let key = normalize_key(&item.item_name);
        let Some(expected) = truth_items.get(&key) else {
            diffs.push(format!("[유령 항목] {}", item.item_name));
            stats.record(Category::ItemName, false);
            continue;
        };
        stats.record(Category::ItemName, true);
        matched.insert(key);

        let qty_ok = item.qty == expected.qty;
        if !qty_ok {
            diffs.push(format!(
                "[수량 불일치] {}: AI({}) vs 정답({})",
                item.item_name, item.qty, expected.qty
            ));
        }
        stats.record(Category::Quantity, qty_ok);

        if round >= 2 {
            let type_ok = normalize_key(&item.item_type) == normalize_key(&expected.item_type);
            if !type_ok {
                diffs.push(format!(
                    "[종류 불일치] {}: AI({}) vs 정답({})",
                    item.item_name, item.item_type, expected.item_type
                ));
            }
            stats.record(Category::ItemType, type_ok);
        }

        for reference in &item.refs {
            let Some(expected_coord) = truth.coords.get(reference) else {
                continue;
            };
            match student.coords.get(reference) {
                None => {
                    diffs.push(format!("[좌표 누락] {}", reference));
                    stats.record(Category::CoordX, false);
                    stats.record(Category::CoordY, false);
                }
                Some(coord) => {
                    compare_coordinate(reference, coord, expected_coord, &mut diffs, &mut stats)
                }
            }
        }
    }

    // 标准答案中没有被任何学生项目命中的品名
    let mut reported: HashSet<&str> = HashSet::new();
    for item in &truth.items {
        let key = normalize_key(&item.item_name);
        if matched.contains(&key) {
            continue;
        }
        let Some(expected) = truth_items.get(&key) else {
            continue;
        };
        if reported.insert(expected.item_name.as_str()) {
            diffs.push(format!("[누락 항목] {}", expected.item_name));
            stats.record(Category::ItemName, false);
        }
    }

    ComparisonOutcome { diffs, stats }
}

fn compare_coordinate(
    reference: &str,
    coord: &Coordinate,
    expected: &Coordinate,
    diffs: &mut Vec<String>,
    stats: &mut ComparisonStats,
) {
    let x_ok = same_axis(coord.x.as_deref(), expected.x.as_deref());
    let y_ok = same_axis(coord.y.as_deref(), expected.y.as_deref());
    stats.record(Category::CoordX, x_ok);
    stats.record(Category::CoordY, y_ok);
    if !x_ok || !y_ok {
        diffs.push(format!(
            "[좌표 불일치] {}: AI({},{}) vs 정답({},{})",
            reference,
            show(&coord.x),
            show(&coord.y),
            show(&expected.x),
            show(&expected.y)
        ));
    }

    if let Some(expected_rot) = &expected.rot {
        match &coord.rot {
            None => {
                diffs.push(format!("[회전 누락] {}", reference));
                stats.record(Category::Rotation, false);
            }
            Some(rot) => {
                let rot_ok = rot.trim() == expected_rot.trim();
                if !rot_ok {
                    diffs.push(format!(
                        "[회전 불일치] {}: AI({}) vs 정답({})",
                        reference, rot, expected_rot
                    ));
                }
                stats.record(Category::Rotation, rot_ok);
            }
        }
    }

    if let Some(expected_side) = &expected.side {
        match &coord.side {
            None => {
                diffs.push(format!("[면 누락] {}", reference));
                stats.record(Category::Side, false);
            }
            Some(side) => {
                let side_ok = normalize_side(side) == normalize_side(expected_side);
                if !side_ok {
                    diffs.push(format!(
                        "[면 불일치] {}: AI({}) vs 정답({})",
                        reference, side, expected_side
                    ));
                }
                stats.record(Category::Side, side_ok);
            }
        }
    }
}
