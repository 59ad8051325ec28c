use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ExtractionError;

/// 四种抽取约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    StudentBom,
    StudentCoord,
    TruthBom,
    TruthCoord,
}

impl Contract {
    pub fn name(&self) -> &'static str {
        match self {
            Contract::StudentBom => "student-bom",
            Contract::StudentCoord => "student-coord",
            Contract::TruthBom => "truth-bom",
            Contract::TruthCoord => "truth-coord",
        }
    }

    fn schema_error(&self, reason: impl Into<String>) -> ExtractionError {
        ExtractionError::Schema {
            contract: self.name(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// BOM 行项目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub qty: String,
    #[serde(default, deserialize_with = "lenient_refs")]
    pub refs: Vec<String>,
}

/// 单个位号的贴片坐标
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<String>,
    #[serde(
        default,
        alias = "rotation",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub rot: Option<String>,
    #[serde(
        default,
        alias = "layer",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub side: Option<String>,
}

/// 一次抽取的结构化结果（学生或标准答案）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub items: Vec<BomItem>,
    pub coords: BTreeMap<String, Coordinate>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.coords.is_empty()
    }
}

/// 解析 `{ "items": [...] }` 形式的 BOM 响应
///
/// 缺少 `items` 视为空列表；非对象的数组元素被丢弃
pub fn parse_bom_items(contract: Contract, value: Value) -> Result<Vec<BomItem>, ExtractionError> {
    let Value::Object(mut root) = value else {
        return Err(contract.schema_error("顶层不是 JSON 对象"));
    };

    let items = match root.remove("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(contract.schema_error(format!("items 不是数组: {}", type_name(&other))))
        }
    };

    items
        .into_iter()
        .filter(|item| item.is_object())
        .map(|item| {
            serde_json::from_value::<BomItem>(item)
                .map_err(|e| contract.schema_error(format!("items 元素非法: {}", e)))
        })
        .collect()
}

/// 解析 `{ "R1": { "x", "y", "rot", "side" } }` 形式的坐标响应
///
/// 值不是对象或字段无法解析的条目被丢弃，其余条目保留
pub fn parse_coordinate_map(
    contract: Contract,
    value: Value,
) -> Result<BTreeMap<String, Coordinate>, ExtractionError> {
    let Value::Object(root) = value else {
        return Err(contract.schema_error("顶层不是 JSON 对象"));
    };

    let mut coords = BTreeMap::new();
    for (ref_des, entry) in root {
        if !entry.is_object() {
            continue;
        }
        match serde_json::from_value::<Coordinate>(entry) {
            Ok(coord) => {
                coords.insert(ref_des, coord);
            }
            Err(e) => warn!("⚠️ [{}] {} 坐标非法，已丢弃: {}", contract.name(), ref_des, e),
        }
    }
    Ok(coords)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ========== 宽松反序列化 ==========
//
// 模型输出里数字和字符串经常混用（"qty": 4 / "qty": "4"），统一收敛成字符串

struct LenientString(Option<String>);

struct LenientStringVisitor;

impl<'de> Visitor<'de> for LenientStringVisitor {
    type Value = LenientString;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string, number, bool or null")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value.to_string())))
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value)))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value.to_string())))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value.to_string())))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value.to_string())))
    }

    fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(Some(value.to_string())))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(None))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LenientString(None))
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientStringVisitor)
    }
}

impl<'de> Deserialize<'de> for LenientString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientStringVisitor)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(LenientString::deserialize(deserializer)?.0.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(LenientString::deserialize(deserializer)?.0)
}

/// 位号列表：数组，或逗号/空白分隔的字符串
fn lenient_refs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RefsVisitor;

    impl<'de> Visitor<'de> for RefsVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an array of references or a separated string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut refs = Vec::new();
            while let Some(LenientString(item)) = seq.next_element()? {
                if let Some(r) = item {
                    let r = r.trim();
                    if !r.is_empty() {
                        refs.push(r.to_string());
                    }
                }
            }
            Ok(refs)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(RefsVisitor)
}
