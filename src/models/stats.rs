use serde::ser::{Serialize, SerializeMap, Serializer};

/// 比对统计类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 品名（是否存在）
    ItemName,
    /// SET 数量
    Quantity,
    /// 元件种类
    ItemType,
    /// X 坐标
    CoordX,
    /// Y 坐标
    CoordY,
    /// 旋转角度
    Rotation,
    /// 贴装面
    Side,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ItemName,
        Category::Quantity,
        Category::ItemType,
        Category::CoordX,
        Category::CoordY,
        Category::Rotation,
        Category::Side,
    ];

    /// 报告/日志中使用的标签
    pub fn label(self) -> &'static str {
        match self {
            Category::ItemName => "품명",
            Category::Quantity => "SET",
            Category::ItemType => "종류",
            Category::CoordX => "좌표X",
            Category::CoordY => "좌표Y",
            Category::Rotation => "회전",
            Category::Side => "면",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 单个类别的计数，始终满足 `fail <= total`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CategoryTally {
    pub total: u32,
    pub fail: u32,
}

/// 七个类别的比对统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonStats {
    tallies: [CategoryTally; 7],
}

impl ComparisonStats {
    /// 记录一次检查
    pub fn record(&mut self, category: Category, passed: bool) {
        let tally = &mut self.tallies[category.index()];
        tally.total += 1;
        if !passed {
            tally.fail += 1;
        }
    }

    pub fn get(&self, category: Category) -> CategoryTally {
        self.tallies[category.index()]
    }

    /// 合并另一块板的统计
    pub fn merge(&mut self, other: &ComparisonStats) {
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies.iter()) {
            mine.total += theirs.total;
            mine.fail += theirs.fail;
        }
    }

    pub fn failures(&self) -> u32 {
        self.tallies.iter().map(|t| t.fail).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, CategoryTally)> + '_ {
        Category::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

impl Serialize for ComparisonStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, tally) in self.iter() {
            map.serialize_entry(category.label(), &tally)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut a = ComparisonStats::default();
        a.record(Category::Quantity, true);
        a.record(Category::Quantity, false);
        a.record(Category::Side, false);

        let mut b = ComparisonStats::default();
        b.record(Category::Quantity, false);

        a.merge(&b);
        assert_eq!(a.get(Category::Quantity), CategoryTally { total: 3, fail: 2 });
        assert_eq!(a.get(Category::Side), CategoryTally { total: 1, fail: 1 });
        assert_eq!(a.get(Category::CoordX), CategoryTally::default());
        assert_eq!(a.failures(), 3);
        assert!(a.iter().all(|(_, t)| t.fail <= t.total));
    }

    #[test]
    fn test_serializes_as_label_map() {
        let mut stats = ComparisonStats::default();
        stats.record(Category::ItemName, false);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["품명"]["total"], 1);
        assert_eq!(value["품명"]["fail"], 1);
        assert_eq!(value["면"]["total"], 0);
    }
}
