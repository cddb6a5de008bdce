//! 模拟库存事件生成
//!
//! 没有真实的数据来源，所有字段都从注入的随机数源中独立均匀抽取。

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// 条目年份范围 [2000, 2020)
pub const YEAR_RANGE: Range<i32> = 2000..2020;
/// 每条事件的数量范围 [1, 10]
pub const COUNT_MIN: i32 = 1;
pub const COUNT_MAX: i32 = 10;

/// 库存类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Hardware,
    Software,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Hardware, Category::Software];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hardware => "hardware",
            Category::Software => "software",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = InventoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hardware" => Ok(Category::Hardware),
            "software" => Ok(Category::Software),
            other => Err(InventoryError::UnknownCategory(other.to_string())),
        }
    }
}

/// 库存动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sell,
    Buy,
    Destroy,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Sell, Action::Buy, Action::Destroy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sell => "sell",
            Action::Buy => "buy",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = InventoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sell" => Ok(Action::Sell),
            "buy" => Ok(Action::Buy),
            "destroy" => Ok(Action::Destroy),
            other => Err(InventoryError::UnknownAction(other.to_string())),
        }
    }
}

/// 条目描述（硬件与软件共用同一形状）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetails {
    pub name: String,
    pub description: String,
    pub year: i32,
}

/// 标签联合：每条记录恰好携带一种条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    HardwareItem(ItemDetails),
    SoftwareItem(ItemDetails),
}

impl Item {
    pub fn new(category: Category, details: ItemDetails) -> Self {
        match category {
            Category::Hardware => Item::HardwareItem(details),
            Category::Software => Item::SoftwareItem(details),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Item::HardwareItem(_) => Category::Hardware,
            Item::SoftwareItem(_) => Category::Software,
        }
    }

    pub fn details(&self) -> &ItemDetails {
        match self {
            Item::HardwareItem(details) | Item::SoftwareItem(details) => details,
        }
    }
}

/// 一条库存变更事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRecord {
    pub count: i32,
    pub action: Action,
    #[serde(flatten)]
    pub item: Item,
}

/// 库存生成错误类型
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("类别 {0} 没有可用的条目模板")]
    EmptyCatalog(Category),
    #[error("未知的库存类别: {0}")]
    UnknownCategory(String),
    #[error("未知的库存动作: {0}")]
    UnknownAction(String),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

/// 条目模板：名称与描述固定，年份每次随机
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pub name: String,
    pub description: String,
}

impl ItemTemplate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// 各类别的条目模板
#[derive(Debug, Clone)]
pub struct Catalog {
    pub hardware: Vec<ItemTemplate>,
    pub software: Vec<ItemTemplate>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            hardware: vec![ItemTemplate::new("CPU", "i7")],
            software: vec![ItemTemplate::new("MSWord", "office")],
        }
    }
}

impl Catalog {
    #[inline]
    pub fn templates(&self, category: Category) -> &[ItemTemplate] {
        match category {
            Category::Hardware => &self.hardware,
            Category::Software => &self.software,
        }
    }
}

/// 库存事件生成器，随机数源由调用方注入
pub struct InventoryGenerator<R> {
    rng: R,
    catalog: Catalog,
}

impl<R: Rng> InventoryGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self::with_catalog(rng, Catalog::default())
    }

    pub fn with_catalog(rng: R, catalog: Catalog) -> Self {
        Self { rng, catalog }
    }

    /// 生成指定类别的条目描述
    pub fn item(&mut self, category: Category) -> Result<ItemDetails> {
        let template = self
            .catalog
            .templates(category)
            .choose(&mut self.rng)
            .ok_or(InventoryError::EmptyCatalog(category))?;

        Ok(ItemDetails {
            name: template.name.clone(),
            description: template.description.clone(),
            year: self.rng.random_range(YEAR_RANGE),
        })
    }

    /// 生成指定类别的库存事件
    pub fn record(&mut self, category: Category) -> Result<InventoryRecord> {
        let action = Action::ALL[self.rng.random_range(0..Action::ALL.len())];
        let count = self.rng.random_range(COUNT_MIN..=COUNT_MAX);
        let details = self.item(category)?;

        Ok(InventoryRecord {
            count,
            action,
            item: Item::new(category, details),
        })
    }

    /// 均匀选择类别后生成一条库存事件
    pub fn next_record(&mut self) -> Result<InventoryRecord> {
        let category = Category::ALL[self.rng.random_range(0..Category::ALL.len())];
        self.record(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn seeded(seed: u64) -> InventoryGenerator<StdRng> {
        InventoryGenerator::new(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_item_uses_catalog_and_year_range() {
        let mut generator = seeded(7);
        for _ in 0..200 {
            let hw = generator.item(Category::Hardware).unwrap();
            assert_eq!(hw.name, "CPU");
            assert_eq!(hw.description, "i7");
            assert!(YEAR_RANGE.contains(&hw.year));

            let sw = generator.item(Category::Software).unwrap();
            assert_eq!(sw.name, "MSWord");
            assert_eq!(sw.description, "office");
            assert!(YEAR_RANGE.contains(&sw.year));
        }
    }

    #[test]
    fn test_record_fields_in_range() {
        let mut generator = seeded(42);
        for _ in 0..500 {
            let record = generator.next_record().unwrap();
            assert!((COUNT_MIN..=COUNT_MAX).contains(&record.count));
            assert!(Action::ALL.contains(&record.action));
            assert!(YEAR_RANGE.contains(&record.item.details().year));
        }
    }

    #[test]
    fn test_record_keeps_requested_category() {
        let mut generator = seeded(3);
        let record = generator.record(Category::Software).unwrap();
        assert_eq!(record.item.category(), Category::Software);
        assert!(matches!(record.item, Item::SoftwareItem(_)));
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        let mut generator = seeded(2024);
        let mut actions: HashMap<Action, usize> = HashMap::new();
        let mut categories: HashMap<Category, usize> = HashMap::new();

        for _ in 0..1000 {
            let record = generator.next_record().unwrap();
            *actions.entry(record.action).or_default() += 1;
            *categories.entry(record.item.category()).or_default() += 1;
        }

        // 期望值 333 / 500，留出足够的统计余量
        for action in Action::ALL {
            let n = actions.get(&action).copied().unwrap_or(0);
            assert!((250..=420).contains(&n), "{action}: {n}");
        }
        for category in Category::ALL {
            let n = categories.get(&category).copied().unwrap_or(0);
            assert!((400..=600).contains(&n), "{category}: {n}");
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = seeded(99);
        let mut b = seeded(99);
        for _ in 0..20 {
            assert_eq!(a.next_record().unwrap(), b.next_record().unwrap());
        }
    }

    #[test]
    fn test_empty_catalog_fails() {
        let catalog = Catalog {
            hardware: Vec::new(),
            software: vec![ItemTemplate::new("Vim", "editor")],
        };
        let mut generator = InventoryGenerator::with_catalog(StdRng::seed_from_u64(1), catalog);

        assert!(matches!(
            generator.record(Category::Hardware),
            Err(InventoryError::EmptyCatalog(Category::Hardware))
        ));
        assert_eq!(generator.item(Category::Software).unwrap().name, "Vim");
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("hardware".parse::<Category>().unwrap(), Category::Hardware);
        assert_eq!(Category::Software.to_string(), "software");
        assert_eq!("destroy".parse::<Action>().unwrap(), Action::Destroy);
        assert!(matches!(
            "rent".parse::<Action>(),
            Err(InventoryError::UnknownAction(_))
        ));
        assert!("firmware".parse::<Category>().is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let record = InventoryRecord {
            count: 3,
            action: Action::Buy,
            item: Item::HardwareItem(ItemDetails {
                name: "CPU".to_string(),
                description: "i7".to_string(),
                year: 2011,
            }),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "count": 3,
                "action": "buy",
                "hardware_item": {"name": "CPU", "description": "i7", "year": 2011}
            })
        );
        assert!(value.get("software_item").is_none());
    }
}
