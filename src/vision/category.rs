//! # 类别归一化模块
//!
//! 检测服务返回的是细粒度标签（如“T恤”“笔记本电脑”），物品库只使用少量粗粒度类别。
//! 这里用静态多对一映射表完成转换：
//!
//! - 命中映射表（忽略大小写与首尾空白）：返回对应粗类别
//! - 未命中的非空标签：原样作为独立类别透传
//! - 空标签：归为“其他”

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

/// 粗粒度物品类别。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoarseCategory {
    Electronics,
    Clothing,
    Furniture,
    Kitchenware,
    SportingGoods,
    Cosmetics,
    Tools,
    Toys,
    Books,
    Stationery,
    Other,
    /// 未知标签原样透传。
    Passthrough(String),
}

impl CoarseCategory {
    /// 全部固定类别（不含透传）。
    pub const FIXED: [CoarseCategory; 11] = [
        Self::Electronics,
        Self::Clothing,
        Self::Furniture,
        Self::Kitchenware,
        Self::SportingGoods,
        Self::Cosmetics,
        Self::Tools,
        Self::Toys,
        Self::Books,
        Self::Stationery,
        Self::Other,
    ];

    /// 展示名称（与物品库中的类别名一致）。
    pub fn as_str(&self) -> &str {
        match self {
            Self::Electronics => "电子产品",
            Self::Clothing => "衣服",
            Self::Furniture => "家具",
            Self::Kitchenware => "厨具",
            Self::SportingGoods => "运动用品",
            Self::Cosmetics => "化妆品",
            Self::Tools => "工具",
            Self::Toys => "玩具",
            Self::Books => "书籍",
            Self::Stationery => "文具",
            Self::Other => "其他",
            Self::Passthrough(label) => label,
        }
    }

    /// 稳定的英文键，透传类别返回 `None`。
    pub fn key(&self) -> Option<&'static str> {
        Some(match self {
            Self::Electronics => "electronics",
            Self::Clothing => "clothing",
            Self::Furniture => "furniture",
            Self::Kitchenware => "kitchenware",
            Self::SportingGoods => "sporting_goods",
            Self::Cosmetics => "cosmetics",
            Self::Tools => "tools",
            Self::Toys => "toys",
            Self::Books => "books",
            Self::Stationery => "stationery",
            Self::Other => "other",
            Self::Passthrough(_) => return None,
        })
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }
}

impl fmt::Display for CoarseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CoarseCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

const FINE_LABELS: &[(CoarseCategory, &[&str])] = &[
    (
        CoarseCategory::Electronics,
        &[
            "电子产品", "手机", "智能手机", "电脑", "笔记本电脑", "笔记本", "平板电脑", "平板",
            "显示器", "键盘", "鼠标", "耳机", "音箱", "相机", "数码相机", "充电器", "数据线",
            "电视", "遥控器", "路由器", "手表", "智能手表", "游戏机", "电子产品配件",
            "electronics", "phone", "laptop", "keyboard", "mouse", "headphones", "camera",
        ],
    ),
    (
        CoarseCategory::Clothing,
        &[
            "衣服", "衣物", "服装", "t恤", "t恤衫", "衬衫", "外套", "夹克", "毛衣", "卫衣",
            "裤子", "牛仔裤", "短裤", "裙子", "连衣裙", "帽子", "围巾", "手套", "袜子", "鞋",
            "鞋子", "运动鞋", "靴子", "领带", "clothing", "shirt", "t-shirt", "jacket", "shoes",
        ],
    ),
    (
        CoarseCategory::Furniture,
        &[
            "家具", "椅子", "桌子", "书桌", "餐桌", "沙发", "床", "柜子", "衣柜", "书柜",
            "书架", "凳子", "茶几", "床头柜", "furniture", "chair", "table", "sofa", "bed",
        ],
    ),
    (
        CoarseCategory::Kitchenware,
        &[
            "厨具", "餐具", "锅", "炒锅", "平底锅", "碗", "盘子", "杯子", "水杯", "马克杯",
            "筷子", "勺子", "叉子", "刀具", "菜刀", "砧板", "水壶", "保温杯", "kitchenware",
            "cup", "mug", "bowl", "plate", "pan",
        ],
    ),
    (
        CoarseCategory::SportingGoods,
        &[
            "运动用品", "篮球", "足球", "排球", "网球", "羽毛球", "乒乓球", "球拍",
            "羽毛球拍", "网球拍", "哑铃", "瑜伽垫", "跳绳", "滑板", "自行车", "头盔",
            "sporting goods", "ball", "racket", "dumbbell",
        ],
    ),
    (
        CoarseCategory::Cosmetics,
        &[
            "化妆品", "口红", "唇膏", "粉底", "粉底液", "眼影", "睫毛膏", "香水", "面霜",
            "乳液", "护肤品", "防晒霜", "指甲油", "cosmetics", "lipstick", "perfume",
        ],
    ),
    (
        CoarseCategory::Tools,
        &[
            "工具", "锤子", "螺丝刀", "扳手", "钳子", "卷尺", "电钻", "锯子", "手电筒",
            "剪刀", "工具箱", "tools", "hammer", "screwdriver", "wrench",
        ],
    ),
    (
        CoarseCategory::Toys,
        &[
            "玩具", "毛绒玩具", "玩偶", "积木", "乐高", "拼图", "模型", "玩具车", "布娃娃",
            "toys", "toy", "doll", "lego",
        ],
    ),
    (
        CoarseCategory::Books,
        &[
            "书籍", "书", "图书", "书本", "杂志", "漫画", "课本", "教科书", "词典",
            "books", "book", "magazine",
        ],
    ),
    (
        CoarseCategory::Stationery,
        &[
            "文具", "笔", "钢笔", "铅笔", "圆珠笔", "中性笔", "橡皮", "尺子",
            "本子", "文件夹", "订书机", "胶带", "便利贴", "stationery", "pen", "pencil",
        ],
    ),
    (CoarseCategory::Other, &["其他", "other"]),
];

static CATEGORY_TABLE: Lazy<HashMap<String, CoarseCategory>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for (category, labels) in FINE_LABELS {
        for label in *labels {
            table.insert(label.to_lowercase(), category.clone());
        }
    }
    table
});

/// 将细粒度标签映射为粗类别。
pub fn coarsen(label: &str) -> CoarseCategory {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return CoarseCategory::Other;
    }

    CATEGORY_TABLE
        .get(&trimmed.to_lowercase())
        .cloned()
        .unwrap_or_else(|| CoarseCategory::Passthrough(trimmed.to_string()))
}
