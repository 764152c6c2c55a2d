// src/components/region.rs
//! レイアウト定義に出てくる「領域 (Region)」のデータ型。
//! テーブル上の長方形エリアで、レイアウトの種類とバインドされたグループを持つよ。

use serde::{Deserialize, Serialize};

use crate::components::stack::{GroupId, RegionId};
use crate::logic::percent;

/// 領域の中でスタックをどう並べるか。
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    /// スタックごとに自由な位置を持つ (テーブルの真ん中とか)。
    #[default]
    Free,
    /// 左から右へ等間隔に並べる。
    Row,
    /// 全部のスタックを中央に重ねる (山札)。
    Pile,
    /// 手札みたいに縦長で詰めて並べる。
    Fan,
    /// 知らない種類の文字列。左上に寄せるだけ。
    #[serde(other)]
    Unknown,
}

impl RegionType {
    /// 領域内に位置の順序があるかどうか。row/fan だけが挿入位置を持つ。
    pub fn is_ordered(self) -> bool {
        matches!(self, RegionType::Row | RegionType::Fan)
    }
}

/// スタック内のカードをずらしていく向き (二次軸)。
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
    Right,
    Left,
    /// 横にはずらさず、高さ方向にだけ積む。
    #[serde(alias = "stacked")]
    None,
}

impl Direction {
    /// (x, z) の単位ベクトル。
    pub fn axis(self) -> (f32, f32) {
        match self {
            Direction::Down => (0.0, 1.0),
            Direction::Up => (0.0, -1.0),
            Direction::Right => (1.0, 0.0),
            Direction::Left => (-1.0, 0.0),
            Direction::None => (0.0, 0.0),
        }
    }
}

/// パーセント値のいろんな書き方をそのまま受け取る箱。
/// 0.25 / 25 / "25" / "25%" / "1/4" どれでも OK。正規化は `percent` モジュールで。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum PercentValue {
    Number(f64),
    Text(String),
    /// bool や null など、どれにも当てはまらない値。0 扱い。
    Other(serde_json::Value),
}

impl Default for PercentValue {
    fn default() -> Self {
        PercentValue::Number(0.0)
    }
}

impl PercentValue {
    /// 0-100 に正規化した値。
    pub fn normalized(&self) -> f32 {
        match self {
            PercentValue::Number(value) => percent::normalize_number(*value),
            PercentValue::Text(text) => percent::parse_percent(text),
            PercentValue::Other(_) => 0.0,
        }
    }
}

impl From<f64> for PercentValue {
    fn from(value: f64) -> Self {
        PercentValue::Number(value)
    }
}

impl From<&str> for PercentValue {
    fn from(text: &str) -> Self {
        PercentValue::Text(text.to_string())
    }
}

fn default_visible() -> bool {
    true
}

/// レイアウト定義1件分。レイアウトが決まったら変更しない。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub id: RegionId,
    #[serde(rename = "type", default)]
    pub region_type: RegionType,
    #[serde(default)]
    pub left: PercentValue,
    #[serde(default)]
    pub top: PercentValue,
    #[serde(default)]
    pub width: PercentValue,
    #[serde(default)]
    pub height: PercentValue,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default, alias = "group_id")]
    pub group_id: Option<GroupId>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl Region {
    /// テスト・デモ用の手軽なコンストラクタ。値はパーセント (0-100)。
    pub fn new(id: &str, region_type: RegionType, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            id: RegionId::from(id),
            region_type,
            left: PercentValue::Number(left),
            top: PercentValue::Number(top),
            width: PercentValue::Number(width),
            height: PercentValue::Number(height),
            direction: None,
            group_id: None,
            visible: true,
            label: None,
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group_id = Some(GroupId::from(group));
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// カードをずらす向き。未指定なら領域の種類ごとのデフォルト。
    pub fn stack_direction(&self) -> Direction {
        self.direction.unwrap_or(match self.region_type {
            RegionType::Free | RegionType::Row => Direction::Down,
            RegionType::Pile | RegionType::Fan | RegionType::Unknown => Direction::None,
        })
    }

    /// ログやメッセージで使う表示名。
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}
