// src/logic/region_index.rs
//! パーセント指定の領域をテーブルの絶対座標に変換して、点がどの領域にあるかを調べる。

use std::collections::HashSet;

use log::debug;
use serde::Deserialize;

use crate::components::position::TableRect;
use crate::components::region::Region;
use crate::components::stack::{GroupId, RegionId};
use crate::config::EngineConfig;
use crate::error::{TableError, TableResult};

/// レイアウト定義 JSON の形。`{"regions": [...]}`、ただの配列、`{id: {...}}` のマップのどれでも。
/// マップの場合も書かれた順番が宣言順になる。
#[derive(Deserialize)]
#[serde(untagged)]
enum LayoutDescriptor {
    Wrapped { regions: Vec<Region> },
    List(Vec<Region>),
    Map(serde_json::Map<String, serde_json::Value>),
}

/// 宣言順の領域リストと、それを置くテーブルの大きさ。
#[derive(Debug, Clone)]
pub struct RegionIndex {
    regions: Vec<Region>,
    table_width: f32,
    table_depth: f32,
}

impl RegionIndex {
    pub fn new(regions: Vec<Region>, config: &EngineConfig) -> TableResult<Self> {
        let mut seen = HashSet::new();
        for region in &regions {
            if !seen.insert(region.id.clone()) {
                return Err(TableError::DuplicateRegion(region.id.clone()));
            }
        }
        debug!("RegionIndex: {} regions declared", regions.len());
        Ok(Self { regions, table_width: config.table_width, table_depth: config.table_depth })
    }

    pub fn from_json(json: &str, config: &EngineConfig) -> TableResult<Self> {
        let descriptor: LayoutDescriptor = serde_json::from_str(json).map_err(TableError::LayoutParse)?;
        let regions = match descriptor {
            LayoutDescriptor::Wrapped { regions } | LayoutDescriptor::List(regions) => regions,
            LayoutDescriptor::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| {
                    let mut region: Region = serde_json::from_value(value).map_err(TableError::LayoutParse)?;
                    if region.id.as_str().is_empty() {
                        region.id = RegionId(key);
                    }
                    Ok(region)
                })
                .collect::<TableResult<Vec<_>>>()?,
        };
        Self::new(regions, config)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: &RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| &r.id == id)
    }

    /// 宣言順での位置。描画優先度の基準に使う。
    pub fn position_of(&self, id: &RegionId) -> Option<usize> {
        self.regions.iter().position(|r| &r.id == id)
    }

    /// グループが表示されている最初の (見える) 領域。
    pub fn region_for_group(&self, group: &GroupId) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.visible && r.group_id.as_ref() == Some(group))
    }

    /// パーセント指定をテーブルの絶対座標にする。(0, 0) がテーブルの左奥の角。
    pub fn resolve(&self, region: &Region) -> TableRect {
        let origin_x = -self.table_width / 2.0;
        let origin_z = -self.table_depth / 2.0;
        TableRect {
            left: origin_x + region.left.normalized() / 100.0 * self.table_width,
            top: origin_z + region.top.normalized() / 100.0 * self.table_depth,
            width: region.width.normalized() / 100.0 * self.table_width,
            depth: region.height.normalized() / 100.0 * self.table_depth,
        }
    }

    /// 境界上の点も「中」とみなす。
    pub fn point_in_region(&self, x: f32, z: f32, region: &Region) -> bool {
        self.resolve(region).contains(x, z)
    }

    /// 宣言順で最初に当たった、見えている領域を返す。
    pub fn find_region_at_point(&self, x: f32, z: f32) -> Option<&Region> {
        self.regions
            .iter()
            .filter(|r| r.visible)
            .find(|r| self.point_in_region(x, z, r))
    }
}
