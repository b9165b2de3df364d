use std::collections::HashMap;

use scopy_core::document::ElementId;
use scopy_core::geometry::Point2;
use scopy_core::store::DocumentStore;
use tracing::{debug, warn};

use crate::errors::EngineError;

/// 源图纸上“视图 → 视口中心”的映射，构建后只读。
#[derive(Debug, Clone)]
pub struct PlacementRecord {
    centers: HashMap<ElementId, Point2>,
    overwritten: Vec<ElementId>,
}

impl PlacementRecord {
    #[inline]
    pub fn center_of(&self, view: ElementId) -> Option<Point2> {
        self.centers.get(&view).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// 在同一图纸上出现多次的视图；映射中保留的是最后一次出现的中心。
    #[inline]
    pub fn overwritten(&self) -> &[ElementId] {
        &self.overwritten
    }
}

pub struct ViewportLayoutIndex;

impl ViewportLayoutIndex {
    pub fn build<S: DocumentStore>(
        store: &S,
        sheet: ElementId,
    ) -> Result<PlacementRecord, EngineError> {
        if store.sheet(sheet).is_none() {
            return Err(EngineError::NotASheet(sheet));
        }

        let mut centers = HashMap::new();
        let mut overwritten = Vec::new();
        for viewport in store.viewports_on(sheet) {
            if centers.insert(viewport.view, viewport.center).is_some() {
                warn!(
                    sheet = sheet.get(),
                    view = viewport.view.get(),
                    "同一视图在源图纸上放置了多次，以最后一个视口为准"
                );
                overwritten.push(viewport.view);
            }
        }
        debug!(sheet = sheet.get(), viewports = centers.len(), "已建立视口布局索引");

        Ok(PlacementRecord {
            centers,
            overwritten,
        })
    }
}

/// 按源图纸缓存布局索引，每个批次每张源图纸只构建一次。
#[derive(Debug, Default)]
pub struct LayoutCache {
    records: HashMap<ElementId, PlacementRecord>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<S: DocumentStore>(
        &mut self,
        store: &S,
        sheet: ElementId,
    ) -> Result<&PlacementRecord, EngineError> {
        if !self.records.contains_key(&sheet) {
            let record = ViewportLayoutIndex::build(store, sheet)?;
            self.records.insert(sheet, record);
        }
        self.records
            .get(&sheet)
            .ok_or(EngineError::NotASheet(sheet))
    }

    #[inline]
    pub fn get(&self, sheet: ElementId) -> Option<&PlacementRecord> {
        self.records.get(&sheet)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
