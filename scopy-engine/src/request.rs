use std::fmt;

use scopy_core::document::{ElementId, ViewKind};
use scopy_core::store::DocumentStore;
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::registry::IdentifierRegistry;

/// 视口复制方式的标签，用于日志与报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementMode {
    CopyShallow,
    CopyWithDetailing,
    CreateNew,
    ReferenceShared,
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlacementMode::CopyShallow => "copy",
            PlacementMode::CopyWithDetailing => "copy-with-detailing",
            PlacementMode::CreateNew => "create-new",
            PlacementMode::ReferenceShared => "shared",
        };
        f.write_str(label)
    }
}

/// 单个视口的复制策略，各变体携带该策略所需的数据。
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    CopyShallow { title: String },
    CopyWithDetailing { title: String },
    /// 在指定标高（按名称）上新建平面视图。
    CreateNew { level: String, title: String },
    /// 直接在新图纸上再次放置原视图。
    ReferenceShared,
}

impl Placement {
    pub fn mode(&self) -> PlacementMode {
        match self {
            Placement::CopyShallow { .. } => PlacementMode::CopyShallow,
            Placement::CopyWithDetailing { .. } => PlacementMode::CopyWithDetailing,
            Placement::CreateNew { .. } => PlacementMode::CreateNew,
            Placement::ReferenceShared => PlacementMode::ReferenceShared,
        }
    }

    /// 新视图的名称；共享模式不产生新视图，返回 `None`。
    pub fn title(&self) -> Option<&str> {
        match self {
            Placement::CopyShallow { title }
            | Placement::CopyWithDetailing { title }
            | Placement::CreateNew { title, .. } => Some(title),
            Placement::ReferenceShared => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewOnSheetRequest {
    pub old_view: ElementId,
    pub placement: Placement,
    pub view_template: Option<String>,
}

impl ViewOnSheetRequest {
    pub fn copy(old_view: ElementId, title: impl Into<String>) -> Self {
        Self::with_placement(
            old_view,
            Placement::CopyShallow {
                title: title.into(),
            },
        )
    }

    pub fn copy_with_detailing(old_view: ElementId, title: impl Into<String>) -> Self {
        Self::with_placement(
            old_view,
            Placement::CopyWithDetailing {
                title: title.into(),
            },
        )
    }

    pub fn create_new(
        old_view: ElementId,
        level: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::with_placement(
            old_view,
            Placement::CreateNew {
                level: level.into(),
                title: title.into(),
            },
        )
    }

    pub fn shared(old_view: ElementId) -> Self {
        Self::with_placement(old_view, Placement::ReferenceShared)
    }

    pub fn with_placement(old_view: ElementId, placement: Placement) -> Self {
        Self {
            old_view,
            placement,
            view_template: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.view_template = Some(template.into());
        self
    }

    #[inline]
    pub fn mode(&self) -> PlacementMode {
        self.placement.mode()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestedSheet {
    pub number: String,
    pub title: String,
    pub category: String,
    pub source: ElementId,
    pub views: Vec<ViewOnSheetRequest>,
}

impl RequestedSheet {
    pub fn new(
        source: ElementId,
        number: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            title: title.into(),
            category: category.into(),
            source,
            views: Vec::new(),
        }
    }

    pub fn with_view(mut self, view: ViewOnSheetRequest) -> Self {
        self.views.push(view);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub title_suffix: String,
    pub copy_detailing: bool,
    pub share_legends: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            title_suffix: " - Copy".to_string(),
            copy_detailing: false,
            share_legends: true,
        }
    }
}

/// 根据源图纸生成待复制图纸的默认配置。
///
/// 规划阶段使用独立的 [`IdentifierRegistry`]，每次生成的编号与视图名称都会立即登记，
/// 因此同一源图纸复制多份时不会得到相同的编号。
pub struct BatchPlanner<'a, S: DocumentStore> {
    store: &'a S,
    registry: IdentifierRegistry,
    options: PlannerOptions,
    sheets: Vec<RequestedSheet>,
}

impl<'a, S: DocumentStore> BatchPlanner<'a, S> {
    pub fn new(store: &'a S, options: PlannerOptions) -> Self {
        Self {
            store,
            registry: IdentifierRegistry::from_store(store),
            options,
            sheets: Vec::new(),
        }
    }

    pub fn add_sheet_by_number(&mut self, number: &str) -> Result<&RequestedSheet, EngineError> {
        let wanted = number.to_uppercase();
        let source = self
            .store
            .sheets()
            .into_iter()
            .find(|sheet| sheet.number.to_uppercase() == wanted)
            .map(|sheet| sheet.id)
            .ok_or_else(|| EngineError::SheetNumberNotFound(number.to_string()))?;
        self.add_sheet(source)
    }

    pub fn add_sheet(&mut self, source: ElementId) -> Result<&RequestedSheet, EngineError> {
        let sheet = self
            .store
            .sheet(source)
            .ok_or(EngineError::NotASheet(source))?;

        let number = self.registry.allocate_derived_sheet_number(&sheet.number);
        self.registry.register_sheet_number(&number);
        let mut requested = RequestedSheet::new(
            source,
            number,
            format!("{}{}", sheet.title, self.options.title_suffix),
            sheet.category.clone(),
        );

        for viewport in self.store.viewports_on(source) {
            let Some(view) = self.store.view(viewport.view) else {
                warn!(view = viewport.view.get(), "视口引用的视图不存在，跳过");
                continue;
            };
            let request = if self.options.share_legends && view.kind.is_shareable() {
                ViewOnSheetRequest::shared(view.id)
            } else {
                let title = self.registry.allocate_derived_view_name(&view.name);
                self.registry.register_view_name(&title);
                if self.options.copy_detailing {
                    ViewOnSheetRequest::copy_with_detailing(view.id, title)
                } else {
                    ViewOnSheetRequest::copy(view.id, title)
                }
            };
            requested.views.push(request);
        }

        debug!(
            source = %sheet.number,
            number = %requested.number,
            views = requested.views.len(),
            "已规划新图纸"
        );
        self.sheets.push(requested);
        let index = self.sheets.len() - 1;
        Ok(&self.sheets[index])
    }

    /// 将某个视口改为在指定标高上新建视图。
    pub fn recreate_on_level(
        &mut self,
        sheet_index: usize,
        old_view: ElementId,
        level: impl Into<String>,
    ) -> bool {
        let Some(requested) = self.sheets.get_mut(sheet_index) else {
            return false;
        };
        let Some(request) = requested
            .views
            .iter_mut()
            .find(|request| request.old_view == old_view)
        else {
            return false;
        };
        let title = match request.placement.title() {
            Some(title) => title.to_string(),
            None => {
                let Some(view) = self.store.view(old_view) else {
                    return false;
                };
                let title = self.registry.allocate_derived_view_name(&view.name);
                self.registry.register_view_name(&title);
                title
            }
        };
        request.placement = Placement::CreateNew {
            level: level.into(),
            title,
        };
        true
    }

    #[inline]
    pub fn sheets(&self) -> &[RequestedSheet] {
        &self.sheets
    }

    #[inline]
    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    pub fn into_batch(self) -> Vec<RequestedSheet> {
        self.sheets
    }
}

#[cfg(test)]
mod tests {
    use scopy_core::geometry::Point2;
    use scopy_core::memory::MemoryDocument;

    use super::*;

    fn sample() -> (MemoryDocument, ElementId, ElementId, ElementId) {
        let mut doc = MemoryDocument::new();
        let level = doc.add_level("Level 1", 0.0);
        let plan = doc.add_view("Level 1", ViewKind::FloorPlan, Some(level));
        let legend = doc.add_view("Wall Types", ViewKind::Legend, None);
        let sheet = doc.add_sheet("A101", "Ground Floor", "Architectural");
        doc.add_viewport(sheet, plan, Point2::new(200.0, 150.0));
        doc.add_viewport(sheet, legend, Point2::new(700.0, 100.0));
        doc.add_sheet("A101-1", "Taken", "");
        (doc, sheet, plan, legend)
    }

    #[test]
    fn planner_derives_numbers_titles_and_modes() {
        let (doc, sheet, plan, legend) = sample();
        let mut planner = BatchPlanner::new(&doc, PlannerOptions::default());
        let first = planner.add_sheet(sheet).expect("plan first copy").clone();
        let second = planner.add_sheet_by_number("a101").expect("plan second copy").clone();

        assert_eq!(first.number, "A101-2");
        assert_eq!(second.number, "A101-3");
        assert_eq!(first.title, "Ground Floor - Copy");
        assert_eq!(first.category, "Architectural");
        assert_eq!(first.views.len(), 2);

        let plan_request = first.views.iter().find(|v| v.old_view == plan).unwrap();
        assert_eq!(plan_request.mode(), PlacementMode::CopyShallow);
        assert_eq!(plan_request.placement.title(), Some("Level 1-1"));
        let second_plan = second.views.iter().find(|v| v.old_view == plan).unwrap();
        assert_eq!(second_plan.placement.title(), Some("Level 1-2"));

        let legend_request = first.views.iter().find(|v| v.old_view == legend).unwrap();
        assert_eq!(legend_request.mode(), PlacementMode::ReferenceShared);
        assert_eq!(legend_request.placement.title(), None);
    }

    #[test]
    fn planner_honours_detailing_and_legend_options() {
        let (doc, sheet, _, legend) = sample();
        let options = PlannerOptions {
            copy_detailing: true,
            share_legends: false,
            ..PlannerOptions::default()
        };
        let mut planner = BatchPlanner::new(&doc, options);
        let planned = planner.add_sheet(sheet).unwrap();
        assert!(
            planned
                .views
                .iter()
                .all(|v| v.mode() == PlacementMode::CopyWithDetailing)
        );
        let legend_request = planned.views.iter().find(|v| v.old_view == legend).unwrap();
        assert_eq!(legend_request.placement.title(), Some("Wall Types-1"));
    }

    #[test]
    fn planner_rejects_non_sheets_and_unknown_numbers() {
        let (doc, _, plan, _) = sample();
        let mut planner = BatchPlanner::new(&doc, PlannerOptions::default());
        assert!(matches!(
            planner.add_sheet(plan),
            Err(EngineError::NotASheet(_))
        ));
        assert!(matches!(
            planner.add_sheet_by_number("Z999"),
            Err(EngineError::SheetNumberNotFound(_))
        ));
        assert!(planner.into_batch().is_empty());
    }

    #[test]
    fn recreate_on_level_switches_mode_and_keeps_title() {
        let (doc, sheet, plan, legend) = sample();
        let mut planner = BatchPlanner::new(&doc, PlannerOptions::default());
        planner.add_sheet(sheet).unwrap();
        assert!(planner.recreate_on_level(0, plan, "Level 1"));
        assert!(planner.recreate_on_level(0, legend, "Level 1"));
        assert!(!planner.recreate_on_level(3, plan, "Level 1"));

        let batch = planner.into_batch();
        let plan_request = batch[0].views.iter().find(|v| v.old_view == plan).unwrap();
        assert_eq!(
            plan_request.placement,
            Placement::CreateNew {
                level: "Level 1".to_string(),
                title: "Level 1-1".to_string(),
            }
        );
        let legend_request = batch[0].views.iter().find(|v| v.old_view == legend).unwrap();
        assert_eq!(legend_request.placement.title(), Some("Wall Types-1"));
    }
}
