use serde::{Deserialize, Serialize};

use crate::document::{
    CropRegion, Element, ElementId, ElementKind, Level, Sheet, View, ViewKind, Viewport,
    ViewportPlacement,
};
use crate::geometry::{Point2, Transform2D, Vector2};
use crate::store::{DocumentStore, DuplicateOption, StoreError};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct DocumentData {
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    views: Vec<View>,
    #[serde(default)]
    sheets: Vec<Sheet>,
    #[serde(default)]
    elements: Vec<Element>,
    #[serde(default)]
    next_id: u64,
}

#[derive(Debug, Clone)]
struct OpenTransaction {
    name: String,
    backup: DocumentData,
}

/// 内存文档：`DocumentStore` 的参考实现。
///
/// `add_*` 系列方法用于直接构建文档内容，不受事务约束；
/// 通过 `DocumentStore` 端口发起的修改必须处于事务之内。
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(flatten)]
    data: DocumentData,
    #[serde(skip)]
    transaction: Option<OpenTransaction>,
    #[serde(skip)]
    fail_next_commit: bool,
    #[serde(skip)]
    fail_next_placement: bool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_level(&mut self, name: impl Into<String>, elevation: f64) -> ElementId {
        let id = self.next_id();
        self.data.levels.push(Level {
            id,
            name: name.into(),
            elevation,
        });
        id
    }

    pub fn add_view(
        &mut self,
        name: impl Into<String>,
        kind: ViewKind,
        level: Option<ElementId>,
    ) -> ElementId {
        let id = self.next_id();
        self.data.views.push(View {
            id,
            name: name.into(),
            kind,
            level,
            crop: CropRegion::default(),
            template: None,
            is_template: false,
        });
        id
    }

    pub fn add_view_template(&mut self, name: impl Into<String>, kind: ViewKind) -> ElementId {
        let id = self.next_id();
        self.data.views.push(View {
            id,
            name: name.into(),
            kind,
            level: None,
            crop: CropRegion::default(),
            template: None,
            is_template: true,
        });
        id
    }

    pub fn add_sheet(
        &mut self,
        number: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> ElementId {
        let id = self.next_id();
        self.data.sheets.push(Sheet {
            id,
            number: number.into(),
            title: title.into(),
            category: category.into(),
            origin: Point2::new(0.0, 0.0),
        });
        id
    }

    pub fn add_viewport(&mut self, sheet: ElementId, view: ElementId, center: Point2) -> ElementId {
        let half_extent = self
            .view(view)
            .map(|view| view.crop.bounds.half_extent())
            .unwrap_or_else(Vector2::zero);
        self.add_element(
            sheet,
            ElementKind::Viewport(ViewportPlacement {
                view,
                center,
                half_extent,
            }),
        )
    }

    pub fn add_element(&mut self, owner: ElementId, kind: ElementKind) -> ElementId {
        let id = self.next_id();
        self.data.elements.push(Element {
            id,
            owner,
            kind,
            view_specific: true,
            valid: true,
        });
        id
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.data.elements.iter().find(|element| element.id == id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.data.elements.iter_mut().find(|element| element.id == id)
    }

    pub fn view_mut(&mut self, id: ElementId) -> Option<&mut View> {
        self.data.views.iter_mut().find(|view| view.id == id)
    }

    pub fn sheet_mut(&mut self, id: ElementId) -> Option<&mut Sheet> {
        self.data.sheets.iter_mut().find(|sheet| sheet.id == id)
    }

    pub fn sheet_by_number(&self, number: &str) -> Option<&Sheet> {
        self.data
            .sheets
            .iter()
            .find(|sheet| same_name(&sheet.number, number))
    }

    pub fn view_by_name(&self, name: &str) -> Option<&View> {
        self.data.views.iter().find(|view| same_name(&view.name, name))
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.data.elements.len()
    }

    #[inline]
    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// 令下一次提交失败，用于模拟宿主拒绝事务。
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }

    /// 令下一次放置视口失败。
    pub fn fail_next_placement(&mut self) {
        self.fail_next_placement = true;
    }

    /// 修正反序列化后的编号计数器，使其大于文档中任何已有编号。
    ///
    /// 缺少 `next_id` 或其值过旧的文档在分配新编号前必须先调用此方法。
    pub fn normalize_ids(&mut self) {
        let highest = self
            .data
            .levels
            .iter()
            .map(|level| level.id)
            .chain(self.data.views.iter().map(|view| view.id))
            .chain(self.data.sheets.iter().map(|sheet| sheet.id))
            .chain(self.data.elements.iter().map(|element| element.id))
            .map(ElementId::get)
            .max();
        if let Some(highest) = highest {
            self.data.next_id = self.data.next_id.max(highest + 1);
        }
    }

    #[inline]
    fn next_id(&mut self) -> ElementId {
        let id = self.data.next_id;
        self.data.next_id += 1;
        ElementId::new(id)
    }

    fn require_transaction(&self) -> Result<(), StoreError> {
        if self.transaction.is_some() {
            Ok(())
        } else {
            Err(StoreError::NoActiveTransaction)
        }
    }

    fn view_name_taken(&self, name: &str, except: Option<ElementId>) -> bool {
        self.data
            .views
            .iter()
            .any(|view| Some(view.id) != except && same_name(&view.name, name))
    }

    /// 仿照宿主命名规则，为新视图生成不冲突的名称。
    fn unique_view_name(&self, base: &str, numbered: impl Fn(u64) -> String) -> String {
        if !self.view_name_taken(base, None) {
            return base.to_string();
        }
        let mut index = 1u64;
        loop {
            let candidate = numbered(index);
            if !self.view_name_taken(&candidate, None) {
                return candidate;
            }
            index += 1;
        }
    }

    fn origin_of(&self, id: ElementId) -> Result<Point2, StoreError> {
        if let Some(sheet) = self.sheet(id) {
            return Ok(sheet.origin);
        }
        if self.view(id).is_some() {
            return Ok(Point2::new(0.0, 0.0));
        }
        Err(StoreError::ElementNotFound(id))
    }

    fn view_mut_or_err(&mut self, id: ElementId) -> Result<&mut View, StoreError> {
        if self.sheet(id).is_some() {
            return Err(StoreError::NotAView(id));
        }
        self.view_mut(id).ok_or(StoreError::ElementNotFound(id))
    }
}

/// 名称比较不区分大小写。
fn same_name(left: &str, right: &str) -> bool {
    left.to_uppercase() == right.to_uppercase()
}

impl DocumentStore for MemoryDocument {
    fn sheets(&self) -> Vec<&Sheet> {
        self.data.sheets.iter().collect()
    }

    fn sheet(&self, id: ElementId) -> Option<&Sheet> {
        self.data.sheets.iter().find(|sheet| sheet.id == id)
    }

    fn views(&self) -> Vec<&View> {
        self.data.views.iter().collect()
    }

    fn view(&self, id: ElementId) -> Option<&View> {
        self.data.views.iter().find(|view| view.id == id)
    }

    fn levels(&self) -> Vec<&Level> {
        self.data.levels.iter().collect()
    }

    fn viewports_on(&self, sheet: ElementId) -> Vec<Viewport> {
        self.data
            .elements
            .iter()
            .filter(|element| element.owner == sheet)
            .filter_map(Viewport::from_element)
            .collect()
    }

    fn elements_owned_by(&self, owner: ElementId) -> Vec<&Element> {
        self.data
            .elements
            .iter()
            .filter(|element| element.owner == owner)
            .collect()
    }

    fn create_sheet(
        &mut self,
        number: &str,
        title: &str,
        category: &str,
    ) -> Result<ElementId, StoreError> {
        self.require_transaction()?;
        if self.sheet_by_number(number).is_some() {
            return Err(StoreError::DuplicateSheetNumber(number.to_string()));
        }
        Ok(self.add_sheet(number, title, category))
    }

    fn create_plan_view(&mut self, level: ElementId) -> Result<ElementId, StoreError> {
        self.require_transaction()?;
        let level_name = self
            .data
            .levels
            .iter()
            .find(|candidate| candidate.id == level)
            .map(|candidate| candidate.name.clone())
            .ok_or(StoreError::ElementNotFound(level))?;
        let name = self.unique_view_name(&level_name, |index| format!("{level_name} ({index})"));
        Ok(self.add_view(name, ViewKind::FloorPlan, Some(level)))
    }

    fn duplicate_view(
        &mut self,
        view: ElementId,
        option: DuplicateOption,
    ) -> Result<ElementId, StoreError> {
        self.require_transaction()?;
        let source = self
            .view(view)
            .cloned()
            .ok_or(StoreError::ElementNotFound(view))?;
        let base = format!("{} Copy", source.name);
        let name = self.unique_view_name(&base, |index| format!("{base} {index}"));
        let id = self.next_id();
        self.data.views.push(View {
            id,
            name,
            ..source
        });

        if option == DuplicateOption::WithDetailing {
            let detailing: Vec<ElementKind> = self
                .data
                .elements
                .iter()
                .filter(|element| {
                    element.owner == view && element.view_specific && !element.kind.is_viewport()
                })
                .map(|element| element.kind.clone())
                .collect();
            for kind in detailing {
                self.add_element(id, kind);
            }
        }
        Ok(id)
    }

    fn rename_view(&mut self, view: ElementId, name: &str) -> Result<(), StoreError> {
        self.require_transaction()?;
        if self.view_name_taken(name, Some(view)) {
            return Err(StoreError::DuplicateViewName(name.to_string()));
        }
        self.view_mut_or_err(view)?.name = name.to_string();
        Ok(())
    }

    fn set_crop_region(&mut self, view: ElementId, crop: CropRegion) -> Result<(), StoreError> {
        self.require_transaction()?;
        self.view_mut_or_err(view)?.crop = crop;
        Ok(())
    }

    fn set_view_template(
        &mut self,
        view: ElementId,
        template: Option<ElementId>,
    ) -> Result<(), StoreError> {
        self.require_transaction()?;
        if let Some(template) = template {
            match self.view(template) {
                Some(candidate) if candidate.is_template => {}
                Some(_) => return Err(StoreError::NotAView(template)),
                None => return Err(StoreError::ElementNotFound(template)),
            }
        }
        self.view_mut_or_err(view)?.template = template;
        Ok(())
    }

    fn place_viewport(
        &mut self,
        sheet: ElementId,
        view: ElementId,
        center: Point2,
    ) -> Result<ElementId, StoreError> {
        self.require_transaction()?;
        if std::mem::take(&mut self.fail_next_placement) {
            return Err(StoreError::Rejected {
                operation: "place_viewport",
            });
        }
        if self.sheet(sheet).is_none() {
            return Err(StoreError::NotASheet(sheet));
        }
        let target = self.view(view).ok_or(StoreError::ElementNotFound(view))?;
        if target.is_template {
            return Err(StoreError::TemplateNotPlaceable(view));
        }
        if self
            .viewports_on(sheet)
            .iter()
            .any(|viewport| viewport.view == view)
        {
            return Err(StoreError::ViewAlreadyPlaced { view, sheet });
        }
        Ok(self.add_viewport(sheet, view, center))
    }

    fn transform_between(
        &self,
        from: ElementId,
        to: ElementId,
    ) -> Result<Transform2D, StoreError> {
        let from_origin = self.origin_of(from)?;
        let to_origin = self.origin_of(to)?;
        let offset = from_origin.vector_to(to_origin);
        if offset.x() == 0.0 && offset.y() == 0.0 {
            Ok(Transform2D::identity())
        } else {
            Ok(Transform2D::from_translation(offset))
        }
    }

    fn copy_elements(
        &mut self,
        from: ElementId,
        ids: &[ElementId],
        to: ElementId,
        transform: &Transform2D,
    ) -> Result<Vec<ElementId>, StoreError> {
        self.require_transaction()?;
        self.origin_of(to)?;

        let mut copies = Vec::with_capacity(ids.len());
        for id in ids {
            let element = self
                .element(*id)
                .filter(|element| element.owner == from)
                .ok_or(StoreError::ElementNotFound(*id))?;
            if let ElementKind::ImportInstance { .. } = element.kind {
                return Err(StoreError::UnsupportedElement {
                    id: *id,
                    kind: element.kind.kind_name(),
                });
            }
            copies.push((element.kind.transformed(transform), element.view_specific));
        }

        let mut created = Vec::with_capacity(copies.len());
        for (kind, view_specific) in copies {
            let id = self.add_element(to, kind);
            if let Some(element) = self.element_mut(id) {
                element.view_specific = view_specific;
            }
            created.push(id);
        }
        Ok(created)
    }

    fn begin_transaction(&mut self, name: &str) -> Result<(), StoreError> {
        if let Some(open) = &self.transaction {
            return Err(StoreError::TransactionActive(open.name.clone()));
        }
        self.transaction = Some(OpenTransaction {
            name: name.to_string(),
            backup: self.data.clone(),
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        let open = self
            .transaction
            .take()
            .ok_or(StoreError::NoActiveTransaction)?;
        if self.fail_next_commit {
            self.fail_next_commit = false;
            self.data = open.backup;
            return Err(StoreError::CommitRejected {
                name: open.name,
                reason: "document refused the transaction".to_string(),
            });
        }
        Ok(())
    }

    fn rollback_transaction(&mut self) {
        if let Some(open) = self.transaction.take() {
            self.data = open.backup;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MemoryDocument, ElementId, ElementId) {
        let mut doc = MemoryDocument::new();
        let level = doc.add_level("Level 1", 0.0);
        let plan = doc.add_view("Level 1", ViewKind::FloorPlan, Some(level));
        let sheet = doc.add_sheet("A101", "Plans", "");
        doc.add_viewport(sheet, plan, Point2::new(100.0, 80.0));
        (doc, sheet, plan)
    }

    #[test]
    fn mutations_require_transaction() {
        let (mut doc, _, _) = sample();
        let err = doc.create_sheet("A102", "More", "").unwrap_err();
        assert!(matches!(err, StoreError::NoActiveTransaction));
    }

    #[test]
    fn sheet_numbers_are_unique_ignoring_case() {
        let (mut doc, _, _) = sample();
        doc.begin_transaction("test").unwrap();
        let err = doc.create_sheet("a101", "Clash", "").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSheetNumber(_)));
        doc.create_sheet("A102", "Fine", "").unwrap();
        doc.commit_transaction().unwrap();
        assert!(doc.sheet_by_number("a102").is_some());
    }

    #[test]
    fn duplicate_with_detailing_copies_view_annotations() {
        let (mut doc, _, plan) = sample();
        doc.add_element(
            plan,
            ElementKind::Tag {
                label: "ROOM 101".to_string(),
                position: Point2::new(1.0, 1.0),
            },
        );
        doc.begin_transaction("test").unwrap();
        let shallow = doc.duplicate_view(plan, DuplicateOption::Duplicate).unwrap();
        let detailed = doc
            .duplicate_view(plan, DuplicateOption::WithDetailing)
            .unwrap();
        doc.commit_transaction().unwrap();

        assert_eq!(doc.view(shallow).unwrap().name, "Level 1 Copy");
        assert_eq!(doc.view(detailed).unwrap().name, "Level 1 Copy 1");
        assert!(doc.elements_owned_by(shallow).is_empty());
        assert_eq!(doc.elements_owned_by(detailed).len(), 1);
    }

    #[test]
    fn plan_views_are_named_after_level() {
        let (mut doc, _, _) = sample();
        let level = doc.levels()[0].id;
        doc.begin_transaction("test").unwrap();
        let created = doc.create_plan_view(level).unwrap();
        doc.commit_transaction().unwrap();
        assert_eq!(doc.view(created).unwrap().name, "Level 1 (1)");
    }

    #[test]
    fn placing_same_view_twice_on_one_sheet_is_rejected() {
        let (mut doc, sheet, plan) = sample();
        doc.begin_transaction("test").unwrap();
        let err = doc
            .place_viewport(sheet, plan, Point2::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, StoreError::ViewAlreadyPlaced { .. }));
        doc.rollback_transaction();
    }

    #[test]
    fn rejected_commit_restores_previous_state() {
        let (mut doc, _, _) = sample();
        doc.fail_next_commit();
        doc.begin_transaction("batch").unwrap();
        doc.create_sheet("A102", "Lost", "").unwrap();
        let err = doc.commit_transaction().unwrap_err();
        assert!(matches!(err, StoreError::CommitRejected { .. }));
        assert!(doc.sheet_by_number("A102").is_none());
        assert!(!doc.is_in_transaction());
    }

    #[test]
    fn copy_elements_is_all_or_nothing() {
        let (mut doc, sheet, _) = sample();
        let note = doc.add_element(
            sheet,
            ElementKind::TextNote {
                text: "NOTE".to_string(),
                position: Point2::new(5.0, 5.0),
            },
        );
        let import = doc.add_element(
            sheet,
            ElementKind::ImportInstance {
                source: "survey.dwg".to_string(),
                origin: Point2::new(0.0, 0.0),
            },
        );
        doc.begin_transaction("test").unwrap();
        let target = doc.create_sheet("A102", "Target", "").unwrap();
        let err = doc
            .copy_elements(sheet, &[note, import], target, &Transform2D::identity())
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedElement { .. }));
        assert!(doc.elements_owned_by(target).is_empty());

        let copied = doc
            .copy_elements(sheet, &[note], target, &Transform2D::identity())
            .unwrap();
        doc.commit_transaction().unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(doc.elements_owned_by(target).len(), 1);
    }

    #[test]
    fn normalize_ids_moves_counter_past_existing_ids() {
        let (mut doc, sheet, _) = sample();
        let highest = doc.data.elements.iter().map(|e| e.id.get()).max().unwrap();
        doc.data.next_id = 0;
        doc.normalize_ids();
        assert_eq!(doc.data.next_id, highest + 1);

        doc.begin_transaction("test").unwrap();
        let fresh = doc.create_sheet("A102", "Fresh", "").unwrap();
        doc.commit_transaction().unwrap();
        assert!(fresh.get() > sheet.get());
        assert_eq!(fresh.get(), highest + 1);

        // 计数器已足够大时保持不变。
        doc.data.next_id = 100;
        doc.normalize_ids();
        assert_eq!(doc.data.next_id, 100);
    }

    #[test]
    fn transform_follows_sheet_origins() {
        let (mut doc, sheet, _) = sample();
        let other = doc.add_sheet("A200", "Large", "");
        doc.sheet_mut(other).unwrap().origin = Point2::new(10.0, 0.0);
        let identity = doc.transform_between(sheet, sheet).unwrap();
        assert!(identity.is_identity());
        let shifted = doc.transform_between(sheet, other).unwrap();
        assert_eq!(shifted.apply(Point2::new(1.0, 1.0)), Point2::new(11.0, 1.0));
    }
}
