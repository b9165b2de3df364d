use thiserror::Error;

use crate::document::{CropRegion, Element, ElementId, Level, Sheet, View, Viewport};
use crate::geometry::{Point2, Transform2D};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("a transaction is already active: {0}")]
    TransactionActive(String),
    #[error("element {0} not found")]
    ElementNotFound(ElementId),
    #[error("element {0} is not a view")]
    NotAView(ElementId),
    #[error("element {0} is not a sheet")]
    NotASheet(ElementId),
    #[error("sheet number {0:?} is already in use")]
    DuplicateSheetNumber(String),
    #[error("view name {0:?} is already in use")]
    DuplicateViewName(String),
    #[error("view {view} is already placed on sheet {sheet}")]
    ViewAlreadyPlaced { view: ElementId, sheet: ElementId },
    #[error("view {0} is a template and cannot be placed")]
    TemplateNotPlaceable(ElementId),
    #[error("element {id} of kind {kind} cannot be copied between views")]
    UnsupportedElement { id: ElementId, kind: &'static str },
    #[error("{operation} was rejected by the document")]
    Rejected { operation: &'static str },
    #[error("transaction {name:?} was rejected: {reason}")]
    CommitRejected { name: String, reason: String },
}

/// 视图复制选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateOption {
    /// 仅复制视图本身。
    Duplicate,
    /// 连同视图专有的注释图元一并复制。
    WithDetailing,
}

/// 宿主文档的抽象端口。引擎的每个组件都通过它访问文档，
/// 测试中以 [`crate::memory::MemoryDocument`] 替代真实宿主。
///
/// 所有修改操作都必须位于 `begin_transaction` 与 `commit_transaction` 之间。
pub trait DocumentStore {
    fn sheets(&self) -> Vec<&Sheet>;

    fn sheet(&self, id: ElementId) -> Option<&Sheet>;

    /// 枚举全部视图（含视图样板，不含图纸）。
    fn views(&self) -> Vec<&View>;

    fn view(&self, id: ElementId) -> Option<&View>;

    fn levels(&self) -> Vec<&Level>;

    fn viewports_on(&self, sheet: ElementId) -> Vec<Viewport>;

    /// 枚举直接归属于指定视图的图元，视口图元同样包含在内。
    fn elements_owned_by(&self, owner: ElementId) -> Vec<&Element>;

    fn create_sheet(
        &mut self,
        number: &str,
        title: &str,
        category: &str,
    ) -> Result<ElementId, StoreError>;

    fn create_plan_view(&mut self, level: ElementId) -> Result<ElementId, StoreError>;

    fn duplicate_view(
        &mut self,
        view: ElementId,
        option: DuplicateOption,
    ) -> Result<ElementId, StoreError>;

    fn rename_view(&mut self, view: ElementId, name: &str) -> Result<(), StoreError>;

    fn set_crop_region(&mut self, view: ElementId, crop: CropRegion) -> Result<(), StoreError>;

    fn set_view_template(
        &mut self,
        view: ElementId,
        template: Option<ElementId>,
    ) -> Result<(), StoreError>;

    fn place_viewport(
        &mut self,
        sheet: ElementId,
        view: ElementId,
        center: Point2,
    ) -> Result<ElementId, StoreError>;

    /// 计算从一个视图坐标系到另一个视图坐标系的变换。
    fn transform_between(&self, from: ElementId, to: ElementId)
    -> Result<Transform2D, StoreError>;

    /// 整体复制：任一图元无法复制时不产生任何副本。
    fn copy_elements(
        &mut self,
        from: ElementId,
        ids: &[ElementId],
        to: ElementId,
        transform: &Transform2D,
    ) -> Result<Vec<ElementId>, StoreError>;

    fn begin_transaction(&mut self, name: &str) -> Result<(), StoreError>;

    /// 提交失败时文档回到事务开始前的状态。
    fn commit_transaction(&mut self) -> Result<(), StoreError>;

    fn rollback_transaction(&mut self);
}
