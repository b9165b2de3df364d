use scopy_core::document::ElementId;
use scopy_core::geometry::Point2;
use scopy_core::store::{DocumentStore, DuplicateOption};
use tracing::{debug, error, warn};

use crate::errors::EngineError;
use crate::lookups::{BatchLookups, TemplateBinding};
use crate::registry::IdentifierRegistry;
use crate::request::{Placement, ViewOnSheetRequest};

/// 准备放置到新图纸上的视图。
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedView {
    pub view: ElementId,
    pub center: Point2,
    /// 是否新建了视图（共享模式为 `false`）。
    pub minted: bool,
    /// 请求的样板名称未能解析时记录在此。
    pub unresolved_template: Option<String>,
}

/// 按复制策略生成（或复用）视图，放置动作由调用方统一完成。
///
/// 视图已创建但后续步骤失败时，该视图留在文档中，可通过 [`Self::take_orphan`] 取回。
pub struct ViewDuplicator<'a, S: DocumentStore> {
    store: &'a mut S,
    lookups: &'a BatchLookups,
    registry: &'a mut IdentifierRegistry,
    orphan: Option<ElementId>,
}

impl<'a, S: DocumentStore> ViewDuplicator<'a, S> {
    pub fn new(
        store: &'a mut S,
        lookups: &'a BatchLookups,
        registry: &'a mut IdentifierRegistry,
    ) -> Self {
        Self {
            store,
            lookups,
            registry,
            orphan: None,
        }
    }

    /// 取回上一次失败的 `materialize` 遗留的新视图。
    pub fn take_orphan(&mut self) -> Option<ElementId> {
        self.orphan.take()
    }

    pub fn materialize(
        &mut self,
        request: &ViewOnSheetRequest,
        center: Point2,
    ) -> Result<PlacedView, EngineError> {
        self.orphan = None;
        let old_crop = self
            .store
            .view(request.old_view)
            .map(|view| view.crop)
            .ok_or(EngineError::ViewNotFound(request.old_view))?;

        let view = match &request.placement {
            Placement::CopyShallow { title } => {
                self.duplicate(request.old_view, DuplicateOption::Duplicate, title)?
            }
            Placement::CopyWithDetailing { title } => {
                self.duplicate(request.old_view, DuplicateOption::WithDetailing, title)?
            }
            Placement::CreateNew { level, title } => {
                let level_id = self
                    .lookups
                    .level(level)
                    .ok_or_else(|| EngineError::LevelNotFound(level.clone()))?;
                self.ensure_title_available(title)?;
                let created = self.store.create_plan_view(level_id)?;
                self.orphan = Some(created);
                self.store.rename_view(created, title)?;
                self.registry.register_view_name(title);
                self.store.set_crop_region(created, old_crop)?;
                created
            }
            Placement::ReferenceShared => {
                debug!(view = request.old_view.get(), "共享模式，直接复用原视图");
                return Ok(PlacedView {
                    view: request.old_view,
                    center,
                    minted: false,
                    unresolved_template: None,
                });
            }
        };

        let unresolved_template = self.apply_template(view, request.view_template.as_deref())?;
        self.orphan = None;
        debug!(
            source = request.old_view.get(),
            view = view.get(),
            mode = %request.mode(),
            "已生成新视图"
        );
        Ok(PlacedView {
            view,
            center,
            minted: true,
            unresolved_template,
        })
    }

    fn duplicate(
        &mut self,
        old_view: ElementId,
        option: DuplicateOption,
        title: &str,
    ) -> Result<ElementId, EngineError> {
        self.ensure_title_available(title)?;
        let duplicated = self.store.duplicate_view(old_view, option)?;
        self.orphan = Some(duplicated);
        self.store.rename_view(duplicated, title)?;
        self.registry.register_view_name(title);
        Ok(duplicated)
    }

    /// 名称冲突属于调用方违反约定，这里不会自行改名。
    fn ensure_title_available(&self, title: &str) -> Result<(), EngineError> {
        if self.registry.is_view_name_available(title) {
            Ok(())
        } else {
            error!(title, "目标视图名称已被占用");
            Err(EngineError::ViewNameUnavailable(title.to_string()))
        }
    }

    /// 绑定视图样板；样板名称无法解析时保持未绑定，并返回该名称。
    fn apply_template(
        &mut self,
        view: ElementId,
        template: Option<&str>,
    ) -> Result<Option<String>, EngineError> {
        match self.lookups.template(template) {
            TemplateBinding::Keep => Ok(None),
            TemplateBinding::Bind(template_id) => {
                self.store.set_view_template(view, Some(template_id))?;
                Ok(None)
            }
            TemplateBinding::Unresolved => {
                let name = template.unwrap_or_default().to_string();
                warn!(view = view.get(), template = %name, "未找到视图样板，保持未绑定");
                Ok(Some(name))
            }
        }
    }
}
