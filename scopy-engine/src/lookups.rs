use std::collections::HashMap;

use scopy_core::document::ElementId;
use scopy_core::store::DocumentStore;

/// 模板选择项中表示“不指定样板”的默认文字。
pub const DEFAULT_NO_TEMPLATE_LABEL: &str = "<None>";

/// 视图样板查找结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateBinding {
    /// 未请求或请求的是“不指定样板”。
    Keep,
    Bind(ElementId),
    Unresolved,
}

/// 每个批次构建一次的只读索引：标高、视图样板与图纸分类。
#[derive(Debug, Clone)]
pub struct BatchLookups {
    levels: HashMap<String, ElementId>,
    templates: HashMap<String, ElementId>,
    sheet_categories: Vec<String>,
    no_template_label: String,
}

impl BatchLookups {
    pub fn from_store<S: DocumentStore>(store: &S, no_template_label: impl Into<String>) -> Self {
        let levels = store
            .levels()
            .into_iter()
            .map(|level| (level.name.clone(), level.id))
            .collect();
        let templates = store
            .views()
            .into_iter()
            .filter(|view| view.is_template)
            .map(|view| (view.name.clone(), view.id))
            .collect();

        let mut sheet_categories: Vec<String> = Vec::new();
        for sheet in store.sheets() {
            if !sheet.category.is_empty() && !sheet_categories.contains(&sheet.category) {
                sheet_categories.push(sheet.category.clone());
            }
        }

        Self {
            levels,
            templates,
            sheet_categories,
            no_template_label: no_template_label.into(),
        }
    }

    #[inline]
    pub fn level(&self, name: &str) -> Option<ElementId> {
        self.levels.get(name).copied()
    }

    pub fn template(&self, name: Option<&str>) -> TemplateBinding {
        match name {
            None => TemplateBinding::Keep,
            Some(name) if name == self.no_template_label => TemplateBinding::Keep,
            Some(name) => self
                .templates
                .get(name)
                .copied()
                .map_or(TemplateBinding::Unresolved, TemplateBinding::Bind),
        }
    }

    #[inline]
    pub fn sheet_categories(&self) -> &[String] {
        &self.sheet_categories
    }
}
