use scopy_core::document::{Element, ElementId};
use scopy_core::store::DocumentStore;
use tracing::{debug, warn};

/// 一次注释迁移的统计结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub copied: usize,
    pub skipped_viewports: usize,
    pub skipped_curves: usize,
    /// 无效或非视图专有的图元。
    pub skipped_other: usize,
    pub failure: Option<String>,
}

#[derive(Debug, Default)]
struct Selection {
    ids: Vec<ElementId>,
    viewports: usize,
    curves: usize,
    other: usize,
}

/// 挑选可迁移的图纸注释：排除视口与纯线条，只保留有效且视图专有的图元。
fn select_transferable<'e>(elements: impl IntoIterator<Item = &'e Element>) -> Selection {
    let mut selection = Selection::default();
    for element in elements {
        if element.kind.is_viewport() {
            selection.viewports += 1;
        } else if element.kind.is_curve() {
            selection.curves += 1;
        } else if element.valid && element.view_specific {
            selection.ids.push(element.id);
        } else {
            selection.other += 1;
        }
    }
    selection
}

/// 把源图纸上的自由注释复制到目标图纸坐标系中。
///
/// 迁移是尽力而为的：复制失败只记录在结果里，不影响图纸与视口的创建。
pub struct AnnotationTransferrer<'a, S: DocumentStore> {
    store: &'a mut S,
}

impl<'a, S: DocumentStore> AnnotationTransferrer<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn transfer(&mut self, source: ElementId, destination: ElementId) -> TransferOutcome {
        let selection = select_transferable(self.store.elements_owned_by(source));
        let mut outcome = TransferOutcome {
            skipped_viewports: selection.viewports,
            skipped_curves: selection.curves,
            skipped_other: selection.other,
            ..TransferOutcome::default()
        };
        if selection.ids.is_empty() {
            return outcome;
        }

        let result = self
            .store
            .transform_between(source, destination)
            .and_then(|transform| {
                debug!(
                    source = source.get(),
                    destination = destination.get(),
                    count = selection.ids.len(),
                    "开始复制图纸注释"
                );
                self.store
                    .copy_elements(source, &selection.ids, destination, &transform)
            });
        match result {
            Ok(copied) => outcome.copied = copied.len(),
            Err(err) => {
                warn!(
                    source = source.get(),
                    destination = destination.get(),
                    error = %err,
                    "复制图纸注释失败"
                );
                outcome.failure = Some(err.to_string());
            }
        }
        outcome
    }
}
