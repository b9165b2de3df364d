use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scopy_core::document::ElementId;
use scopy_core::store::DocumentStore;
use tracing::{debug, error, info, warn};

use crate::annotation::{AnnotationTransferrer, TransferOutcome};
use crate::duplicator::ViewDuplicator;
use crate::errors::EngineError;
use crate::layout::LayoutCache;
use crate::lookups::{BatchLookups, DEFAULT_NO_TEMPLATE_LABEL};
use crate::registry::IdentifierRegistry;
use crate::request::{PlacementMode, RequestedSheet};

pub const TRANSACTION_NAME: &str = "SCopy";

/// 协作式取消标志，只在两张图纸之间检查。
pub type CancelFlag = Arc<AtomicBool>;

#[derive(Debug, Clone)]
pub struct SheetOutcome {
    pub source_number: String,
    pub number: String,
    pub sheet: ElementId,
    pub placed_viewports: usize,
    pub annotations: TransferOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSheet {
    pub number: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedViewport {
    pub sheet_number: String,
    pub view: ElementId,
    pub mode: PlacementMode,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationFailure {
    pub sheet_number: String,
    pub reason: String,
}

/// 已创建但未能放置到任何图纸上的视图，随批次一起提交。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedView {
    pub sheet_number: String,
    pub source_view: ElementId,
    pub view: ElementId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTemplate {
    pub sheet_number: String,
    pub view: ElementId,
    pub template: String,
}

/// 批次汇总：成功的图纸逐行列出，所有跳过的图纸、视口与失败的注释迁移均有记录。
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub sheets: Vec<SheetOutcome>,
    pub skipped_sheets: Vec<SkippedSheet>,
    pub skipped_viewports: Vec<SkippedViewport>,
    pub annotation_failures: Vec<AnnotationFailure>,
    pub orphaned_views: Vec<OrphanedView>,
    pub unresolved_templates: Vec<UnresolvedTemplate>,
}

impl BatchReport {
    pub fn summary_lines(&self) -> Vec<String> {
        self.sheets
            .iter()
            .map(|outcome| {
                format!(
                    "Sheet: {} copied to: {}",
                    outcome.source_number, outcome.number
                )
            })
            .collect()
    }

    pub fn summary_text(&self) -> String {
        let mut text = String::new();
        for line in self.summary_lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    #[inline]
    pub fn failure_count(&self) -> usize {
        self.skipped_sheets.len()
            + self.skipped_viewports.len()
            + self.annotation_failures.len()
            + self.orphaned_views.len()
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

/// 依次创建并填充每张请求的图纸，整批修改在同一个事务内提交。
///
/// 单张图纸或单个视口的失败只记录到报告中；只有事务提交失败才会使整个批次失败。
/// 引擎本身不加锁，同一文档上的并发调用需由调用方串行化。
pub struct DuplicationOrchestrator<'a, S: DocumentStore> {
    store: &'a mut S,
    no_template_label: String,
    cancel: Option<CancelFlag>,
}

impl<'a, S: DocumentStore> DuplicationOrchestrator<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            no_template_label: DEFAULT_NO_TEMPLATE_LABEL.to_string(),
            cancel: None,
        }
    }

    pub fn with_no_template_label(mut self, label: impl Into<String>) -> Self {
        self.no_template_label = label.into();
        self
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(&mut self, batch: &[RequestedSheet]) -> Result<BatchReport, EngineError> {
        let mut report = BatchReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        let lookups = BatchLookups::from_store(&*self.store, self.no_template_label.as_str());
        let mut registry = IdentifierRegistry::from_store(&*self.store);

        // 在任何修改之前采集所有源图纸的视口中心。
        let mut layouts = LayoutCache::new();
        for requested in batch {
            if let Err(err) = layouts.get_or_build(&*self.store, requested.source) {
                warn!(sheet = %requested.number, error = %err, "无法建立源图纸布局索引");
            }
        }

        self.store.begin_transaction(TRANSACTION_NAME)?;
        for (index, requested) in batch.iter().enumerate() {
            if self.is_cancelled() {
                warn!(remaining = batch.len() - index, "批次已取消，剩余图纸不再处理");
                for pending in &batch[index..] {
                    report.skipped_sheets.push(SkippedSheet {
                        number: pending.number.clone(),
                        reason: "cancelled".to_string(),
                    });
                }
                break;
            }
            self.process_sheet(requested, &lookups, &mut registry, &layouts, &mut report);
        }

        match self.store.commit_transaction() {
            Ok(()) => {
                info!(
                    created = report.sheets.len(),
                    failures = report.failure_count(),
                    "图纸复制批次已提交"
                );
                Ok(report)
            }
            Err(err) => {
                error!(error = %err, "图纸复制批次提交失败，未保存任何修改");
                Err(EngineError::CommitFailed(err))
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn process_sheet(
        &mut self,
        requested: &RequestedSheet,
        lookups: &BatchLookups,
        registry: &mut IdentifierRegistry,
        layouts: &LayoutCache,
        report: &mut BatchReport,
    ) {
        let skip_sheet = |report: &mut BatchReport, reason: String| {
            warn!(sheet = %requested.number, reason = %reason, "跳过图纸");
            report.skipped_sheets.push(SkippedSheet {
                number: requested.number.clone(),
                reason,
            });
        };

        let Some(source_number) = self
            .store
            .sheet(requested.source)
            .map(|sheet| sheet.number.clone())
        else {
            skip_sheet(report, format!("source {} is not a sheet", requested.source));
            return;
        };
        let Some(layout) = layouts.get(requested.source) else {
            skip_sheet(report, "source sheet layout is unavailable".to_string());
            return;
        };
        if !registry.register_sheet_number(&requested.number) {
            skip_sheet(report, format!("sheet number {:?} is already taken", requested.number));
            return;
        }

        let destination = match self.store.create_sheet(
            &requested.number,
            &requested.title,
            &requested.category,
        ) {
            Ok(id) => id,
            Err(err) => {
                skip_sheet(report, err.to_string());
                return;
            }
        };
        debug!(sheet = %requested.number, id = destination.get(), "已创建空白图纸");

        let mut placed_viewports = 0;
        for request in &requested.views {
            let mut skip_viewport = |reason: String| {
                warn!(
                    sheet = %requested.number,
                    view = request.old_view.get(),
                    mode = %request.mode(),
                    reason = %reason,
                    "跳过视口"
                );
                report.skipped_viewports.push(SkippedViewport {
                    sheet_number: requested.number.clone(),
                    view: request.old_view,
                    mode: request.mode(),
                    reason,
                });
            };

            let Some(center) = layout.center_of(request.old_view) else {
                skip_viewport("view is not placed on the source sheet".to_string());
                continue;
            };
            let mut duplicator = ViewDuplicator::new(&mut *self.store, lookups, registry);
            let materialized = duplicator.materialize(request, center);
            let orphan = duplicator.take_orphan();
            let placed = match materialized {
                Ok(placed) => placed,
                Err(err) => {
                    skip_viewport(err.to_string());
                    if let Some(view) = orphan {
                        record_orphan(report, &requested.number, request.old_view, view);
                    }
                    continue;
                }
            };
            if let Err(err) = self
                .store
                .place_viewport(destination, placed.view, placed.center)
            {
                skip_viewport(err.to_string());
                if placed.minted {
                    record_orphan(report, &requested.number, request.old_view, placed.view);
                }
                continue;
            }
            if let Some(template) = placed.unresolved_template {
                report.unresolved_templates.push(UnresolvedTemplate {
                    sheet_number: requested.number.clone(),
                    view: placed.view,
                    template,
                });
            }
            placed_viewports += 1;
        }

        let annotations =
            AnnotationTransferrer::new(&mut *self.store).transfer(requested.source, destination);
        if let Some(reason) = &annotations.failure {
            report.annotation_failures.push(AnnotationFailure {
                sheet_number: requested.number.clone(),
                reason: reason.clone(),
            });
        }

        info!(
            source = %source_number,
            sheet = %requested.number,
            viewports = placed_viewports,
            annotations = annotations.copied,
            "图纸复制完成"
        );
        report.sheets.push(SheetOutcome {
            source_number,
            number: requested.number.clone(),
            sheet: destination,
            placed_viewports,
            annotations,
        });
    }
}

fn record_orphan(
    report: &mut BatchReport,
    sheet_number: &str,
    source_view: ElementId,
    view: ElementId,
) {
    warn!(
        sheet = %sheet_number,
        source = source_view.get(),
        view = view.get(),
        "新视图未能放置，仍保留在文档中"
    );
    report.orphaned_views.push(OrphanedView {
        sheet_number: sheet_number.to_string(),
        source_view,
        view,
    });
}
