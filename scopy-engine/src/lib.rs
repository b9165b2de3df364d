pub mod annotation;
pub mod duplicator;
pub mod layout;
pub mod lookups;
pub mod orchestrator;
pub mod registry;
pub mod request;

pub mod errors {
    use scopy_core::document::ElementId;
    use scopy_core::store::StoreError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("element {0} is not a sheet")]
        NotASheet(ElementId),
        #[error("no sheet numbered {0:?}")]
        SheetNumberNotFound(String),
        #[error("view {0} not found")]
        ViewNotFound(ElementId),
        #[error("level {0:?} not found")]
        LevelNotFound(String),
        #[error("view name {0:?} is already taken")]
        ViewNameUnavailable(String),
        #[error("sheet number {0:?} is already taken")]
        SheetNumberUnavailable(String),
        #[error("batch was not committed: {0}")]
        CommitFailed(#[source] StoreError),
        #[error(transparent)]
        Store(#[from] StoreError),
    }
}
