//! Discovery, classification and stage services

pub mod completion_marker;
pub mod composite_catalog;
pub mod conversion_stage;
pub mod decoder;
pub mod discovery;
pub mod ledger;
pub mod personalization;
pub mod readiness;
pub mod record_tables;
pub mod renderer;
pub mod report_stage;
pub mod taxonomy_walker;

pub use composite_catalog::{
    CompositeCatalog, CompositeSource, PassCatalog, StaticCompositeSource, SvnCompositeSource,
};
pub use conversion_stage::{ConversionStage, ConversionSummary};
pub use decoder::{CommandDecoder, RecordDecoder};
pub use discovery::{Discovery, PassResult, PassStats};
pub use ledger::{DedupLedger, InFlightGuard, InFlightRegistry};
pub use readiness::{ConditionReadiness, Readiness, ReadinessClassifier, WorkLists};
pub use renderer::{NotebookRenderer, RenderRequest, ReportRenderer};
pub use report_stage::{ReportOutcome, ReportStage, ReportSummary};
pub use taxonomy_walker::TaxonomyWalker;
