//! Data model: taxonomy positions, work items, composite rules and the
//! renderer parameter bag

pub mod composite;
pub mod parameters;
pub mod taxonomy;

pub use composite::{CompositeRules, ReportKind};
pub use parameters::{CompositeParameter, SourceFile, CONDITION_LABEL};
pub use taxonomy::{
    ConditionDirectory, ConditionItem, FlowKind, LeafDirectory, ReportJob, TaxonomyEntry,
    TaxonomyPosition, WorkItem, DEFAULT_CORNER,
};
