pub mod inventory;
pub mod run;

pub use inventory::{DeviceDescriptor, SourceDescriptor};
pub use run::{
    CollectionOutcome, CollectionRun, ErrorDetail, FieldValue, ResultRecord, RunStatus, UnitStatus,
};
