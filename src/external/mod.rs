pub mod validation;

pub use validation::{SimulatedValidationClient, ValidationReport, WorkflowValidationService};
