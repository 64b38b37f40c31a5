pub mod instances;
pub mod workflows;
