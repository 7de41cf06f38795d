// Domain models: catalog records, wizard selections, and the saved callout.

pub mod callout;
pub mod catalog;
pub mod selection;
