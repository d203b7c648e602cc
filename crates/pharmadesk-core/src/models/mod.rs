//! Domain models for the PharmaDesk inventory system.

mod dispense;
mod import;
mod medicine;
mod report;

pub use dispense::*;
pub use import::*;
pub use medicine::*;
pub use report::*;
