//! Outcome-based education attainment tracking: reads a course marks spreadsheet (already
//! decoded into a grid of cells) and computes CO / PO attainment for a class.

pub mod calc;
pub mod columns;
pub mod config;
pub mod error;
pub mod grid;
pub mod ipc;
pub mod mapping;
pub mod model;
pub mod roster;
pub mod sheet;
pub mod template;

pub use calc::{calculate_all_attainments, AttainmentResult, Thresholds};
pub use grid::{Cell, Grid};
pub use mapping::CoPoMapping;
pub use sheet::{parse_spreadsheet, ParsedSheet};
