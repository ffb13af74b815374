pub mod assessments;
pub mod calc;
pub mod core;
pub mod kpi;
pub mod mapping;
pub mod marks;
pub mod sheet;
