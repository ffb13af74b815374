use crate::columns::ColumnPlan;
use crate::grid::Grid;
use crate::model::{AssessmentConfig, Marks, Student};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub students: Vec<Student>,
    pub marks: Marks,
}

/// Rows that repeat the ID/Name captions inside the data block.
fn looks_like_header(id: &str, name: &str) -> bool {
    id.to_lowercase().contains("id") || name.to_lowercase().contains("name")
}

/// Walks the student block into a roster and a mark table.
///
/// Every configured assessment gets an entry for every accepted student, 0 when its column was
/// never resolved or the cell is blank/non-numeric. Duplicate ids are kept in the roster; their
/// marks are last-write-wins.
pub fn extract_roster(grid: &Grid, plan: &ColumnPlan, config: &AssessmentConfig) -> Roster {
    let mut roster = Roster::default();
    let keys = config.mark_keys();
    let mut skipped = 0usize;

    for row in plan.data_start_row..grid.row_count() {
        if grid.row(row).is_empty() {
            continue;
        }
        let id = grid.cell(row, plan.id_column).as_text();
        let name = grid.cell(row, plan.name_column).as_text();
        if id.is_empty() || name.is_empty() || looks_like_header(&id, &name) {
            skipped += 1;
            continue;
        }

        let mut record: BTreeMap<String, f64> = BTreeMap::new();
        for key in &keys {
            let value = plan
                .assessment_columns
                .get(key)
                .map(|&col| grid.cell(row, col).mark_value())
                .unwrap_or(0.0);
            record.insert(key.clone(), value);
        }

        if roster.marks.insert(id.clone(), record).is_some() {
            tracing::warn!(student_id = %id, row, "duplicate student id, later marks win");
        }
        roster.students.push(Student { id, name });
    }

    tracing::debug!(
        students = roster.students.len(),
        skipped,
        "student rows extracted"
    );
    roster
}
