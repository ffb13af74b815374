use crate::columns::{locate_student_block, plan_columns, ColumnPlan};
use crate::grid::Grid;
use crate::model::{AssessmentConfig, CourseInfo, Marks, Student};
use crate::roster::extract_roster;
use crate::template::{
    classify_assessments, extract_course_info, locate_assessment_rows, probe_section_labels,
    AssessmentRows, QuestionSplit, SectionLabels,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDiagnostics {
    pub labels: SectionLabels,
    pub assessment_rows: AssessmentRows,
    /// Mark key -> column in the configuration block.
    pub config_columns: BTreeMap<String, usize>,
    pub columns: Option<ColumnPlan>,
    /// False when the roster or the configuration came out empty.
    pub has_required_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSheet {
    pub assessments: AssessmentConfig,
    pub students: Vec<Student>,
    pub marks: Marks,
    pub course_info: CourseInfo,
    pub diagnostics: ParseDiagnostics,
}

/// grid -> configuration -> column plan -> roster + marks. Never fails: structural problems
/// show up as an empty configuration or roster.
pub fn parse_spreadsheet(grid: &Grid) -> ParsedSheet {
    parse_spreadsheet_with(grid, &QuestionSplit::default())
}

pub fn parse_spreadsheet_with(grid: &Grid, split: &QuestionSplit) -> ParsedSheet {
    let labels = probe_section_labels(grid);
    let block = locate_student_block(grid, &labels);

    let config_start = labels.config_label_row.unwrap_or(0);
    let config_end = block
        .map(|b| b.header_row.min(b.data_start_row))
        .unwrap_or_else(|| grid.row_count());
    let assessment_rows = locate_assessment_rows(grid, config_start, config_end);
    let template = classify_assessments(grid, &assessment_rows, split);

    let (columns, students, marks) = match block {
        Some(b) => {
            let plan = plan_columns(grid, &b, &template.config);
            let roster = extract_roster(grid, &plan, &template.config);
            (Some(plan), roster.students, roster.marks)
        }
        None => {
            tracing::warn!("no student block found");
            (None, Vec::new(), Marks::new())
        }
    };

    let has_required_data = !students.is_empty() && !template.config.is_empty();
    tracing::info!(
        rows = grid.row_count(),
        assessments = template.config.len(),
        students = students.len(),
        has_required_data,
        "spreadsheet parsed"
    );

    ParsedSheet {
        assessments: template.config,
        students,
        marks,
        course_info: extract_course_info(grid),
        diagnostics: ParseDiagnostics {
            labels,
            assessment_rows,
            config_columns: template.columns,
            columns,
            has_required_data,
        },
    }
}
