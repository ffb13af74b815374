//! Locates the assessment-configuration block at the top of an uploaded mark sheet and
//! classifies its columns into assessment families.
//!
//! The expected template carries three consecutive-ish rows near the top of the sheet:
//! assessment names (`CT-1`, `Q1`, `Assignment`, ...), maximum marks, and CO numbers.
//! Each detector below is a narrow heuristic tied to that template and is kept as its own
//! function so it can be swapped out without touching the rest of the pipeline.

use crate::grid::{Cell, Grid};
use crate::model::{co_key, mark_key, Assessment, AssessmentConfig, CourseInfo, Family};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Rows scanned for the configuration block, counted from its start.
pub const CONFIG_SCAN_ROWS: usize = 20;
/// Rows probed for section labels ("Assessment Type", "Student ID ... Name").
pub const LABEL_SCAN_ROWS: usize = 30;
/// Rows probed for course metadata.
pub const COURSE_INFO_ROWS: usize = 10;

static CT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CT-\d+$").expect("ct pattern"));
static Q_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q\d+$").expect("question pattern"));
static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z]{2,4}\s*\d{3}$").expect("course code pattern"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLabels {
    /// Last row mentioning "assessment type" or "description" before the student header.
    pub config_label_row: Option<usize>,
    /// Row carrying both an id/roll label and a name label, after the config label.
    pub student_header_row: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRows {
    pub name_row: Option<usize>,
    pub max_marks_row: Option<usize>,
    pub co_row: Option<usize>,
}

impl AssessmentRows {
    pub fn is_complete(&self) -> bool {
        self.name_row.is_some() && self.max_marks_row.is_some() && self.co_row.is_some()
    }
}

/// Classified configuration plus the sheet column each accepted assessment was read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedTemplate {
    pub config: AssessmentConfig,
    /// Mark key -> configuration-block column.
    pub columns: BTreeMap<String, usize>,
}

/// Whether a name-row cell looks like an assessment header.
pub fn is_assessment_name(cell: &Cell) -> bool {
    let up = cell.as_text().to_uppercase();
    CT_NAME.is_match(&up)
        || Q_NAME.is_match(&up)
        || up == "ASSIGNMENT"
        || up.contains("ATTENDANCE")
        || up.contains("PERFORMANCE")
}

/// Max-marks row detector. Only the template's canonical values (10 and 30) qualify.
pub fn is_max_marks_value(cell: &Cell) -> bool {
    matches!(cell.as_number(), Some(v) if v == 10.0 || v == 30.0)
}

/// CO-row cell: an integer in 1..=12.
pub fn co_number(cell: &Cell) -> Option<usize> {
    match cell.as_integer() {
        Some(n) if (1..=12).contains(&n) => Some(n as usize),
        _ => None,
    }
}

/// Number of assessment-looking tokens in a row's joined text.
pub fn assessment_token_count(grid: &Grid, row: usize) -> usize {
    grid.row(row)
        .iter()
        .map(|c| c.as_text().to_lowercase())
        .filter(|t| {
            t.contains("ct-")
                || t.contains("assignment")
                || t.contains("attendance")
                || t.contains("performance")
                || is_question_token(t)
        })
        .count()
}

fn is_question_token(t: &str) -> bool {
    t.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| {
        w.len() > 1 && w.starts_with('q') && w[1..].bytes().all(|b| b.is_ascii_digit())
    })
}

/// Finds the textual section labels some templates carry.
pub fn probe_section_labels(grid: &Grid) -> SectionLabels {
    let mut labels = SectionLabels::default();
    for i in 0..grid.row_count().min(LABEL_SCAN_ROWS) {
        let text = grid.row_text(i);
        if text.contains("assessment type") || text.contains("description") {
            labels.config_label_row = Some(i);
        }
        let has_id = text.contains("id") || text.contains("roll");
        if has_id && text.contains("name") && labels.config_label_row.is_some() {
            labels.student_header_row = Some(i);
            break;
        }
    }
    labels
}

/// Scans `[start, min(start + CONFIG_SCAN_ROWS, end))` for the name, max-marks and CO rows,
/// each strictly below the previous one.
pub fn locate_assessment_rows(grid: &Grid, start: usize, end: usize) -> AssessmentRows {
    let mut rows = AssessmentRows::default();
    let stop = (start + CONFIG_SCAN_ROWS).min(end).min(grid.row_count());

    for i in start..stop {
        let row = grid.row(i);
        if row.is_empty() {
            continue;
        }
        if rows.name_row.is_none() {
            if row.iter().any(is_assessment_name) {
                rows.name_row = Some(i);
            }
            continue;
        }
        if rows.max_marks_row.is_none() {
            if row.iter().any(is_max_marks_value) {
                rows.max_marks_row = Some(i);
            }
            continue;
        }
        if row.iter().any(|c| co_number(c).is_some()) {
            rows.co_row = Some(i);
            break;
        }
    }

    if !rows.is_complete() {
        tracing::warn!(
            name_row = ?rows.name_row,
            max_marks_row = ?rows.max_marks_row,
            co_row = ?rows.co_row,
            "assessment configuration block incomplete"
        );
    }
    rows
}

/// Splits `Q<n>` columns between mid-term and final by encounter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSplit {
    pub mid_term_slots: usize,
}

impl Default for QuestionSplit {
    fn default() -> Self {
        Self { mid_term_slots: 3 }
    }
}

impl QuestionSplit {
    /// Family for the next question named `name`, or `None` if it would duplicate an
    /// existing final question.
    pub fn family_for(&self, config: &AssessmentConfig, name: &str) -> Option<Family> {
        let taken = |list: &[Assessment]| list.iter().any(|a| a.name.eq_ignore_ascii_case(name));
        if config.mid_term.len() < self.mid_term_slots && !taken(&config.mid_term) {
            Some(Family::MidTerm)
        } else if !taken(&config.final_exam) {
            Some(Family::Final)
        } else {
            None
        }
    }
}

/// Classifies an assessment name (already upper-cased) into its family.
pub fn classify_name(
    upper: &str,
    config: &AssessmentConfig,
    split: &QuestionSplit,
) -> Option<Family> {
    if CT_NAME.is_match(upper) {
        Some(Family::ClassTests)
    } else if upper.contains("ASSIGNMENT") {
        Some(Family::Assignments)
    } else if upper.contains("ATTENDANCE") {
        Some(Family::Attendance)
    } else if upper.contains("PERFORMANCE") {
        Some(Family::Performance)
    } else if Q_NAME.is_match(upper) {
        split.family_for(config, upper)
    } else {
        None
    }
}

/// Builds the assessment configuration from whatever rows were located. Without a name row
/// the configuration is empty; without a max-marks row every column resolves to 0 and is
/// skipped; without a CO row assessments carry an empty CO.
pub fn classify_assessments(
    grid: &Grid,
    rows: &AssessmentRows,
    split: &QuestionSplit,
) -> ClassifiedTemplate {
    let mut out = ClassifiedTemplate::default();
    let (Some(name_row), Some(max_row)) = (rows.name_row, rows.max_marks_row) else {
        return out;
    };

    let mut width = grid.row_len(name_row).min(grid.row_len(max_row));
    if let Some(co_row) = rows.co_row {
        width = width.min(grid.row_len(co_row));
    }

    for col in 0..width {
        let name = grid.cell(name_row, col).as_text();
        let max_marks = grid.cell(max_row, col).as_number().unwrap_or(0.0);
        if name.is_empty() || max_marks <= 0.0 {
            continue;
        }
        let co = rows
            .co_row
            .and_then(|r| co_number(grid.cell(r, col)))
            .map(co_key)
            .unwrap_or_default();

        let upper = name.to_uppercase();
        let Some(family) = classify_name(&upper, &out.config, split) else {
            tracing::debug!(col, name = %name, "unclassified configuration column");
            continue;
        };
        let assessment = Assessment::new(name, max_marks, co);
        let key = mark_key(family, &assessment);

        let list = match family {
            Family::ClassTests => &mut out.config.class_tests,
            Family::Assignments => &mut out.config.assignments,
            Family::MidTerm => &mut out.config.mid_term,
            Family::Final => &mut out.config.final_exam,
            Family::Attendance => {
                out.config.attendance = Some(assessment);
                out.columns.insert(key, col);
                continue;
            }
            Family::Performance => {
                out.config.performance = Some(assessment);
                out.columns.insert(key, col);
                continue;
            }
        };
        if list
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(&assessment.name))
        {
            tracing::warn!(col, name = %assessment.name, family = family.as_str(), "duplicate assessment ignored");
            continue;
        }
        list.push(assessment);
        out.columns.insert(key, col);
    }

    tracing::debug!(
        assessments = out.config.len(),
        total_max_marks = out.config.total_max_marks(),
        "assessment configuration classified"
    );
    out
}

/// Course metadata from the first rows of the sheet. Only the course code is recognised.
pub fn extract_course_info(grid: &Grid) -> CourseInfo {
    let mut info = CourseInfo::default();
    for i in 0..grid.row_count().min(COURSE_INFO_ROWS) {
        let text = grid.row_text(i);
        if !(text.contains("cse") || text.contains("course code")) {
            continue;
        }
        for cell in grid.row(i) {
            let t = cell.as_text();
            if COURSE_CODE.is_match(&t) {
                info.course_code = t;
            }
        }
    }
    info
}
