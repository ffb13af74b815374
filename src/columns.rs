//! Student-block header detection and assessment-to-column mapping.

use crate::grid::Grid;
use crate::model::{mark_key, AssessmentConfig, Family};
use crate::template::{assessment_token_count, SectionLabels};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// First row checked for a numeric student id when no labelled header exists.
pub const NUMERIC_SCAN_START: usize = 10;
/// Share of assessments that must match by header text to keep the text matches.
pub const TEXT_MATCH_QUORUM: f64 = 0.5;

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical pattern"));
static QUESTION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bQ(\d+)\b").expect("question token pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBlock {
    /// Row holding the assessment codes.
    pub header_row: usize,
    /// Row holding the No./ID/Name captions. Equals `header_row` unless the codes sit above it.
    pub caption_row: usize,
    pub data_start_row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MappingStrategy {
    /// Every assessment matched a header.
    Text,
    /// Most matched by text, the rest filled by position.
    Mixed,
    /// Text matching fell below quorum; columns assigned purely by position.
    Positional,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPlan {
    pub header_row: usize,
    pub caption_row: usize,
    pub data_start_row: usize,
    pub no_column: Option<usize>,
    pub id_column: usize,
    pub name_column: usize,
    /// Mark key -> student-block column.
    pub assessment_columns: BTreeMap<String, usize>,
    pub strategy: MappingStrategy,
    pub text_matched: usize,
    pub expected: usize,
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Finds the student header row and the first data row.
///
/// A labelled header (id/roll + name under an "assessment type" block) wins; otherwise the
/// header is the row just above the first row, from row 10 on, whose first cell is all digits.
/// Either way the header moves one row up when that row carries more assessment tokens, which
/// covers templates that put the assessment codes above the ID/Name captions. The captions
/// are still read from the original row.
pub fn locate_student_block(grid: &Grid, labels: &SectionLabels) -> Option<StudentBlock> {
    let naive_header = match labels.student_header_row {
        Some(h) => h,
        None => {
            let first_data = (NUMERIC_SCAN_START..grid.row_count())
                .find(|&r| is_all_digits(&grid.cell(r, 0).as_text()))?;
            first_data - 1
        }
    };

    let mut header_row = naive_header;
    if naive_header > 0
        && assessment_token_count(grid, naive_header - 1)
            > assessment_token_count(grid, naive_header)
    {
        header_row = naive_header - 1;
    }

    Some(StudentBlock {
        header_row,
        caption_row: naive_header,
        data_start_row: naive_header + 1,
    })
}

#[derive(Debug, Clone)]
struct Expected {
    key: String,
    family: Family,
    /// Upper-cased assessment name; a header equal to it claims this assessment first.
    name: String,
    patterns: Vec<String>,
    /// Aliases that only match a header equal to them.
    exact: Vec<String>,
    /// Question number for `Q<n>` assessments.
    question: Option<u32>,
}

fn question_number(upper_name: &str) -> Option<u32> {
    let rest = upper_name.strip_prefix('Q')?;
    if is_all_digits(rest) {
        rest.parse().ok()
    } else {
        None
    }
}

fn expected_assessments(config: &AssessmentConfig) -> Vec<Expected> {
    config
        .in_column_order()
        .into_iter()
        .map(|(family, a)| {
            let up = a.name.to_uppercase();
            let mut exact = Vec::new();
            let patterns = match family {
                Family::ClassTests => {
                    let bare = up.trim_start_matches("CT-").to_string();
                    let canonical = format!("CT-{}", bare);
                    exact.push(bare);
                    vec![up.clone(), canonical]
                }
                Family::Assignments => vec![up.clone(), "ASSIGNMENT".to_string()],
                Family::Attendance => vec!["ATTENDANCE".to_string()],
                Family::Performance => vec!["PERFORMANCE".to_string()],
                Family::MidTerm => vec![
                    up.clone(),
                    format!("MID TERM {}", up),
                    format!("MIDTERM {}", up),
                    format!("MID {}", up),
                ],
                Family::Final => vec![
                    up.clone(),
                    format!("TERM FINAL {}", up),
                    format!("FINAL {}", up),
                    format!("TERM {}", up),
                ],
            };
            let question = match family {
                Family::MidTerm | Family::Final => question_number(&up),
                _ => None,
            };
            Expected {
                key: mark_key(family, a),
                family,
                name: up.clone(),
                patterns,
                exact,
                question,
            }
        })
        .collect()
}

/// `"CT-1 (CO1)"` -> `"CT-1"`.
pub fn strip_annotations(header: &str) -> String {
    PARENTHETICAL.replace_all(header, "").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExamContext {
    Mid,
    Final,
    Unknown,
}

fn exam_context(header_lower: &str) -> ExamContext {
    if header_lower.contains("mid") {
        ExamContext::Mid
    } else if header_lower.contains("final") {
        ExamContext::Final
    } else {
        ExamContext::Unknown
    }
}

fn header_matches(expected: &Expected, header: &str, clean_upper: &str) -> bool {
    if let Some(q) = expected.question {
        // Questions share names across sections; the number must agree and any section
        // wording in the header must point at the right family.
        let context = exam_context(&header.to_lowercase());
        let family_ok = match context {
            ExamContext::Mid => expected.family == Family::MidTerm,
            ExamContext::Final => expected.family == Family::Final,
            ExamContext::Unknown => true,
        };
        let number = QUESTION_TOKEN
            .captures(clean_upper)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        return family_ok && number == Some(q);
    }
    if expected.exact.iter().any(|p| p == clean_upper) {
        return true;
    }
    expected.patterns.iter().any(|p| {
        !p.is_empty()
            && (clean_upper == p || clean_upper.contains(p.as_str()) || p.contains(clean_upper))
    })
}

/// Resolves the No./ID/Name columns and maps every configured assessment to a column.
pub fn plan_columns(grid: &Grid, block: &StudentBlock, config: &AssessmentConfig) -> ColumnPlan {
    let header_len = grid.row_len(block.header_row);
    let block_width = (block.header_row.min(block.caption_row)..grid.row_count())
        .map(|r| grid.row_len(r))
        .max()
        .unwrap_or(0);

    let mut used: BTreeSet<usize> = BTreeSet::new();
    let mut no_column = None;
    let mut id_column = None;
    let mut name_column = None;

    for col in 0..grid.row_len(block.caption_row) {
        let h = grid.cell(block.caption_row, col).as_text().to_lowercase();
        if (h == "no." || h == "no" || h.contains("number")) && no_column.is_none() {
            no_column = Some(col);
            used.insert(col);
        } else if (h.contains("id") || h.contains("roll"))
            && !h.contains("name")
            && id_column.is_none()
        {
            id_column = Some(col);
            used.insert(col);
        } else if h.contains("name") && !h.contains("id") && name_column.is_none() {
            name_column = Some(col);
            used.insert(col);
        }
    }

    let id_column = id_column.unwrap_or_else(|| {
        let c = no_column.map(|n| n + 1).unwrap_or(0);
        used.insert(c);
        c
    });
    let name_column = name_column.unwrap_or_else(|| {
        let mut c = id_column + 1;
        if used.contains(&c) {
            c = (0..).find(|c| !used.contains(c)).unwrap_or(c);
        }
        used.insert(c);
        c
    });

    let expected = expected_assessments(config);
    let mut columns: BTreeMap<String, usize> = BTreeMap::new();

    for col in 0..header_len {
        if used.contains(&col) {
            continue;
        }
        let header = grid.cell(block.header_row, col).as_text();
        if header.is_empty() {
            continue;
        }
        let clean_upper = strip_annotations(&header).to_uppercase();
        if clean_upper.is_empty() {
            continue;
        }
        let exact_owners: Vec<&Expected> =
            expected.iter().filter(|e| e.name == clean_upper).collect();
        let hit = if exact_owners.is_empty() {
            expected
                .iter()
                .filter(|e| !columns.contains_key(&e.key))
                .find(|e| header_matches(e, &header, &clean_upper))
        } else {
            // A header naming an assessment exactly never falls through to a looser alias,
            // so "CT-10" cannot be claimed by CT-1.
            exact_owners
                .into_iter()
                .filter(|e| !columns.contains_key(&e.key))
                .find(|e| header_matches(e, &header, &clean_upper))
        };
        if let Some(e) = hit {
            columns.insert(e.key.clone(), col);
            used.insert(col);
        }
    }

    let text_matched = columns.len();
    let total = expected.len();
    let start_col = id_column.max(name_column) + 1;

    let strategy = if (text_matched as f64) < (total as f64) * TEXT_MATCH_QUORUM {
        tracing::info!(
            text_matched,
            expected = total,
            "header text matching below quorum, mapping columns by position"
        );
        columns.clear();
        used.clear();
        used.insert(id_column);
        used.insert(name_column);
        if let Some(n) = no_column {
            used.insert(n);
        }
        fill_by_position(&expected, &mut columns, &mut used, start_col, block_width);
        MappingStrategy::Positional
    } else if text_matched < total {
        fill_by_position(&expected, &mut columns, &mut used, start_col, block_width);
        MappingStrategy::Mixed
    } else {
        MappingStrategy::Text
    };

    if columns.len() < total {
        tracing::warn!(
            mapped = columns.len(),
            expected = total,
            "some assessments have no column; their marks will read as 0"
        );
    }

    ColumnPlan {
        header_row: block.header_row,
        caption_row: block.caption_row,
        data_start_row: block.data_start_row,
        no_column,
        id_column,
        name_column,
        assessment_columns: columns,
        strategy,
        text_matched,
        expected: total,
    }
}

fn fill_by_position(
    expected: &[Expected],
    columns: &mut BTreeMap<String, usize>,
    used: &mut BTreeSet<usize>,
    start_col: usize,
    width: usize,
) {
    let mut col = start_col;
    for e in expected {
        if columns.contains_key(&e.key) {
            continue;
        }
        while col < width && used.contains(&col) {
            col += 1;
        }
        if col >= width {
            break;
        }
        columns.insert(e.key.clone(), col);
        used.insert(col);
        col += 1;
    }
}
