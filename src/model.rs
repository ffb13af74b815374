use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OUTCOME_COUNT: usize = 12;

/// `CO1`..`CO12`.
pub fn co_key(n: usize) -> String {
    format!("CO{}", n)
}

/// `PO1`..`PO12`.
pub fn po_key(n: usize) -> String {
    format!("PO{}", n)
}

/// Parses `CO<n>` / `PO<n>` (case-insensitive) into a 1-based index within 1..=12.
pub fn parse_outcome_key(key: &str, prefix: &str) -> Option<usize> {
    let k = key.trim();
    let head = k.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let n = k[prefix.len()..].parse::<usize>().ok()?;
    (1..=OUTCOME_COUNT).contains(&n).then_some(n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    #[serde(rename = "cts")]
    ClassTests,
    #[serde(rename = "assignments")]
    Assignments,
    #[serde(rename = "attendance")]
    Attendance,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "midTerm")]
    MidTerm,
    #[serde(rename = "final")]
    Final,
}

impl Family {
    /// Order in which the student block is expected to lay out assessment columns.
    pub const COLUMN_ORDER: [Family; 6] = [
        Family::ClassTests,
        Family::Assignments,
        Family::Attendance,
        Family::Performance,
        Family::MidTerm,
        Family::Final,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Family::ClassTests => "cts",
            Family::Assignments => "assignments",
            Family::Attendance => "attendance",
            Family::Performance => "performance",
            Family::MidTerm => "midTerm",
            Family::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Family> {
        match s.trim() {
            "cts" | "classTests" => Some(Family::ClassTests),
            "assignments" => Some(Family::Assignments),
            "attendance" => Some(Family::Attendance),
            "performance" => Some(Family::Performance),
            "midTerm" => Some(Family::MidTerm),
            "final" => Some(Family::Final),
            _ => None,
        }
    }

    /// Label used for the single-slot families in mark keys and reports.
    pub fn single_label(self) -> Option<&'static str> {
        match self {
            Family::Attendance => Some("Attendance"),
            Family::Performance => Some("Performance"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub name: String,
    pub max_marks: f64,
    /// `CO1`..`CO12`, or empty when unassigned.
    #[serde(default)]
    pub co: String,
}

impl Assessment {
    pub fn new(name: impl Into<String>, max_marks: f64, co: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_marks,
            co: co.into(),
        }
    }
}

/// Mark-table key for an assessment of the given family.
pub fn mark_key(family: Family, assessment: &Assessment) -> String {
    let name = family.single_label().unwrap_or(assessment.name.as_str());
    format!("{}_{}", family.as_str(), name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentConfig {
    #[serde(rename = "cts", default)]
    pub class_tests: Vec<Assessment>,
    #[serde(default)]
    pub mid_term: Vec<Assessment>,
    #[serde(rename = "final", default)]
    pub final_exam: Vec<Assessment>,
    #[serde(default)]
    pub assignments: Vec<Assessment>,
    #[serde(default)]
    pub attendance: Option<Assessment>,
    #[serde(default)]
    pub performance: Option<Assessment>,
}

impl AssessmentConfig {
    pub fn family(&self, family: Family) -> Vec<&Assessment> {
        match family {
            Family::ClassTests => self.class_tests.iter().collect(),
            Family::Assignments => self.assignments.iter().collect(),
            Family::MidTerm => self.mid_term.iter().collect(),
            Family::Final => self.final_exam.iter().collect(),
            Family::Attendance => self.attendance.iter().collect(),
            Family::Performance => self.performance.iter().collect(),
        }
    }

    /// Every configured assessment in calculation order:
    /// class tests, mid-term, final, assignments, attendance, performance.
    pub fn iter(&self) -> impl Iterator<Item = (Family, &Assessment)> {
        self.class_tests
            .iter()
            .map(|a| (Family::ClassTests, a))
            .chain(self.mid_term.iter().map(|a| (Family::MidTerm, a)))
            .chain(self.final_exam.iter().map(|a| (Family::Final, a)))
            .chain(self.assignments.iter().map(|a| (Family::Assignments, a)))
            .chain(self.attendance.iter().map(|a| (Family::Attendance, a)))
            .chain(self.performance.iter().map(|a| (Family::Performance, a)))
    }

    /// Assessments in the order the student block lays out columns.
    pub fn in_column_order(&self) -> Vec<(Family, &Assessment)> {
        Family::COLUMN_ORDER
            .iter()
            .flat_map(|f| self.family(*f).into_iter().map(move |a| (*f, a)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_max_marks(&self) -> f64 {
        self.iter().map(|(_, a)| a.max_marks).sum()
    }

    pub fn mark_keys(&self) -> Vec<String> {
        self.iter().map(|(f, a)| mark_key(f, a)).collect()
    }

    pub fn find_mut(&mut self, family: Family, name: &str) -> Option<&mut Assessment> {
        let matches = |a: &Assessment| a.name.eq_ignore_ascii_case(name.trim());
        match family {
            Family::ClassTests => self.class_tests.iter_mut().find(|a| matches(&**a)),
            Family::Assignments => self.assignments.iter_mut().find(|a| matches(&**a)),
            Family::MidTerm => self.mid_term.iter_mut().find(|a| matches(&**a)),
            Family::Final => self.final_exam.iter_mut().find(|a| matches(&**a)),
            // Single-slot families are addressed by family alone.
            Family::Attendance => self.attendance.as_mut(),
            Family::Performance => self.performance.as_mut(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
}

/// Student id -> mark key -> mark.
pub type Marks = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    pub course_code: String,
    pub course_title: String,
    pub department: String,
    pub academic_year: String,
    pub semester: String,
    pub section: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AssessmentConfig {
        AssessmentConfig {
            class_tests: vec![Assessment::new("CT-1", 10.0, "CO1")],
            mid_term: vec![Assessment::new("Q1", 10.0, "CO2")],
            final_exam: vec![Assessment::new("Q4", 30.0, "CO3")],
            assignments: vec![Assessment::new("Assignment", 10.0, "")],
            attendance: Some(Assessment::new("Attendance (5%)", 5.0, "")),
            performance: None,
        }
    }

    #[test]
    fn single_slot_keys_use_canonical_label() {
        let c = sample();
        assert_eq!(
            c.mark_keys(),
            vec![
                "cts_CT-1",
                "midTerm_Q1",
                "final_Q4",
                "assignments_Assignment",
                "attendance_Attendance"
            ]
        );
    }

    #[test]
    fn column_order_differs_from_calc_order() {
        let c = sample();
        let order: Vec<Family> = c.in_column_order().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            order,
            vec![
                Family::ClassTests,
                Family::Assignments,
                Family::Attendance,
                Family::MidTerm,
                Family::Final
            ]
        );
        assert_eq!(c.total_max_marks(), 65.0);
    }

    #[test]
    fn outcome_keys_parse_in_range_only() {
        assert_eq!(parse_outcome_key("CO1", "CO"), Some(1));
        assert_eq!(parse_outcome_key("po12", "PO"), Some(12));
        assert_eq!(parse_outcome_key("CO13", "CO"), None);
        assert_eq!(parse_outcome_key("CO0", "CO"), None);
        assert_eq!(parse_outcome_key("CO", "CO"), None);
    }

    #[test]
    fn config_serializes_with_wire_keys() {
        let v = serde_json::to_value(sample()).expect("json");
        assert!(v.get("cts").is_some());
        assert!(v.get("midTerm").is_some());
        assert!(v.get("final").is_some());
        assert_eq!(v["cts"][0]["maxMarks"], 10.0);
        assert!(v["performance"].is_null());
    }
}
