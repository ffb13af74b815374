//! CO / PO attainment engine.
//!
//! Per-student CO scores are max-mark weighted averages of the assessments tagged with that CO;
//! PO scores are CO scores averaged with each CO weighted by its allocated marks. Class-level
//! attainment is the share of students strictly above a threshold (spreadsheet `COUNTIF(">K")`).
//! Every degenerate input resolves to 0; nothing here fails.

use crate::error::InputError;
use crate::mapping::CoPoMapping;
use crate::model::{mark_key, parse_outcome_key, AssessmentConfig, Marks, Student, OUTCOME_COUNT};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use std::collections::BTreeMap;

/// Stand-in divisor for a zero max-mark, as in the source workbook's `IF(max=0, 1e-8, max)`.
pub const MAX_MARKS_EPSILON: f64 = 0.000_000_01;
pub const DEFAULT_TARGET_PASS_MARKS: f64 = 40.0;
pub const DEFAULT_KPI: f64 = 50.0;
pub const DEFAULT_DEPARTMENT_GOAL: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Co,
    Po,
}

impl Outcome {
    pub fn prefix(self) -> &'static str {
        match self {
            Outcome::Co => "CO",
            Outcome::Po => "PO",
        }
    }

    pub fn key(self, n: usize) -> String {
        format!("{}{}", self.prefix(), n)
    }
}

/// One value per outcome, `1..=12`. Serializes as `{ "CO1": .., ..., "CO12": .. }` in
/// numeric order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeTable<T> {
    kind: Outcome,
    values: [T; OUTCOME_COUNT],
}

impl<T: Copy + Default> OutcomeTable<T> {
    pub fn new(kind: Outcome) -> Self {
        Self {
            kind,
            values: [T::default(); OUTCOME_COUNT],
        }
    }

    pub fn from_fn(kind: Outcome, mut f: impl FnMut(usize) -> T) -> Self {
        let mut t = Self::new(kind);
        for n in 1..=OUTCOME_COUNT {
            t.values[n - 1] = f(n);
        }
        t
    }

    pub fn kind(&self) -> Outcome {
        self.kind
    }

    /// 1-based. Outcomes outside `1..=12` read as the default value.
    pub fn get(&self, n: usize) -> T {
        n.checked_sub(1)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or_default()
    }

    pub fn by_key(&self, key: &str) -> Option<T> {
        parse_outcome_key(key, self.kind.prefix()).map(|n| self.get(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.values.iter().enumerate().map(|(i, v)| (i + 1, *v))
    }
}

impl<T: Serialize> Serialize for OutcomeTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(OUTCOME_COUNT))?;
        for (i, v) in self.values.iter().enumerate() {
            map.serialize_entry(&self.kind.key(i + 1), v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub target_pass_marks: f64,
    #[serde(rename = "kpiCO")]
    pub kpi_co: f64,
    #[serde(rename = "kpiPO")]
    pub kpi_po: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            target_pass_marks: DEFAULT_TARGET_PASS_MARKS,
            kpi_co: DEFAULT_KPI,
            kpi_po: DEFAULT_KPI,
        }
    }
}

impl Thresholds {
    /// Range check applied where users enter thresholds; the engine itself accepts anything.
    pub fn validate(&self) -> Result<(), InputError> {
        let fields = [
            ("targetPassMarks", self.target_pass_marks),
            ("kpiCO", self.kpi_co),
            ("kpiPO", self.kpi_po),
        ];
        for (name, v) in fields {
            if !v.is_finite() || v <= 0.0 || v > 100.0 {
                return Err(
                    InputError::bad_params(format!("{} must be in (0, 100]", name))
                        .with_details(json!({ "field": name, "value": v })),
                );
            }
        }
        Ok(())
    }
}

/// Total max marks allocated to each CO.
pub fn co_mark_allocations(config: &AssessmentConfig) -> OutcomeTable<f64> {
    let mut t = OutcomeTable::new(Outcome::Co);
    for (_, a) in config.iter() {
        if let Some(n) = parse_outcome_key(&a.co, "CO") {
            t.values[n - 1] += a.max_marks;
        }
    }
    t
}

/// Score (percent, not clamped) of one student for CO `co` (1-based).
pub fn calculate_student_co(
    student_marks: Option<&BTreeMap<String, f64>>,
    co: usize,
    config: &AssessmentConfig,
) -> f64 {
    let relevant: Vec<_> = config
        .iter()
        .filter(|(_, a)| parse_outcome_key(&a.co, "CO") == Some(co))
        .collect();
    if relevant.is_empty() {
        return 0.0;
    }
    let total: f64 = relevant.iter().map(|(_, a)| a.max_marks).sum();
    if total == 0.0 {
        return 0.0;
    }

    let mut sum = 0.0_f64;
    for (family, a) in relevant {
        let mark = student_marks
            .and_then(|m| m.get(&mark_key(family, a)))
            .copied()
            .unwrap_or(0.0);
        let divisor = if a.max_marks == 0.0 {
            MAX_MARKS_EPSILON
        } else {
            a.max_marks
        };
        let ratio = mark / divisor;
        let weight = a.max_marks / total;
        sum += ratio * weight;
    }
    sum * 100.0
}

/// Score of one student for PO `po` (1-based): CO scores averaged by allocated marks over the
/// COs mapped to it. COs with no allocated marks carry no weight.
pub fn calculate_student_po(
    po: usize,
    student_cos: &OutcomeTable<f64>,
    allocations: &OutcomeTable<f64>,
    mapping: &CoPoMapping,
) -> f64 {
    let mut weighted = 0.0_f64;
    let mut weight = 0.0_f64;
    for co in mapping.cos_for_po(po) {
        let total = allocations.get(co);
        if total > 0.0 {
            weighted += student_cos.get(co) * total;
            weight += total;
        }
    }
    if weight == 0.0 {
        0.0
    } else {
        weighted / weight
    }
}

/// Percentage of `scores` strictly above `threshold`; 0 for no scores.
pub fn attainment_percentage<I>(scores: I, threshold: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0usize;
    let mut above = 0usize;
    for s in scores {
        total += 1;
        if s > threshold {
            above += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        above as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdAttainment {
    pub pass_marks_percentage: f64,
    pub kpi_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentResult {
    #[serde(rename = "studentCOs")]
    pub student_cos: BTreeMap<String, OutcomeTable<f64>>,
    #[serde(rename = "studentPOs")]
    pub student_pos: BTreeMap<String, OutcomeTable<f64>>,
    pub co_attainment: OutcomeTable<ThresholdAttainment>,
    pub po_attainment: OutcomeTable<ThresholdAttainment>,
    pub target_pass_marks: f64,
    #[serde(rename = "kpiCO")]
    pub kpi_co: f64,
    #[serde(rename = "kpiPO")]
    pub kpi_po: f64,
}

/// Full recomputation over the roster. Pure: identical inputs give identical output.
pub fn calculate_all_attainments(
    students: &[Student],
    marks: &Marks,
    config: &AssessmentConfig,
    mapping: &CoPoMapping,
    thresholds: &Thresholds,
) -> AttainmentResult {
    let allocations = co_mark_allocations(config);

    let mut student_cos = BTreeMap::new();
    let mut student_pos = BTreeMap::new();
    for s in students {
        let own = marks.get(&s.id);
        let cos = OutcomeTable::from_fn(Outcome::Co, |co| calculate_student_co(own, co, config));
        let pos = OutcomeTable::from_fn(Outcome::Po, |po| {
            calculate_student_po(po, &cos, &allocations, mapping)
        });
        student_cos.insert(s.id.clone(), cos);
        student_pos.insert(s.id.clone(), pos);
    }

    // Counts run over the roster, so duplicate ids count once per row.
    let class = |table: &BTreeMap<String, OutcomeTable<f64>>, n: usize, threshold: f64| {
        attainment_percentage(
            students
                .iter()
                .map(|s| table.get(&s.id).map(|t| t.get(n)).unwrap_or(0.0)),
            threshold,
        )
    };
    let co_attainment = OutcomeTable::from_fn(Outcome::Co, |n| ThresholdAttainment {
        pass_marks_percentage: class(&student_cos, n, thresholds.target_pass_marks),
        kpi_percentage: class(&student_cos, n, thresholds.kpi_co),
    });
    let po_attainment = OutcomeTable::from_fn(Outcome::Po, |n| ThresholdAttainment {
        pass_marks_percentage: class(&student_pos, n, thresholds.target_pass_marks),
        kpi_percentage: class(&student_pos, n, thresholds.kpi_po),
    });

    tracing::debug!(
        students = students.len(),
        links = mapping.link_count(),
        "attainment recomputed"
    );

    AttainmentResult {
        student_cos,
        student_pos,
        co_attainment,
        po_attainment,
        target_pass_marks: thresholds.target_pass_marks,
        kpi_co: thresholds.kpi_co,
        kpi_po: thresholds.kpi_po,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub outcome: String,
    pub class_average: f64,
    pub pass_marks_percentage: f64,
    pub kpi_percentage: f64,
    /// KPI share reaches the department goal.
    pub meets_goal: bool,
    /// Allocated marks for COs; for POs, the allocated marks of the mapped COs.
    pub allocated_marks: f64,
    pub linked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentSummary {
    pub student_count: usize,
    pub department_goal: f64,
    pub cos: Vec<OutcomeSummary>,
    pub pos: Vec<OutcomeSummary>,
}

fn class_average(students: &[Student], table: &BTreeMap<String, OutcomeTable<f64>>, n: usize) -> f64 {
    if students.is_empty() {
        return 0.0;
    }
    let sum: f64 = students
        .iter()
        .map(|s| table.get(&s.id).map(|t| t.get(n)).unwrap_or(0.0))
        .sum();
    sum / students.len() as f64
}

/// Class-level view of a computed result: averages, threshold shares and goal flags.
pub fn attainment_summary(
    students: &[Student],
    config: &AssessmentConfig,
    mapping: &CoPoMapping,
    result: &AttainmentResult,
    department_goal: f64,
) -> AttainmentSummary {
    let allocations = co_mark_allocations(config);

    let cos = (1..=OUTCOME_COUNT)
        .map(|n| {
            let a = result.co_attainment.get(n);
            OutcomeSummary {
                outcome: Outcome::Co.key(n),
                class_average: class_average(students, &result.student_cos, n),
                pass_marks_percentage: a.pass_marks_percentage,
                kpi_percentage: a.kpi_percentage,
                meets_goal: a.kpi_percentage >= department_goal,
                allocated_marks: allocations.get(n),
                linked: (1..=OUTCOME_COUNT)
                    .filter(|&po| mapping.is_mapped(n, po))
                    .map(|po| Outcome::Po.key(po))
                    .collect(),
            }
        })
        .collect();

    let pos = (1..=OUTCOME_COUNT)
        .map(|n| {
            let a = result.po_attainment.get(n);
            let linked = mapping.cos_for_po(n);
            OutcomeSummary {
                outcome: Outcome::Po.key(n),
                class_average: class_average(students, &result.student_pos, n),
                pass_marks_percentage: a.pass_marks_percentage,
                kpi_percentage: a.kpi_percentage,
                meets_goal: a.kpi_percentage >= department_goal,
                allocated_marks: linked.iter().map(|&co| allocations.get(co)).sum(),
                linked: linked.into_iter().map(|co| Outcome::Co.key(co)).collect(),
            }
        })
        .collect();

    AttainmentSummary {
        student_count: students.len(),
        department_goal,
        cos,
        pos,
    }
}
