//! Property tests for the attainment engine: finite output, full outcome coverage, bounded
//! class percentages and deterministic recomputation, for arbitrary configurations, marks and
//! mappings (zero max-marks and unassigned COs included).

use obed::calc::{calculate_all_attainments, Thresholds};
use obed::mapping::CoPoMapping;
use obed::model::{mark_key, Assessment, AssessmentConfig, Marks, Student};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn arb_co() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        6 => (1usize..=12).prop_map(|n| format!("CO{}", n)),
    ]
}

fn arb_assessment(name: String) -> impl Strategy<Value = Assessment> {
    (prop_oneof![1 => Just(0.0f64), 5 => 1.0f64..50.0], arb_co())
        .prop_map(move |(max, co)| Assessment::new(name.clone(), max, co))
}

fn arb_config() -> impl Strategy<Value = AssessmentConfig> {
    (
        prop::collection::vec(arb_co(), 0..4),
        prop::collection::vec(1.0f64..40.0, 4),
        prop::collection::vec(arb_co(), 0..3),
        proptest::option::of(arb_assessment("Attendance".to_string())),
        proptest::option::of(arb_assessment("Performance".to_string())),
    )
        .prop_map(|(ct_cos, maxes, q_cos, attendance, performance)| AssessmentConfig {
            class_tests: ct_cos
                .into_iter()
                .enumerate()
                .map(|(i, co)| Assessment::new(format!("CT-{}", i + 1), maxes[i % 4], co))
                .collect(),
            mid_term: q_cos
                .into_iter()
                .enumerate()
                .map(|(i, co)| Assessment::new(format!("Q{}", i + 1), 10.0, co))
                .collect(),
            attendance,
            performance,
            ..AssessmentConfig::default()
        })
}

fn arb_mapping() -> impl Strategy<Value = CoPoMapping> {
    prop::collection::vec((1usize..=12, 1usize..=12), 0..30).prop_map(CoPoMapping::from_pairs)
}

fn arb_thresholds() -> impl Strategy<Value = Thresholds> {
    (1.0f64..=100.0, 1.0f64..=100.0, 1.0f64..=100.0).prop_map(|(t, c, p)| Thresholds {
        target_pass_marks: t,
        kpi_co: c,
        kpi_po: p,
    })
}

/// Config, roster, and a mark table where some students or keys may be missing.
fn arb_case() -> impl Strategy<Value = (AssessmentConfig, Vec<Student>, Marks)> {
    (arb_config(), 0usize..8).prop_flat_map(|(config, n)| {
        let keys: Vec<String> = config.iter().map(|(f, a)| mark_key(f, a)).collect();
        let rows = prop::collection::vec(
            prop::collection::vec(proptest::option::of(0.0f64..60.0), keys.len()),
            n,
        );
        (Just(config), Just(keys), rows)
    })
    .prop_map(|(config, keys, rows)| {
        let mut students = Vec::new();
        let mut marks = Marks::new();
        for (i, row) in rows.into_iter().enumerate() {
            let id = format!("S{:03}", i);
            students.push(Student {
                id: id.clone(),
                name: format!("Student {}", i),
            });
            let record: BTreeMap<String, f64> = keys
                .iter()
                .zip(row)
                .filter_map(|(k, v)| v.map(|v| (k.clone(), v)))
                .collect();
            if !record.is_empty() {
                marks.insert(id, record);
            }
        }
        (config, students, marks)
    })
}

proptest! {
    #[test]
    fn results_are_finite_and_cover_every_outcome(
        (config, students, marks) in arb_case(),
        mapping in arb_mapping(),
        thresholds in arb_thresholds(),
    ) {
        let r = calculate_all_attainments(&students, &marks, &config, &mapping, &thresholds);

        prop_assert_eq!(r.student_cos.len(), students.len());
        for table in r.student_cos.values().chain(r.student_pos.values()) {
            for (_, v) in table.iter() {
                prop_assert!(v.is_finite());
            }
        }
        for n in 1..=12 {
            for a in [r.co_attainment.get(n), r.po_attainment.get(n)] {
                prop_assert!((0.0..=100.0).contains(&a.pass_marks_percentage));
                prop_assert!((0.0..=100.0).contains(&a.kpi_percentage));
            }
        }

        let v = serde_json::to_value(&r).expect("json");
        prop_assert_eq!(v["coAttainment"].as_object().map(|o| o.len()), Some(12));
        prop_assert_eq!(v["poAttainment"].as_object().map(|o| o.len()), Some(12));
    }

    #[test]
    fn recomputation_is_deterministic(
        (config, students, marks) in arb_case(),
        mapping in arb_mapping(),
    ) {
        let t = Thresholds::default();
        let a = calculate_all_attainments(&students, &marks, &config, &mapping, &t);
        let b = calculate_all_attainments(&students, &marks, &config, &mapping, &t);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn unmapped_pos_score_zero(
        (config, students, marks) in arb_case(),
    ) {
        let r = calculate_all_attainments(
            &students,
            &marks,
            &config,
            &CoPoMapping::empty(),
            &Thresholds::default(),
        );
        for table in r.student_pos.values() {
            prop_assert!(table.iter().all(|(_, v)| v == 0.0));
        }
    }
}
