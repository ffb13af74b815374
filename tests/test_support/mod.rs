#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Course sheet in the department template: a configuration block (names, max marks, COs)
/// under an "Assessment Type" label, then a No./ID/Name student block.
///
/// Per-CO allocations: CO1 20, CO2 30, CO3 20, CO4 30, CO5 20. Attendance and performance
/// carry no CO.
pub fn canonical_rows() -> serde_json::Value {
    json!([
        ["Course Code:", "CSE 311", "Course Title:", "Software Engineering"],
        [],
        ["Assessment Type", "", "CT-1", "CT-2", "CT-3", "Q1", "Q2", "Q3", "Q1", "Q2", "Assignment", "Attendance", "Performance"],
        ["Max Marks", "", 10, 10, 10, 10, 10, 10, 30, 20, 10, 5, 5],
        ["CO", "", 1, 2, 3, 1, 2, 3, 4, 5, 2, "", ""],
        [],
        ["No.", "Student ID", "Student Name", "CT-1", "CT-2", "CT-3", "Mid Q1", "Mid Q2", "Mid Q3", "Final Q1", "Final Q2", "Assignment", "Attendance", "Performance"],
        [1, "201-15-001", "Alice", 8, 9, 7, 9, 8, 10, 25, 18, 9, 5, 5],
        [2, "201-15-002", "Bob", 4, 3, 4, 5, 4, 4, 10, 8, 6, 4, 3],
        [],
        [3, "201-15-003", "Cara", 10, 10, 10, 10, 10, 10, 30, 20, 10, 5, 5]
    ])
}

/// CO1, CO2 -> PO1; CO3 -> PO2; CO4, CO5 -> PO3.
pub fn canonical_mapping() -> serde_json::Value {
    json!({
        "CO1": { "PO1": 1 },
        "CO2": { "PO1": "1" },
        "CO3": { "PO2": true },
        "CO4": { "PO3": 1 },
        "CO5": { "PO3": 1 }
    })
}

pub fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_obed");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn obed");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

impl Sidecar {
    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    pub fn request_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Returns the error code.
    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}
