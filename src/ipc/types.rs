use crate::calc::{AttainmentResult, Thresholds};
use crate::config::Config;
use crate::mapping::CoPoMapping;
use crate::sheet::ParsedSheet;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

fn rfc3339<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The loaded sheet plus user edits to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(serialize_with = "rfc3339")]
    pub parsed_at: DateTime<Utc>,
    #[serde(serialize_with = "rfc3339")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub sheet: ParsedSheet,
}

impl Session {
    pub fn new(sheet: ParsedSheet) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            parsed_at: now,
            updated_at: now,
            sheet,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Last `calc.attainment` output keyed by the SHA-256 fingerprint of its inputs.
#[derive(Debug, Clone)]
pub struct CalcMemo {
    pub fingerprint: String,
    pub result: AttainmentResult,
}

/// Mapping and thresholds outlive any one sheet; `session.clear` keeps them.
pub struct AppState {
    pub session: Option<Session>,
    pub mapping: CoPoMapping,
    pub thresholds: Thresholds,
    pub department_goal: f64,
    pub memo: Option<CalcMemo>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            session: None,
            mapping: CoPoMapping::empty(),
            thresholds: config.thresholds,
            department_goal: config.department_goal,
            memo: None,
        }
    }
}
