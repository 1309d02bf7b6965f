//! Chore models.
//!
//! A chore is a scheduled list of process invocations. Tasks are addressed
//! positionally by the server; their step indices are contiguous from 0.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::CoreError;

// ============================================================================
// Execution Mode
// ============================================================================

/// How a chore commits its tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// All tasks commit together.
    #[default]
    SingleCommit,
    /// Each task commits separately.
    MultipleCommit,
}

// ============================================================================
// Frequency
// ============================================================================

/// Interval between chore runs, serialized as `P{d}DT{hh}H{mm}M{ss}S`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChoreFrequency {
    /// Days.
    pub days: u32,
    /// Hours.
    pub hours: u32,
    /// Minutes.
    pub minutes: u32,
    /// Seconds.
    pub seconds: u32,
}

impl ChoreFrequency {
    /// Creates a frequency.
    pub fn new(days: u32, hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

impl fmt::Display for ChoreFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{:02}DT{:02}H{:02}M{:02}S",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl FromStr for ChoreFrequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidData(format!("Invalid chore frequency: {s}"));

        let rest = s.trim().strip_prefix('P').ok_or_else(invalid)?;
        let (days, time) = rest.split_once("DT").ok_or_else(invalid)?;
        let (hours, time) = time.split_once('H').ok_or_else(invalid)?;
        let (minutes, time) = time.split_once('M').ok_or_else(invalid)?;
        let seconds = time.strip_suffix('S').ok_or_else(invalid)?;

        let num = |part: &str| part.parse::<u32>().map_err(|_| invalid());
        Ok(Self {
            days: num(days)?,
            hours: num(hours)?,
            minutes: num(minutes)?,
            seconds: num(seconds)?,
        })
    }
}

impl Serialize for ChoreFrequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChoreFrequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Start Time
// ============================================================================

/// Parses a chore start time into its wall-clock fields.
///
/// Accepts RFC 3339 (`2025-01-01T12:00:00Z`, `...+01:00`) and the
/// minute-precision forms the server emits (`2025-01-01T12:00Z`).
pub fn parse_start_time(raw: &str) -> Result<NaiveDateTime, CoreError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt.naive_local());
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt);
        }
    }

    Err(CoreError::InvalidData(format!("Invalid chore start time: {raw}")))
}

/// Body for `tm1.SetServerLocalStartTime`.
///
/// The date is unpadded (`2025-1-1`), the time is `HH:MM:SS`.
pub fn local_start_time_body(start: &NaiveDateTime) -> Value {
    json!({
        "StartDate": start.format("%Y-%-m-%-d").to_string(),
        "StartTime": start.format("%H:%M:%S").to_string(),
    })
}

// ============================================================================
// Tasks
// ============================================================================

/// A named process parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoreTaskParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value (string or number).
    #[serde(default)]
    pub value: Value,
}

impl ChoreTaskParameter {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A process invocation inside a chore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawChoreTask")]
pub struct ChoreTask {
    /// Zero-based position in the chore.
    pub step: usize,
    /// Name of the process to run.
    pub process_name: String,
    /// Parameters in caller order.
    pub parameters: Vec<ChoreTaskParameter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawChoreTask {
    #[serde(default)]
    step: usize,
    #[serde(default)]
    process: Option<RawProcessRef>,
    #[serde(default)]
    process_name: Option<String>,
    #[serde(default)]
    parameters: Vec<ChoreTaskParameter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawProcessRef {
    #[serde(default)]
    name: String,
}

impl From<RawChoreTask> for ChoreTask {
    fn from(raw: RawChoreTask) -> Self {
        let process_name = raw
            .process
            .map(|p| p.name)
            .or(raw.process_name)
            .unwrap_or_default();
        Self {
            step: raw.step,
            process_name,
            parameters: raw.parameters,
        }
    }
}

impl ChoreTask {
    /// Creates a task.
    pub fn new(
        step: usize,
        process_name: impl Into<String>,
        parameters: Vec<ChoreTaskParameter>,
    ) -> Self {
        Self {
            step,
            process_name: process_name.into(),
            parameters,
        }
    }

    /// Request body used to create or update the task.
    pub fn body(&self) -> Value {
        let parameters: Vec<Value> = self
            .parameters
            .iter()
            .map(|p| json!({ "Name": p.name, "Value": p.value }))
            .collect();

        json!({
            "Process@odata.bind": format!("Processes('{}')", self.process_name.replace('\'', "''")),
            "Parameters": parameters,
        })
    }

    /// Value equality on process name and ordered parameters.
    ///
    /// Parameter values compare by string form, so `1` and `"1"` are equal.
    pub fn same_work_as(&self, other: &ChoreTask) -> bool {
        self.process_name == other.process_name
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| {
                    a.name == b.name && value_as_string(&a.value) == value_as_string(&b.value)
                })
    }
}

// ============================================================================
// Chore
// ============================================================================

/// A scheduled chore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chore {
    /// Chore name.
    pub name: String,
    /// Start time as reported by the server.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Whether the start time follows daylight saving changes.
    #[serde(rename = "DSTSensitive", default)]
    pub dst_sensitive: bool,
    /// Whether the chore is scheduled.
    #[serde(default)]
    pub active: bool,
    /// Commit mode.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Interval between runs.
    #[serde(default)]
    pub frequency: ChoreFrequency,
    /// Tasks in step order.
    #[serde(default)]
    pub tasks: Vec<ChoreTask>,
}

impl Chore {
    /// Creates an inactive chore with no tasks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Body for `PATCH /Chores('{name}')`.
    pub fn update_body(&self) -> Value {
        let mut body = json!({
            "Name": self.name,
            "DSTSensitive": self.dst_sensitive,
            "Active": self.active,
            "ExecutionMode": self.execution_mode,
            "Frequency": self.frequency,
        });
        if let Some(start) = &self.start_time {
            body["StartTime"] = Value::String(start.clone());
        }
        body
    }

    /// Body for `POST /Chores`, tasks included.
    pub fn create_body(&self) -> Value {
        let mut body = self.update_body();
        let tasks: Vec<Value> = self.tasks.iter().map(ChoreTask::body).collect();
        body["Tasks"] = Value::Array(tasks);
        body
    }

    /// Parsed start time, if one is set.
    pub fn parsed_start_time(&self) -> Result<Option<NaiveDateTime>, CoreError> {
        self.start_time
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_start_time)
            .transpose()
    }

    /// Re-numbers task steps to be contiguous from 0.
    pub fn reindex_tasks(&mut self) {
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.step = i;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_frequency_roundtrip() {
        let freq: ChoreFrequency = "P01DT02H30M00S".parse().unwrap();
        assert_eq!(freq, ChoreFrequency::new(1, 2, 30, 0));
        assert_eq!(freq.to_string(), "P01DT02H30M00S");

        assert!("1DT00H".parse::<ChoreFrequency>().is_err());
        assert!("PxDT00H00M00S".parse::<ChoreFrequency>().is_err());
    }

    #[test]
    fn test_parse_start_time_variants() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        assert_eq!(parse_start_time("2025-01-01T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_start_time("2025-01-01T12:00Z").unwrap(), expected);
        assert_eq!(parse_start_time("2025-01-01T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_start_time("2025-01-01T12:00+02:00").unwrap(), expected);
        assert!(parse_start_time("yesterday").is_err());
    }

    #[test]
    fn test_local_start_time_body() {
        let start = parse_start_time("2025-03-07T04:05:06Z").unwrap();
        assert_eq!(start.hour(), 4);
        let body = local_start_time_body(&start);
        assert_eq!(body["StartDate"], "2025-3-7");
        assert_eq!(body["StartTime"], "04:05:06");
    }

    #[test]
    fn test_task_deserialize_expanded_process() {
        let json = r#"{
            "Step": 1,
            "Process": {"Name": "load.sales"},
            "Parameters": [{"Name": "pYear", "Value": 2025}]
        }"#;
        let task: ChoreTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.step, 1);
        assert_eq!(task.process_name, "load.sales");
        assert_eq!(task.parameters[0].value, Value::from(2025));
    }

    #[test]
    fn test_task_equality_by_string_form() {
        let a = ChoreTask::new(0, "p", vec![ChoreTaskParameter::new("x", 1)]);
        let b = ChoreTask::new(3, "p", vec![ChoreTaskParameter::new("x", "1")]);
        let c = ChoreTask::new(0, "p", vec![ChoreTaskParameter::new("x", "2")]);
        let d = ChoreTask::new(0, "q", vec![ChoreTaskParameter::new("x", 1)]);

        assert!(a.same_work_as(&b));
        assert!(!a.same_work_as(&c));
        assert!(!a.same_work_as(&d));
    }

    #[test]
    fn test_task_body() {
        let task = ChoreTask::new(
            0,
            "O'Brien",
            vec![
                ChoreTaskParameter::new("b", "2"),
                ChoreTaskParameter::new("a", 1),
            ],
        );
        let body = task.body();
        assert_eq!(body["Process@odata.bind"], "Processes('O''Brien')");
        assert_eq!(body["Parameters"][0]["Name"], "b");
        assert_eq!(body["Parameters"][1]["Name"], "a");
    }

    #[test]
    fn test_chore_deserialize() {
        let json = r#"{
            "Name": "Nightly",
            "StartTime": "2025-01-01T12:00Z",
            "DSTSensitive": true,
            "Active": true,
            "ExecutionMode": "MultipleCommit",
            "Frequency": "P01DT00H00M00S",
            "Tasks": [
                {"Step": 0, "Process": {"Name": "A"}, "Parameters": []},
                {"Step": 1, "Process": {"Name": "B"}, "Parameters": []}
            ]
        }"#;
        let chore: Chore = serde_json::from_str(json).unwrap();
        assert!(chore.active);
        assert!(chore.dst_sensitive);
        assert_eq!(chore.execution_mode, ExecutionMode::MultipleCommit);
        assert_eq!(chore.frequency.days, 1);
        assert_eq!(chore.tasks.len(), 2);

        let body = chore.update_body();
        assert_eq!(body["Frequency"], "P01DT00H00M00S");
        assert!(body.get("Tasks").is_none());
        assert_eq!(chore.create_body()["Tasks"].as_array().unwrap().len(), 2);
    }
}
