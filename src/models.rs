use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::table::{Record, Value, DATE_FORMAT};

const DATE_FORMATS: [&str; 4] = [DATE_FORMAT, "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub grade: i64,
    pub class: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    NotSubmitted,
    Pending,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::NotSubmitted => "not_submitted",
            SubmissionStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "submitted" => Ok(SubmissionStatus::Submitted),
            "not_submitted" => Ok(SubmissionStatus::NotSubmitted),
            "pending" => Ok(SubmissionStatus::Pending),
            other => Err(format!("unknown submission status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Homework {
    pub student_id: String,
    pub grade: i64,
    pub class: String,
    pub region: String,
    pub assignment_name: String,
    pub submission_status: SubmissionStatus,
    #[serde(deserialize_with = "deserialize_date")]
    pub due_date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    pub submission_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub quiz_name: String,
    pub grade: i64,
    pub class: String,
    pub region: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub scheduled_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PerformanceRecord {
    pub student_id: String,
    pub quiz_id: String,
    pub grade: i64,
    pub class: String,
    pub region: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
}

/// The persisted school data document. Absent sections load as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SchoolData {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub homework: Vec<Homework>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub performance: Vec<PerformanceRecord>,
}

impl Record for Student {
    const COLUMNS: &'static [&'static str] = &["student_id", "name", "grade", "class", "region"];

    fn into_row(self) -> Vec<Value> {
        vec![
            self.student_id.into(),
            self.name.into(),
            self.grade.into(),
            self.class.into(),
            self.region.into(),
        ]
    }
}

impl Record for Homework {
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "grade",
        "class",
        "region",
        "assignment_name",
        "submission_status",
        "due_date",
        "submission_date",
    ];

    fn into_row(self) -> Vec<Value> {
        vec![
            self.student_id.into(),
            self.grade.into(),
            self.class.into(),
            self.region.into(),
            self.assignment_name.into(),
            self.submission_status.as_str().into(),
            self.due_date.into(),
            self.submission_date.into(),
        ]
    }
}

impl Record for Quiz {
    const COLUMNS: &'static [&'static str] =
        &["quiz_id", "quiz_name", "grade", "class", "region", "scheduled_date"];

    fn into_row(self) -> Vec<Value> {
        vec![
            self.quiz_id.into(),
            self.quiz_name.into(),
            self.grade.into(),
            self.class.into(),
            self.region.into(),
            self.scheduled_date.into(),
        ]
    }
}

impl Record for PerformanceRecord {
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "quiz_id",
        "grade",
        "class",
        "region",
        "score",
        "max_score",
        "date",
    ];

    fn into_row(self) -> Vec<Value> {
        vec![
            self.student_id.into(),
            self.quiz_id.into(),
            self.grade.into(),
            self.class.into(),
            self.region.into(),
            self.score.into(),
            self.max_score.into(),
            self.date.into(),
        ]
    }
}

/// Parses a calendar day from the formats seen in exported school data.
/// Timestamps are truncated to their day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|ts| ts.date())
        })
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("unparseable date '{raw}'")))
}

/// Missing, null, empty and unparseable values all become `None`.
fn deserialize_lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}
