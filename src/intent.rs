use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as Json;

/// Confidence assigned when the parser's output cannot be decoded at all.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Confidence assumed when the parser omits one.
pub const DEFAULT_PARSER_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentCategory {
    HomeworkStatus,
    Performance,
    UpcomingQuizzes,
    General,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 4] = [
        IntentCategory::HomeworkStatus,
        IntentCategory::Performance,
        IntentCategory::UpcomingQuizzes,
        IntentCategory::General,
    ];

    /// Unrecognized labels fall back to `General`; category assignment is
    /// advisory and never rejected.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "homework_status" => IntentCategory::HomeworkStatus,
            "performance" => IntentCategory::Performance,
            "upcoming_quizzes" => IntentCategory::UpcomingQuizzes,
            _ => IntentCategory::General,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IntentCategory::HomeworkStatus => "homework_status",
            IntentCategory::Performance => "performance",
            IntentCategory::UpcomingQuizzes => "upcoming_quizzes",
            IntentCategory::General => "general",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A filter parameter: a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    pub fn one(value: impl Into<String>) -> Self {
        FilterValue::One(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Many(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::One(value) => vec![value.as_str()],
            FilterValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Exact membership test.
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            FilterValue::One(value) => value == candidate,
            FilterValue::Many(values) => values.iter().any(|value| value == candidate),
        }
    }

    /// The value as one phrase; lists are joined with spaces.
    pub fn phrase(&self) -> String {
        self.values().join(" ")
    }

    /// Scalars become strings and arrays lists of strings. Nulls and objects
    /// carry no usable filter and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Array(items) => {
                let values: Vec<String> = items.iter().filter_map(scalar_text).collect();
                Some(FilterValue::Many(values))
            }
            other => scalar_text(other).map(FilterValue::One),
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::One(value) => f.write_str(value),
            FilterValue::Many(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

pub type Filters = BTreeMap<String, FilterValue>;

/// A structured classification of a question plus its extracted filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    category: IntentCategory,
    filters: Filters,
    confidence: f64,
}

impl Intent {
    pub fn new(category: IntentCategory) -> Self {
        Self {
            category,
            filters: Filters::new(),
            confidence: 1.0,
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Decodes the JSON emitted by the text-understanding service. Output that
    /// is not a JSON object degrades to a low-confidence general intent; a
    /// field of the wrong type falls back to its own default.
    pub fn from_parser_output(raw: &str) -> Self {
        let output = match serde_json::from_str::<Json>(raw) {
            Ok(Json::Object(output)) => output,
            Ok(other) => {
                tracing::debug!(value = %other, "parser output is not a json object");
                return Intent::new(IntentCategory::General).with_confidence(FALLBACK_CONFIDENCE);
            }
            Err(err) => {
                tracing::debug!(error = %err, "parser output is not valid intent json");
                return Intent::new(IntentCategory::General).with_confidence(FALLBACK_CONFIDENCE);
            }
        };

        let category = output
            .get("intent_type")
            .and_then(Json::as_str)
            .map_or(IntentCategory::General, IntentCategory::from_label);
        let filters = match output.get("filters") {
            Some(Json::Object(filters)) => filters
                .iter()
                .filter_map(|(key, value)| Some((key.clone(), FilterValue::from_json(value)?)))
                .collect(),
            _ => Filters::new(),
        };
        let confidence = match output.get("confidence") {
            Some(Json::Number(number)) => number.as_f64(),
            Some(Json::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        };

        Self {
            category,
            filters,
            confidence: clamp_confidence(confidence.unwrap_or(DEFAULT_PARSER_CONFIDENCE)),
        }
    }

    pub fn category(&self) -> IntentCategory {
        self.category
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters.get(key)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<String> = self
            .filters
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        write!(
            f,
            "Intent: {}, Filters: {{{}}}, Confidence: {:.2}",
            self.category,
            filters.join(", "),
            self.confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_labels_map_to_general() {
        assert_eq!(IntentCategory::from_label("attendance"), IntentCategory::General);
        assert_eq!(IntentCategory::from_label(""), IntentCategory::General);
        assert_eq!(
            IntentCategory::from_label(" Homework_Status "),
            IntentCategory::HomeworkStatus
        );
    }

    #[test]
    fn parser_output_coerces_filter_scalars() {
        let intent = Intent::from_parser_output(
            r#"{"intent_type":"performance","filters":{"grade":8,"class":["8A","8B"],"student_name":null},"confidence":0.95}"#,
        );
        assert_eq!(intent.category(), IntentCategory::Performance);
        assert_eq!(intent.filter("grade"), Some(&FilterValue::one("8")));
        assert_eq!(intent.filter("class"), Some(&FilterValue::many(["8A", "8B"])));
        assert!(intent.filter("student_name").is_none());
        assert!((intent.confidence() - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_parser_output_degrades_to_general() {
        let intent = Intent::from_parser_output("Sure! Here is the JSON you asked for");
        assert_eq!(intent.category(), IntentCategory::General);
        assert!(intent.filters().is_empty());
        assert!((intent.confidence() - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let intent = Intent::from_parser_output("{}");
        assert_eq!(intent.category(), IntentCategory::General);
        assert!((intent.confidence() - DEFAULT_PARSER_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn mistyped_fields_keep_the_category() {
        let intent = Intent::from_parser_output(
            r#"{"intent_type":"homework_status","filters":{"status":"pending"},"confidence":"0.9"}"#,
        );
        assert_eq!(intent.category(), IntentCategory::HomeworkStatus);
        assert_eq!(intent.filter("status"), Some(&FilterValue::one("pending")));
        assert!((intent.confidence() - 0.9).abs() < f64::EPSILON);

        let intent = Intent::from_parser_output(
            r#"{"intent_type":"upcoming_quizzes","filters":[],"confidence":"high"}"#,
        );
        assert_eq!(intent.category(), IntentCategory::UpcomingQuizzes);
        assert!(intent.filters().is_empty());
        assert!((intent.confidence() - DEFAULT_PARSER_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn non_object_json_degrades_to_general() {
        let intent = Intent::from_parser_output(r#"["homework_status"]"#);
        assert_eq!(intent.category(), IntentCategory::General);
        assert!((intent.confidence() - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Intent::new(IntentCategory::General).with_confidence(4.0).confidence(), 1.0);
        assert_eq!(Intent::new(IntentCategory::General).with_confidence(-1.0).confidence(), 0.0);
        assert_eq!(
            Intent::new(IntentCategory::General).with_confidence(f64::NAN).confidence(),
            0.0
        );
    }
}
