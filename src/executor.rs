use chrono::NaiveDate;

use crate::error::QueryResult;
use crate::intent::{Intent, IntentCategory};
use crate::scope::{apply_scope, AccessScope};
use crate::store::RecordStore;
use crate::table::{Table, Value};
use crate::window::{self, DateWindow};

pub const HOMEWORK_COLUMNS: [&str; 6] = [
    "Student Name",
    "Class",
    "Assignment",
    "Status",
    "Due Date",
    "Submission Date",
];

pub const PERFORMANCE_COLUMNS: [&str; 7] = [
    "Student Name",
    "Class",
    "Quiz",
    "Score",
    "Max Score",
    "Percentage",
    "Date",
];

pub const QUIZ_COLUMNS: [&str; 4] = ["Quiz Name", "Scheduled Date", "Grade", "Class"];

pub const GENERAL_COLUMNS: [&str; 4] = ["Student Name", "Grade", "Class", "Region"];

/// Output columns a presentation layer can rely on for each category.
pub fn output_columns(category: IntentCategory) -> &'static [&'static str] {
    match category {
        IntentCategory::HomeworkStatus => &HOMEWORK_COLUMNS,
        IntentCategory::Performance => &PERFORMANCE_COLUMNS,
        IntentCategory::UpcomingQuizzes => &QUIZ_COLUMNS,
        IntentCategory::General => &GENERAL_COLUMNS,
    }
}

fn empty_result(category: IntentCategory) -> Table {
    Table::empty(output_columns(category).iter().copied())
}

pub struct QueryExecutor<S> {
    store: S,
}

impl<S: RecordStore> QueryExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn execute(&self, intent: Intent, scope: &AccessScope) -> QueryResult<Table> {
        self.execute_at(intent, scope, window::today())
    }

    /// Runs `intent` as if the current day were `today`.
    pub fn execute_at(
        &self,
        intent: Intent,
        scope: &AccessScope,
        today: NaiveDate,
    ) -> QueryResult<Table> {
        let result = match intent.category() {
            IntentCategory::HomeworkStatus => self.homework_status(&intent, scope)?,
            IntentCategory::Performance => self.performance(&intent, scope, today)?,
            IntentCategory::UpcomingQuizzes => self.upcoming_quizzes(&intent, scope, today)?,
            IntentCategory::General => self.general(scope)?,
        };

        tracing::debug!(
            category = %intent.category(),
            confidence = intent.confidence(),
            scope_id = scope.id(),
            rows = result.len(),
            "executed scoped query"
        );
        Ok(result)
    }

    fn homework_status(&self, intent: &Intent, scope: &AccessScope) -> QueryResult<Table> {
        let category = IntentCategory::HomeworkStatus;
        let mut homework = apply_scope(&self.store.homework(None)?, scope)?;
        if homework.is_empty() {
            return Ok(empty_result(category));
        }

        if let Some(status) = intent.filter("status") {
            homework = homework.filter_column("submission_status", |value| {
                value.key_text().is_some_and(|text| status.contains(&text))
            });
        }

        let students = apply_scope(&self.store.students(None)?, scope)?;
        if homework.is_empty() || students.is_empty() {
            return Ok(empty_result(category));
        }

        Ok(homework.left_join(&students, "student_id", &["name"]).select(&[
            ("name", HOMEWORK_COLUMNS[0]),
            ("class", HOMEWORK_COLUMNS[1]),
            ("assignment_name", HOMEWORK_COLUMNS[2]),
            ("submission_status", HOMEWORK_COLUMNS[3]),
            ("due_date", HOMEWORK_COLUMNS[4]),
            ("submission_date", HOMEWORK_COLUMNS[5]),
        ]))
    }

    fn performance(
        &self,
        intent: &Intent,
        scope: &AccessScope,
        today: NaiveDate,
    ) -> QueryResult<Table> {
        let category = IntentCategory::Performance;
        let mut performance = apply_scope(&self.store.performance(None)?, scope)?;
        if performance.is_empty() {
            return Ok(empty_result(category));
        }

        if let Some(range) = intent.filter("date_range") {
            let window = window::lookback_window(&range.phrase(), today);
            performance = within_window(&performance, "date", window);
        }

        let students = apply_scope(&self.store.students(None)?, scope)?;
        let quizzes = apply_scope(&self.store.quizzes(None)?, scope)?;
        if performance.is_empty() || students.is_empty() || quizzes.is_empty() {
            return Ok(empty_result(category));
        }

        Ok(performance
            .left_join(&students, "student_id", &["name"])
            .left_join(&quizzes, "quiz_id", &["quiz_name"])
            .with_column("percentage", |row| {
                percentage(row.get("score"), row.get("max_score"))
            })
            .select(&[
                ("name", PERFORMANCE_COLUMNS[0]),
                ("class", PERFORMANCE_COLUMNS[1]),
                ("quiz_name", PERFORMANCE_COLUMNS[2]),
                ("score", PERFORMANCE_COLUMNS[3]),
                ("max_score", PERFORMANCE_COLUMNS[4]),
                ("percentage", PERFORMANCE_COLUMNS[5]),
                ("date", PERFORMANCE_COLUMNS[6]),
            ]))
    }

    fn upcoming_quizzes(
        &self,
        intent: &Intent,
        scope: &AccessScope,
        today: NaiveDate,
    ) -> QueryResult<Table> {
        let category = IntentCategory::UpcomingQuizzes;
        let quizzes = apply_scope(&self.store.quizzes(None)?, scope)?;
        if quizzes.is_empty() {
            return Ok(empty_result(category));
        }

        let phrase = intent.filter("date_range").map(|range| range.phrase());
        let window = window::upcoming_window(phrase.as_deref(), today);

        Ok(within_window(&quizzes, "scheduled_date", window)
            .select(&[
                ("quiz_name", QUIZ_COLUMNS[0]),
                ("scheduled_date", QUIZ_COLUMNS[1]),
                ("grade", QUIZ_COLUMNS[2]),
                ("class", QUIZ_COLUMNS[3]),
            ])
            .sorted_by(QUIZ_COLUMNS[1]))
    }

    fn general(&self, scope: &AccessScope) -> QueryResult<Table> {
        let students = apply_scope(&self.store.students(None)?, scope)?;
        if students.is_empty() {
            return Ok(empty_result(IntentCategory::General));
        }

        Ok(students.select(&[
            ("name", GENERAL_COLUMNS[0]),
            ("grade", GENERAL_COLUMNS[1]),
            ("class", GENERAL_COLUMNS[2]),
            ("region", GENERAL_COLUMNS[3]),
        ]))
    }
}

/// Rows whose `column` date falls inside `window`. Undated rows only survive
/// an unbounded window.
fn within_window(table: &Table, column: &str, window: DateWindow) -> Table {
    if window.is_unbounded() {
        return table.clone();
    }
    table.filter_column(column, |value| {
        value.as_date().is_some_and(|date| window.contains(date))
    })
}

/// `score / max_score * 100` rounded to two places. A zero or missing maximum
/// yields null.
fn percentage(score: Option<&Value>, max_score: Option<&Value>) -> Value {
    let (Some(score), Some(max_score)) = (
        score.and_then(Value::as_f64),
        max_score.and_then(Value::as_f64),
    ) else {
        return Value::Null;
    };

    let ratio = score / max_score * 100.0;
    if ratio.is_finite() {
        Value::Float((ratio * 100.0).round_ties_even() / 100.0)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(
            percentage(Some(&Value::Float(45.0)), Some(&Value::Float(90.0))),
            Value::Float(50.0)
        );
        assert_eq!(
            percentage(Some(&Value::Int(2)), Some(&Value::Int(3))),
            Value::Float(66.67)
        );
        assert_eq!(
            percentage(Some(&Value::Float(1.0)), Some(&Value::Float(32.0))),
            Value::Float(3.12)
        );
    }

    #[test]
    fn percentage_of_zero_maximum_is_null() {
        assert_eq!(
            percentage(Some(&Value::Float(5.0)), Some(&Value::Float(0.0))),
            Value::Null
        );
        assert_eq!(percentage(None, Some(&Value::Float(10.0))), Value::Null);
    }

    #[test]
    fn output_columns_are_fixed_per_category() {
        for category in IntentCategory::ALL {
            let empty = empty_result(category);
            assert!(empty.is_empty());
            assert_eq!(empty.columns(), output_columns(category));
        }
    }
}
