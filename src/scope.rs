use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ScopeConfigError;
use crate::intent::FilterValue;
use crate::table::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Grade,
    Class,
    Region,
}

impl ScopeKind {
    /// The record column a scope of this kind restricts.
    pub fn column(&self) -> &'static str {
        match self {
            ScopeKind::Grade => "grade",
            ScopeKind::Class => "class",
            ScopeKind::Region => "region",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ScopeKind::Grade => "Grade",
            ScopeKind::Class => "Class",
            ScopeKind::Region => "Region",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = ScopeConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grade" => Ok(ScopeKind::Grade),
            "class" => Ok(ScopeKind::Class),
            "region" => Ok(ScopeKind::Region),
            other => Err(ScopeConfigError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The data an administrator may view. Immutable once built; the value set is
/// never empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAccessScope")]
pub struct AccessScope {
    id: String,
    display_name: String,
    kind: ScopeKind,
    values: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawAccessScope {
    admin_id: String,
    name: String,
    scope_type: String,
    scope_values: Vec<serde_json::Value>,
}

impl TryFrom<RawAccessScope> for AccessScope {
    type Error = ScopeConfigError;

    fn try_from(raw: RawAccessScope) -> Result<Self, Self::Error> {
        let kind = raw.scope_type.parse()?;
        let values = raw.scope_values.iter().map(|value| match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        AccessScope::new(raw.admin_id, raw.name, kind, values)
    }
}

impl AccessScope {
    pub fn new<I, S>(
        id: impl Into<String>,
        display_name: impl Into<String>,
        kind: ScopeKind,
        values: I,
    ) -> Result<Self, ScopeConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ScopeConfigError::EmptyValues { scope_id: id });
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            kind,
            values,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    pub fn permits(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Scope values as integers, for GRADE scopes.
    pub fn grade_values(&self) -> Result<BTreeSet<i64>, ScopeConfigError> {
        self.values
            .iter()
            .map(|value| {
                value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ScopeConfigError::NonNumericScopeValue(value.clone()))
            })
            .collect()
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        write!(
            f,
            "{} (Scope: {} - {})",
            self.display_name,
            self.kind.title(),
            values.join(", ")
        )
    }
}

/// Returns the rows of `table` whose scope column holds a permitted value.
///
/// Fails closed: a table without the scope column yields an empty table with
/// the same columns. Run it on every fetched table before any join, since a
/// join does not restrict the unscoped side. Grade scopes compare as integers; a non-integer scope value or
/// grade cell is a configuration error. Null cells are never permitted.
pub fn apply_scope(table: &Table, scope: &AccessScope) -> Result<Table, ScopeConfigError> {
    if table.is_empty() {
        return Ok(table.empty_like());
    }

    let column = scope.kind().column();
    let Some(index) = table.column_index(column) else {
        tracing::warn!(
            scope_id = scope.id(),
            scope_kind = %scope.kind(),
            columns = ?table.columns(),
            "table has no scope column; denying all rows"
        );
        return Ok(table.empty_like());
    };

    match scope.kind() {
        ScopeKind::Grade => {
            let permitted = scope.grade_values()?;
            table.try_filter_rows(|row| {
                Ok(grade_of(&row.values()[index])?.is_some_and(|grade| permitted.contains(&grade)))
            })
        }
        ScopeKind::Class | ScopeKind::Region => Ok(table.filter_rows(|row| {
            row.values()[index]
                .key_text()
                .is_some_and(|value| scope.permits(&value))
        })),
    }
}

fn grade_of(value: &Value) -> Result<Option<i64>, ScopeConfigError> {
    match value {
        Value::Null => Ok(None),
        Value::Int(grade) => Ok(Some(*grade)),
        Value::Float(grade) if grade.fract() == 0.0 && grade.is_finite() => Ok(Some(*grade as i64)),
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ScopeConfigError::NonNumericColumnValue(text.clone())),
        other => Err(ScopeConfigError::NonNumericColumnValue(other.to_string())),
    }
}

/// Pre-flight check of explicitly requested parameters against a scope.
///
/// When the request does not name the scope's kind there is nothing to check
/// here and row-level filtering decides. Otherwise every requested value must
/// be one of the scope's values.
pub fn validate_access(requested: &BTreeMap<String, FilterValue>, scope: &AccessScope) -> bool {
    match requested.get(scope.kind().column()) {
        None => true,
        Some(wanted) => wanted.values().into_iter().all(|value| scope.permits(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homework_rows() -> Table {
        let row = |grade: i64, class: &str, region: &str| {
            vec![
                Value::from("S1"),
                Value::Int(grade),
                Value::from(class),
                Value::from(region),
            ]
        };
        Table::from_rows(
            vec![
                "student_id".into(),
                "grade".into(),
                "class".into(),
                "region".into(),
            ],
            vec![
                row(8, "8A", "North"),
                row(8, "8B", "South"),
                row(8, "8A", "North"),
                row(9, "9A", "North"),
                row(9, "9B", "South"),
            ],
        )
        .unwrap()
    }

    fn scope(kind: ScopeKind, values: &[&str]) -> AccessScope {
        AccessScope::new("A1", "Test Admin", kind, values.iter().copied()).unwrap()
    }

    #[test]
    fn grade_scope_keeps_only_permitted_grades() {
        let scoped = apply_scope(&homework_rows(), &scope(ScopeKind::Grade, &["8"])).unwrap();
        assert_eq!(scoped.len(), 3);
        assert!(scoped
            .column_values("grade")
            .unwrap()
            .iter()
            .all(|grade| **grade == Value::Int(8)));
    }

    #[test]
    fn class_and_region_scopes_compare_text() {
        let by_class = apply_scope(&homework_rows(), &scope(ScopeKind::Class, &["8A", "9B"])).unwrap();
        assert_eq!(by_class.len(), 3);

        let by_region = apply_scope(&homework_rows(), &scope(ScopeKind::Region, &["South"])).unwrap();
        assert_eq!(by_region.len(), 2);
    }

    #[test]
    fn missing_scope_column_fails_closed() {
        let table = homework_rows().select(&[("student_id", "student_id"), ("grade", "grade")]);
        let scoped = apply_scope(&table, &scope(ScopeKind::Region, &["North"])).unwrap();
        assert!(scoped.is_empty());
        assert_eq!(scoped.columns(), table.columns());
    }

    #[test]
    fn scoping_is_idempotent() {
        let scope = scope(ScopeKind::Class, &["8A"]);
        let once = apply_scope(&homework_rows(), &scope).unwrap();
        let twice = apply_scope(&once, &scope).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let table = Table::empty(["grade"]);
        let scoped = apply_scope(&table, &scope(ScopeKind::Grade, &["8"])).unwrap();
        assert!(scoped.is_empty());
        assert_eq!(scoped.columns(), table.columns());
    }

    #[test]
    fn non_numeric_grade_scope_is_a_configuration_error() {
        let err = apply_scope(&homework_rows(), &scope(ScopeKind::Grade, &["eight"])).unwrap_err();
        assert_eq!(err, ScopeConfigError::NonNumericScopeValue("eight".into()));
    }

    #[test]
    fn non_numeric_grade_cell_is_a_configuration_error() {
        let table = Table::from_rows(vec!["grade".into()], vec![vec![Value::from("8th")]]).unwrap();
        let err = apply_scope(&table, &scope(ScopeKind::Grade, &["8"])).unwrap_err();
        assert_eq!(err, ScopeConfigError::NonNumericColumnValue("8th".into()));
    }

    #[test]
    fn textual_grade_cells_are_coerced() {
        let table = Table::from_rows(
            vec!["grade".into()],
            vec![vec![Value::from("8")], vec![Value::Null], vec![Value::Int(9)]],
        )
        .unwrap();
        let scoped = apply_scope(&table, &scope(ScopeKind::Grade, &["8"])).unwrap();
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn empty_scope_values_are_rejected() {
        let err = AccessScope::new("A9", "Nobody", ScopeKind::Class, Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err, ScopeConfigError::EmptyValues { scope_id: "A9".into() });
    }

    #[test]
    fn validate_access_checks_only_the_scope_kind() {
        let scope = scope(ScopeKind::Grade, &["8", "9"]);
        let mut requested = BTreeMap::new();
        requested.insert("class".to_string(), FilterValue::one("10A"));
        assert!(validate_access(&requested, &scope));

        requested.insert("grade".to_string(), FilterValue::many(["8", "9"]));
        assert!(validate_access(&requested, &scope));

        requested.insert("grade".to_string(), FilterValue::many(["8", "10"]));
        assert!(!validate_access(&requested, &scope));
    }

    #[test]
    fn deserializes_admin_role_entries() {
        let scope: AccessScope = serde_json::from_str(
            r#"{"admin_id":"A002","name":"Grade Lead","scope_type":"grade","scope_values":[8,"9"]}"#,
        )
        .unwrap();
        assert_eq!(scope.kind(), ScopeKind::Grade);
        assert_eq!(scope.to_string(), "Grade Lead (Scope: Grade - 8, 9)");

        let bad = serde_json::from_str::<AccessScope>(
            r#"{"admin_id":"A003","name":"X","scope_type":"district","scope_values":["1"]}"#,
        );
        assert!(bad.is_err());
    }
}
