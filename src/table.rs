use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;

use crate::error::TableError;
use crate::intent::FilterValue;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Textual form used for equality predicates and join keys. Null has none.
    pub fn key_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(Cow::Borrowed(text.as_str())),
            Value::Int(value) => Some(Cow::Owned(value.to_string())),
            Value::Float(value) => Some(Cow::Owned(value.to_string())),
            Value::Date(date) => Some(Cow::Owned(date.format(DATE_FORMAT).to_string())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Date(_) => 1,
            Value::Text(_) => 2,
            Value::Null => 3,
        }
    }

    /// Ascending order with nulls last. Mixed kinds order by kind.
    pub fn cmp_ascending(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (a, b) if a.rank() == 0 && b.rank() == 0 => {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(text) => f.write_str(text),
            Value::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A typed record that can be laid out as a table row.
pub trait Record {
    const COLUMNS: &'static [&'static str];

    fn into_row(self) -> Vec<Value>;
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|index| &self.values[index])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given column set.
    pub fn empty<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RowWidth {
                    row: index,
                    expected: columns.len(),
                    got: row.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn from_records<R, I>(records: I) -> Self
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        Self {
            columns: R::COLUMNS.iter().map(|name| name.to_string()).collect(),
            rows: records.into_iter().map(Record::into_row).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Same column set, no rows.
    pub fn empty_like(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        let rows = self
            .rows()
            .filter(|row| keep(row))
            .map(|row| row.values.to_vec())
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn try_filter_rows<F, E>(&self, mut keep: F) -> Result<Table, E>
    where
        F: FnMut(&Row<'_>) -> Result<bool, E>,
    {
        let mut rows = Vec::new();
        for row in self.rows() {
            if keep(&row)? {
                rows.push(row.values.to_vec());
            }
        }
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Keeps rows whose value in `column` satisfies `keep`. A table without the
    /// column yields no rows.
    pub fn filter_column<F>(&self, column: &str, mut keep: F) -> Table
    where
        F: FnMut(&Value) -> bool,
    {
        let Some(index) = self.column_index(column) else {
            return self.empty_like();
        };
        self.filter_rows(|row| keep(&row.values[index]))
    }

    /// Equality / membership predicates keyed by column. Keys naming columns
    /// the table does not have are ignored.
    pub fn matching(&self, filters: &BTreeMap<String, FilterValue>) -> Table {
        let predicates: Vec<(usize, &FilterValue)> = filters
            .iter()
            .filter_map(|(column, wanted)| Some((self.column_index(column)?, wanted)))
            .collect();

        if predicates.is_empty() {
            return self.clone();
        }

        self.filter_rows(|row| {
            predicates.iter().all(|(index, wanted)| {
                row.values[*index]
                    .key_text()
                    .is_some_and(|text| wanted.contains(&text))
            })
        })
    }

    /// Left join on `key`, appending the `take` columns of `right`. Left row
    /// order is preserved; a left row yields one row per matching right row,
    /// or a single row of nulls when nothing matches. `take` columns the left
    /// side already has are not appended again.
    pub fn left_join(&self, right: &Table, key: &str, take: &[&str]) -> Table {
        let take: Vec<&str> = take
            .iter()
            .copied()
            .filter(|column| !self.has_column(column))
            .collect();
        let take_indexes: Vec<Option<usize>> =
            take.iter().map(|column| right.column_index(column)).collect();

        let mut index: HashMap<Cow<'_, str>, Vec<usize>> = HashMap::new();
        if let Some(right_key) = right.column_index(key) {
            for (position, row) in right.rows.iter().enumerate() {
                if let Some(text) = row[right_key].key_text() {
                    index.entry(text).or_default().push(position);
                }
            }
        }

        let left_key = self.column_index(key);
        let mut columns = self.columns.clone();
        columns.extend(take.iter().map(|column| column.to_string()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for left in &self.rows {
            let matches = left_key
                .and_then(|position| left[position].key_text())
                .and_then(|text| index.get(text.as_ref()));

            match matches {
                Some(positions) => {
                    for &position in positions {
                        let mut row = left.clone();
                        row.extend(take_indexes.iter().map(|source| {
                            source.map_or(Value::Null, |i| right.rows[position][i].clone())
                        }));
                        rows.push(row);
                    }
                }
                None => {
                    let mut row = left.clone();
                    row.extend(take.iter().map(|_| Value::Null));
                    rows.push(row);
                }
            }
        }

        Table { columns, rows }
    }

    /// Projects `(source, target)` pairs in order, renaming as it goes. A
    /// missing source column projects as nulls.
    pub fn select(&self, mapping: &[(&str, &str)]) -> Table {
        let sources: Vec<Option<usize>> = mapping
            .iter()
            .map(|(source, _)| self.column_index(source))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|source| source.map_or(Value::Null, |i| row[i].clone()))
                    .collect()
            })
            .collect();

        Table {
            columns: mapping.iter().map(|(_, target)| target.to_string()).collect(),
            rows,
        }
    }

    /// Adds (or replaces) a column computed from each row.
    pub fn with_column<F>(&self, column: &str, mut derive: F) -> Table
    where
        F: FnMut(&Row<'_>) -> Value,
    {
        let existing = self.column_index(column);
        let mut columns = self.columns.clone();
        if existing.is_none() {
            columns.push(column.to_string());
        }

        let rows = self
            .rows()
            .map(|row| {
                let value = derive(&row);
                let mut values = row.values.to_vec();
                match existing {
                    Some(index) => values[index] = value,
                    None => values.push(value),
                }
                values
            })
            .collect();

        Table { columns, rows }
    }

    /// Stable ascending sort on one column, nulls last.
    pub fn sorted_by(&self, column: &str) -> Table {
        let mut sorted = self.clone();
        if let Some(index) = self.column_index(column) {
            sorted
                .rows
                .sort_by(|a, b| a[index].cmp_ascending(&b[index]));
        }
        sorted
    }
}
