use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::StoreError;
use crate::intent::Filters;
use crate::models::SchoolData;
use crate::table::Table;

/// Equality / membership predicates keyed by column name.
pub type RecordFilters = Filters;

pub trait RecordStore {
    fn students(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError>;
    fn homework(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError>;
    fn quizzes(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError>;
    fn performance(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn students(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).students(filters)
    }

    fn homework(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).homework(filters)
    }

    fn quizzes(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).quizzes(filters)
    }

    fn performance(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).performance(filters)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn students(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).students(filters)
    }

    fn homework(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).homework(filters)
    }

    fn quizzes(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).quizzes(filters)
    }

    fn performance(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        (**self).performance(filters)
    }
}

/// Four immutable record tables loaded at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    students: Table,
    homework: Table,
    quizzes: Table,
    performance: Table,
}

impl Snapshot {
    pub fn new(students: Table, homework: Table, quizzes: Table, performance: Table) -> Self {
        Self {
            students,
            homework,
            quizzes,
            performance,
        }
    }

    pub fn from_data(data: SchoolData) -> Self {
        Self {
            students: Table::from_records(data.students),
            homework: Table::from_records(data.homework),
            quizzes: Table::from_records(data.quizzes),
            performance: Table::from_records(data.performance),
        }
    }

    pub fn from_json(raw: &str, origin: &str) -> Result<Self, StoreError> {
        let data: SchoolData = serde_json::from_str(raw).map_err(|err| StoreError::Malformed {
            origin: origin.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::from_data(data))
    }

    fn fetch(table: &Table, filters: Option<&RecordFilters>) -> Table {
        match filters {
            Some(filters) if !filters.is_empty() => table.matching(filters),
            _ => table.clone(),
        }
    }
}

impl RecordStore for Snapshot {
    fn students(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        Ok(Self::fetch(&self.students, filters))
    }

    fn homework(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        Ok(Self::fetch(&self.homework, filters))
    }

    fn quizzes(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        Ok(Self::fetch(&self.quizzes, filters))
    }

    fn performance(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        Ok(Self::fetch(&self.performance, filters))
    }
}

/// Serves records from a JSON document on disk.
///
/// The first fetch loads the file; concurrent first fetches build the snapshot
/// once. A failed load is not remembered, so a later fetch retries the file.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    snapshot: OnceLock<Arc<Snapshot>>,
    load_gate: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: OnceLock::new(),
            load_gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.get().is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(snapshot) = self.snapshot.get() {
            return Ok(Arc::clone(snapshot));
        }

        let _gate = self
            .load_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(snapshot) = self.snapshot.get() {
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = Arc::new(self.load()?);
        let snapshot = self.snapshot.get_or_init(|| snapshot);
        Ok(Arc::clone(snapshot))
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing {
                    path: self.path.clone(),
                }
            } else {
                StoreError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let snapshot = Snapshot::from_json(&raw, &self.path.display().to_string())?;
        tracing::info!(
            path = %self.path.display(),
            students = snapshot.students.len(),
            homework = snapshot.homework.len(),
            quizzes = snapshot.quizzes.len(),
            performance = snapshot.performance.len(),
            "loaded school data snapshot"
        );
        Ok(snapshot)
    }
}

impl RecordStore for JsonRecordStore {
    fn students(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        self.snapshot()?.students(filters)
    }

    fn homework(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        self.snapshot()?.homework(filters)
    }

    fn quizzes(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        self.snapshot()?.quizzes(filters)
    }

    fn performance(&self, filters: Option<&RecordFilters>) -> Result<Table, StoreError> {
        self.snapshot()?.performance(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::FilterValue;
    use std::io::Write;
    use tempfile::tempdir;

    const DATA: &str = r#"{
        "students": [
            {"student_id":"S1","name":"Avery Lee","grade":8,"class":"8A","region":"North"},
            {"student_id":"S2","name":"Jules Moreno","grade":9,"class":"9B","region":"South"}
        ],
        "quizzes": [
            {"quiz_id":"Q1","quiz_name":"Fractions","grade":8,"class":"8A","region":"North","scheduled_date":"2026-03-02"}
        ]
    }"#;

    #[test]
    fn missing_sections_load_as_empty_tables() {
        let snapshot = Snapshot::from_json(DATA, "inline").unwrap();
        assert_eq!(snapshot.students(None).unwrap().len(), 2);
        assert!(snapshot.homework(None).unwrap().is_empty());
        assert!(snapshot.performance(None).unwrap().is_empty());
    }

    #[test]
    fn fetch_applies_equality_and_membership_predicates() {
        let snapshot = Snapshot::from_json(DATA, "inline").unwrap();
        let mut filters = RecordFilters::new();
        filters.insert("grade".into(), FilterValue::one("9"));
        let students = snapshot.students(Some(&filters)).unwrap();
        assert_eq!(students.len(), 1);

        filters.insert("grade".into(), FilterValue::many(["8", "9"]));
        assert_eq!(snapshot.students(Some(&filters)).unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path().join("absent.json"));
        let err = store.students(None).unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
        assert!(!store.is_loaded());
    }

    #[test]
    fn malformed_file_is_reported_and_not_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("school_data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonRecordStore::new(&path);
        assert!(matches!(store.quizzes(None), Err(StoreError::Malformed { .. })));

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(DATA.as_bytes()).unwrap();
        assert_eq!(store.quizzes(None).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_first_access_builds_one_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("school_data.json");
        std::fs::write(&path, DATA).unwrap();
        let store = Arc::new(JsonRecordStore::new(&path));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.snapshot().unwrap())
            })
            .collect();
        let snapshots: Vec<Arc<Snapshot>> =
            handles.into_iter().map(|handle| handle.join().unwrap()).collect();

        assert!(snapshots.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn fetched_tables_do_not_alias_the_snapshot() {
        let snapshot = Snapshot::from_json(DATA, "inline").unwrap();
        let before = snapshot.clone();
        let students = snapshot.students(None).unwrap();
        let _ = students.filter_rows(|_| false);
        assert_eq!(snapshot, before);
    }
}
