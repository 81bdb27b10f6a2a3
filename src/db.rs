use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::{PgPool, Row};

use crate::models::{Homework, PerformanceRecord, Quiz, SchoolData, Student, SubmissionStatus};
use crate::store::Snapshot;
use crate::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordTable {
    Students,
    Homework,
    Quizzes,
    Performance,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let data = sample_data(window::today());
    let mut inserted = 0usize;

    for student in &data.students {
        inserted += insert_student(pool, student).await? as usize;
    }
    for homework in &data.homework {
        inserted += insert_homework(pool, homework).await? as usize;
    }
    for quiz in &data.quizzes {
        inserted += insert_quiz(pool, quiz).await? as usize;
    }
    for record in &data.performance {
        inserted += insert_performance(pool, record).await? as usize;
    }

    Ok(inserted)
}

/// Realistic sample rows spread over two grades, three classes and two
/// regions, dated around `today`.
pub fn sample_data(today: NaiveDate) -> SchoolData {
    let day = |offset: i64| today + Duration::days(offset);
    let student = |id: &str, name: &str, grade: i64, class: &str, region: &str| Student {
        student_id: id.to_string(),
        name: name.to_string(),
        grade,
        class: class.to_string(),
        region: region.to_string(),
    };

    let students = vec![
        student("S001", "Avery Lee", 8, "8A", "North"),
        student("S002", "Jules Moreno", 8, "8A", "North"),
        student("S003", "Kiara Patel", 8, "8B", "South"),
        student("S004", "Noah Brooks", 9, "9A", "North"),
        student("S005", "Maya Chen", 9, "9A", "South"),
    ];

    let homework = students
        .iter()
        .zip([
            SubmissionStatus::Submitted,
            SubmissionStatus::NotSubmitted,
            SubmissionStatus::Pending,
            SubmissionStatus::Submitted,
            SubmissionStatus::NotSubmitted,
        ])
        .map(|(student, status)| Homework {
            student_id: student.student_id.clone(),
            grade: student.grade,
            class: student.class.clone(),
            region: student.region.clone(),
            assignment_name: format!("Math Chapter {}", student.grade - 3),
            submission_status: status,
            due_date: day(-2),
            submission_date: (status == SubmissionStatus::Submitted).then(|| day(-3)),
        })
        .collect();

    let quiz = |id: &str, name: &str, grade: i64, class: &str, region: &str, offset: i64| Quiz {
        quiz_id: id.to_string(),
        quiz_name: name.to_string(),
        grade,
        class: class.to_string(),
        region: region.to_string(),
        scheduled_date: day(offset),
    };

    let quizzes = vec![
        quiz("Q001", "Fractions Check-in", 8, "8A", "North", -6),
        quiz("Q002", "Linear Equations", 8, "8B", "South", 3),
        quiz("Q003", "Cell Biology", 9, "9A", "North", -12),
        quiz("Q004", "World War I Essay Quiz", 9, "9A", "South", 10),
    ];

    let result = |student: &Student, quiz_id: &str, score: f64, offset: i64| PerformanceRecord {
        student_id: student.student_id.clone(),
        quiz_id: quiz_id.to_string(),
        grade: student.grade,
        class: student.class.clone(),
        region: student.region.clone(),
        score,
        max_score: 100.0,
        date: day(offset),
    };

    let performance = vec![
        result(&students[0], "Q001", 88.0, -6),
        result(&students[1], "Q001", 72.5, -6),
        result(&students[3], "Q003", 64.0, -12),
        result(&students[4], "Q003", 91.0, -12),
    ];

    SchoolData {
        students,
        homework,
        quizzes,
        performance,
    }
}

async fn insert_student(pool: &PgPool, student: &Student) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_records.students (student_id, name, grade, class, region)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id) DO UPDATE
        SET name = EXCLUDED.name, grade = EXCLUDED.grade,
            class = EXCLUDED.class, region = EXCLUDED.region
        "#,
    )
    .bind(&student.student_id)
    .bind(&student.name)
    .bind(grade_column(student.grade)?)
    .bind(&student.class)
    .bind(&student.region)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_homework(pool: &PgPool, homework: &Homework) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_records.homework
        (student_id, grade, class, region, assignment_name, submission_status, due_date, submission_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (student_id, assignment_name) DO NOTHING
        "#,
    )
    .bind(&homework.student_id)
    .bind(grade_column(homework.grade)?)
    .bind(&homework.class)
    .bind(&homework.region)
    .bind(&homework.assignment_name)
    .bind(homework.submission_status.as_str())
    .bind(homework.due_date)
    .bind(homework.submission_date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_quiz(pool: &PgPool, quiz: &Quiz) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_records.quizzes
        (quiz_id, quiz_name, grade, class, region, scheduled_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (quiz_id) DO NOTHING
        "#,
    )
    .bind(&quiz.quiz_id)
    .bind(&quiz.quiz_name)
    .bind(grade_column(quiz.grade)?)
    .bind(&quiz.class)
    .bind(&quiz.region)
    .bind(quiz.scheduled_date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_performance(pool: &PgPool, record: &PerformanceRecord) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_records.performance
        (student_id, quiz_id, grade, class, region, score, max_score, date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (student_id, quiz_id) DO NOTHING
        "#,
    )
    .bind(&record.student_id)
    .bind(&record.quiz_id)
    .bind(grade_column(record.grade)?)
    .bind(&record.class)
    .bind(&record.region)
    .bind(record.score)
    .bind(record.max_score)
    .bind(record.date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn grade_column(grade: i64) -> anyhow::Result<i32> {
    i32::try_from(grade).with_context(|| format!("grade {grade} does not fit the grade column"))
}

/// Imports one CSV file whose header matches the record's field names.
/// Rows that already exist are skipped; returns the number inserted.
pub async fn import_csv(
    pool: &PgPool,
    table: RecordTable,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    match table {
        RecordTable::Students => {
            for row in reader.deserialize::<Student>() {
                inserted += insert_student(pool, &row?).await? as usize;
            }
        }
        RecordTable::Homework => {
            for row in reader.deserialize::<Homework>() {
                inserted += insert_homework(pool, &row?).await? as usize;
            }
        }
        RecordTable::Quizzes => {
            for row in reader.deserialize::<Quiz>() {
                inserted += insert_quiz(pool, &row?).await? as usize;
            }
        }
        RecordTable::Performance => {
            for row in reader.deserialize::<PerformanceRecord>() {
                inserted += insert_performance(pool, &row?).await? as usize;
            }
        }
    }

    Ok(inserted)
}

/// Reads all four record tables into one snapshot.
pub async fn load_snapshot(pool: &PgPool) -> anyhow::Result<Snapshot> {
    let mut data = SchoolData::default();

    let rows = sqlx::query(
        "SELECT student_id, name, grade, class, region \
         FROM school_records.students ORDER BY student_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        data.students.push(Student {
            student_id: row.get("student_id"),
            name: row.get("name"),
            grade: i64::from(row.get::<i32, _>("grade")),
            class: row.get("class"),
            region: row.get("region"),
        });
    }

    let rows = sqlx::query(
        "SELECT student_id, grade, class, region, assignment_name, submission_status, \
         due_date, submission_date \
         FROM school_records.homework ORDER BY due_date, student_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        let status: String = row.get("submission_status");
        data.homework.push(Homework {
            student_id: row.get("student_id"),
            grade: i64::from(row.get::<i32, _>("grade")),
            class: row.get("class"),
            region: row.get("region"),
            assignment_name: row.get("assignment_name"),
            submission_status: status.parse().map_err(anyhow::Error::msg)?,
            due_date: row.get("due_date"),
            submission_date: row.get("submission_date"),
        });
    }

    let rows = sqlx::query(
        "SELECT quiz_id, quiz_name, grade, class, region, scheduled_date \
         FROM school_records.quizzes ORDER BY scheduled_date, quiz_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        data.quizzes.push(Quiz {
            quiz_id: row.get("quiz_id"),
            quiz_name: row.get("quiz_name"),
            grade: i64::from(row.get::<i32, _>("grade")),
            class: row.get("class"),
            region: row.get("region"),
            scheduled_date: row.get("scheduled_date"),
        });
    }

    let rows = sqlx::query(
        "SELECT student_id, quiz_id, grade, class, region, score, max_score, date \
         FROM school_records.performance ORDER BY date, student_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        data.performance.push(PerformanceRecord {
            student_id: row.get("student_id"),
            quiz_id: row.get("quiz_id"),
            grade: i64::from(row.get::<i32, _>("grade")),
            class: row.get("class"),
            region: row.get("region"),
            score: row.get("score"),
            max_score: row.get("max_score"),
            date: row.get("date"),
        });
    }

    tracing::info!(
        students = data.students.len(),
        homework = data.homework.len(),
        quizzes = data.quizzes.len(),
        performance = data.performance.len(),
        "loaded school data snapshot from postgres"
    );
    Ok(Snapshot::from_data(data))
}
