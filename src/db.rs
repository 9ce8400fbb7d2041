use chrono::{Local, NaiveDate};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    AttendanceEntry, AttendanceRow, DbAttendanceEntry, DbAttendanceRow, DbStudent, DbSummaryRow,
    Student, StudentSummary,
};

#[instrument(skip(pool))]
pub async fn create_student(
    pool: &Pool<Sqlite>,
    name: &str,
    roll_no: &str,
) -> Result<i64, AppError> {
    info!("Registering student");

    let res = sqlx::query("INSERT INTO students (name, roll_no) VALUES (?, ?)")
        .bind(name)
        .bind(roll_no)
        .execute(pool)
        .await;

    match res {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            AppError::Conflict(format!("Roll number '{}' already exists", roll_no)),
        ),
        Err(e) => Err(AppError::Database(e)),
    }
}

#[instrument(skip(pool))]
pub async fn get_all_students(pool: &Pool<Sqlite>) -> Result<Vec<Student>, AppError> {
    info!("Fetching all students");

    let rows = sqlx::query_as::<_, DbStudent>(
        "SELECT id, name, roll_no
         FROM students
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

/// Deleting an id with no matching row is a silent no-op. Attendance rows
/// referencing the student are removed by the cascade.
#[instrument(skip(pool))]
pub async fn delete_student(pool: &Pool<Sqlite>, student_id: i64) -> Result<(), AppError> {
    info!("Deleting student");

    sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(student_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn find_students_by_name(
    pool: &Pool<Sqlite>,
    name: &str,
) -> Result<Vec<Student>, AppError> {
    info!("Looking up students by name");

    let rows = sqlx::query_as::<_, DbStudent>(
        "SELECT id, name, roll_no
         FROM students
         WHERE LOWER(name) = LOWER(?)",
    )
    .bind(name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

/// Case-insensitive exact match on the trimmed name. An ambiguous name (more
/// than one student) is rejected rather than guessing which row to delete.
#[instrument(skip(pool))]
pub async fn delete_student_by_name(pool: &Pool<Sqlite>, name: &str) -> Result<Student, AppError> {
    info!("Deleting student by name");

    let mut matches = find_students_by_name(pool, name).await?;

    match matches.len() {
        0 => Err(AppError::NotFound(format!(
            "No student found with name '{}'",
            name
        ))),
        1 => {
            let student = matches.remove(0);
            delete_student(pool, student.id).await?;
            Ok(student)
        }
        n => Err(AppError::Validation(format!(
            "{} students share the name '{}'; delete by roll number from the roster instead",
            n, name
        ))),
    }
}

/// Upsert keyed on (student_id, date): a repeated mark for the same student
/// and day overwrites the stored status. Marks dated after today in the
/// server's local time zone are rejected before touching the database.
#[instrument(skip(pool))]
pub async fn mark_attendance(
    pool: &Pool<Sqlite>,
    student_id: i64,
    date: NaiveDate,
    status: &str,
) -> Result<(), AppError> {
    info!("Marking attendance");

    let today = Local::now().date_naive();
    if date > today {
        return Err(AppError::Validation(format!(
            "Cannot mark attendance for future date {}",
            date
        )));
    }

    let res = sqlx::query(
        "INSERT INTO attendance (student_id, date, status)
         VALUES (?, ?, ?)
         ON CONFLICT (student_id, date)
         DO UPDATE SET status = excluded.status",
    )
    .bind(student_id)
    .bind(date)
    .bind(status)
    .execute(pool)
    .await;

    match res {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => Err(
            AppError::NotFound(format!("Student with id {} not found", student_id)),
        ),
        Err(e) => Err(AppError::Database(e)),
    }
}

/// Silent no-op when no record exists for the pair.
#[instrument(skip(pool))]
pub async fn delete_attendance(
    pool: &Pool<Sqlite>,
    student_id: i64,
    date: NaiveDate,
) -> Result<(), AppError> {
    info!("Deleting attendance record");

    sqlx::query("DELETE FROM attendance WHERE student_id = ? AND date = ?")
        .bind(student_id)
        .bind(date)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_attendance_by_date(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
) -> Result<Vec<AttendanceRow>, AppError> {
    info!("Fetching attendance roll for date");

    let rows = sqlx::query_as::<_, DbAttendanceRow>(
        "SELECT students.id AS student_id, students.name, students.roll_no,
                attendance.date, attendance.status
         FROM attendance
         JOIN students ON attendance.student_id = students.id
         WHERE attendance.date = ?
         ORDER BY students.name",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendanceRow::from).collect())
}

/// Totals come from a LEFT JOIN so students with no marks still appear with
/// zero counts; each student's history is fetched newest first.
#[instrument(skip(pool))]
pub async fn get_attendance_summary(
    pool: &Pool<Sqlite>,
) -> Result<Vec<StudentSummary>, AppError> {
    info!("Computing attendance summary");

    let rows = sqlx::query_as::<_, DbSummaryRow>(
        "SELECT students.id, students.name, students.roll_no,
                COUNT(attendance.id) AS total_days,
                COALESCE(SUM(CASE WHEN attendance.status = 'present' THEN 1 ELSE 0 END), 0)
                    AS present_days
         FROM students
         LEFT JOIN attendance ON students.id = attendance.student_id
         GROUP BY students.id
         ORDER BY students.name",
    )
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id.unwrap_or_default();
        let history = get_student_history(pool, id).await?;

        summaries.push(StudentSummary {
            id,
            name: row.name.unwrap_or_default(),
            roll_no: row.roll_no.unwrap_or_default(),
            total_days: row.total_days.unwrap_or_default(),
            present_days: row.present_days.unwrap_or_default(),
            attendance: history,
        });
    }

    Ok(summaries)
}

#[instrument(skip(pool))]
pub async fn get_student_history(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<AttendanceEntry>, AppError> {
    let rows = sqlx::query_as::<_, DbAttendanceEntry>(
        "SELECT date, status
         FROM attendance
         WHERE student_id = ?
         ORDER BY date DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendanceEntry::from).collect())
}
