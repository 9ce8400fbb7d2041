use chrono::{Local, NaiveDate};
use serde::Serialize;

#[derive(Serialize, Debug, Clone)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub roll_no: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStudent {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub roll_no: Option<String>,
}

impl From<DbStudent> for Student {
    fn from(student: DbStudent) -> Self {
        Self {
            id: student.id.unwrap_or_default(),
            name: student.name.unwrap_or_default(),
            roll_no: student.roll_no.unwrap_or_default(),
        }
    }
}

/// One row of the per-date roll: an attendance record joined with its student.
#[derive(Serialize, Debug, Clone)]
pub struct AttendanceRow {
    pub student_id: i64,
    pub name: String,
    pub roll_no: String,
    pub date: NaiveDate,
    pub status: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceRow {
    pub student_id: Option<i64>,
    pub name: Option<String>,
    pub roll_no: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl From<DbAttendanceRow> for AttendanceRow {
    fn from(row: DbAttendanceRow) -> Self {
        Self {
            student_id: row.student_id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            roll_no: row.roll_no.unwrap_or_default(),
            date: row.date.unwrap_or_else(|| Local::now().date_naive()),
            status: row.status.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct AttendanceEntry {
    pub date: NaiveDate,
    pub status: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceEntry {
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl From<DbAttendanceEntry> for AttendanceEntry {
    fn from(entry: DbAttendanceEntry) -> Self {
        Self {
            date: entry.date.unwrap_or_else(|| Local::now().date_naive()),
            status: entry.status.unwrap_or_default(),
        }
    }
}

/// Cumulative totals for one student plus their full mark history,
/// newest first. Students with no marks report zero totals.
#[derive(Serialize, Debug, Clone)]
pub struct StudentSummary {
    pub id: i64,
    pub name: String,
    pub roll_no: String,
    pub total_days: i64,
    pub present_days: i64,
    pub attendance: Vec<AttendanceEntry>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSummaryRow {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub roll_no: Option<String>,
    pub total_days: Option<i64>,
    pub present_days: Option<i64>,
}
