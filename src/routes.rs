use chrono::{Local, NaiveDate};
use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use serde_json::json;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::db::{
    create_student, delete_attendance, delete_student, delete_student_by_name,
    get_all_students, get_attendance_by_date, get_attendance_summary, mark_attendance,
};
use crate::error::AppError;

/// A missing, blank, or unparseable date parameter falls back to today's
/// date in the server's local time zone.
fn resolve_date(param: Option<&str>) -> NaiveDate {
    param
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| Local::now().date_naive())
}

fn flash_context(flash: Option<FlashMessage<'_>>) -> Option<serde_json::Value> {
    flash.map(|f| json!({ "kind": f.kind(), "message": f.message() }))
}

fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|field_errors| field_errors.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid input".to_string())
}

#[get("/?<date>")]
pub async fn index(
    date: Option<String>,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let selected_date = resolve_date(date.as_deref());
    let students = get_all_students(db).await?;

    Ok(Template::render(
        "index",
        context! {
            title: "Roll Call",
            students: students,
            selected_date: selected_date.to_string(),
            today: Local::now().date_naive().to_string(),
            flash: flash_context(flash),
        },
    ))
}

#[derive(FromForm, Validate)]
pub struct AddStudentForm {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(length(min = 1, message = "Roll number is required"))]
    roll_no: String,
}

#[post("/add_student", data = "<form>")]
pub async fn add_student(
    form: Form<AddStudentForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    let home = || Redirect::to(uri!(index(date = _)));

    if let Err(errors) = form.validate() {
        return Ok(Flash::error(home(), first_validation_message(&errors)));
    }

    let name = form.name.trim();
    let roll_no = form.roll_no.trim();

    match create_student(db, name, roll_no).await {
        Ok(_) => Ok(Flash::success(home(), format!("Registered {}", name))),
        Err(AppError::Conflict(msg)) => Ok(Flash::error(home(), msg)),
        Err(e) => Err(e),
    }
}

#[get("/mark_attendance/<student_id>/<status>?<date>")]
pub async fn mark_attendance_route(
    student_id: i64,
    status: &str,
    date: Option<String>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    let selected_date = resolve_date(date.as_deref());
    let home = || Redirect::to(uri!(index(date = Some(selected_date.to_string()))));

    match mark_attendance(db, student_id, selected_date, status).await {
        Ok(()) => Ok(Flash::success(
            home(),
            format!("Marked {} on {}", status, selected_date),
        )),
        Err(AppError::Validation(msg)) | Err(AppError::NotFound(msg)) => {
            Ok(Flash::error(home(), msg))
        }
        Err(e) => Err(e),
    }
}

#[get("/delete_student/<student_id>")]
pub async fn delete_student_route(
    student_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    delete_student(db, student_id).await?;
    Ok(Redirect::to(uri!(index(date = _))))
}

#[get("/delete_attendance/<student_id>/<date>")]
pub async fn delete_attendance_route(
    student_id: i64,
    date: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        delete_attendance(db, student_id, parsed).await?;
    }

    Ok(Redirect::to(uri!(attendance(date = Some(date)))))
}

#[get("/attendance?<date>")]
pub async fn attendance(
    date: Option<String>,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let selected_date = resolve_date(date.as_deref());
    let records = get_attendance_by_date(db, selected_date).await?;

    Ok(Template::render(
        "attendance",
        context! {
            title: "Daily Roll",
            records: records,
            selected_date: selected_date.to_string(),
            flash: flash_context(flash),
        },
    ))
}

#[get("/summary")]
pub async fn summary(
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let summary = get_attendance_summary(db).await?;

    Ok(Template::render(
        "summary",
        context! {
            title: "Attendance Summary",
            summary: summary,
            flash: flash_context(flash),
        },
    ))
}

#[get("/delete")]
pub async fn delete_page(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "delete",
        context! {
            title: "Remove Student",
            flash: flash_context(flash),
        },
    )
}

#[derive(FromForm, Validate)]
pub struct DeleteByNameForm {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
}

#[post("/delete", data = "<form>")]
pub async fn delete_by_name(
    form: Form<DeleteByNameForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    if let Err(errors) = form.validate() {
        return Ok(Flash::error(
            Redirect::to(uri!(delete_page)),
            first_validation_message(&errors),
        ));
    }

    let name = form.name.trim();

    match delete_student_by_name(db, name).await {
        Ok(student) => Ok(Flash::success(
            Redirect::to(uri!(index(date = _))),
            format!("Deleted student '{}'", student.name),
        )),
        Err(AppError::NotFound(msg)) | Err(AppError::Validation(msg)) => {
            Ok(Flash::error(Redirect::to(uri!(delete_page)), msg))
        }
        Err(e) => Err(e),
    }
}

#[get("/health")]
pub async fn health() -> &'static str {
    "OK"
}
