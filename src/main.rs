#[macro_use]
extern crate rocket;

mod db;
mod env;
mod error;
mod migrations;
mod models;
mod routes;
mod schema;
mod telemetry;
#[cfg(test)]
mod test;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{
    add_student, attendance, delete_attendance_route, delete_by_name, delete_page,
    delete_student_route, health, index, mark_attendance_route, summary,
};
use std::str::FromStr;
use telemetry::{TelemetryFairing, init_tracing};

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::{error, info};

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:attendance.db".to_string());

    // Cascade delete depends on foreign-key enforcement being on for every
    // pooled connection.
    let options = SqliteConnectOptions::from_str(&database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    // `migrate_database`'s future borrows sqlx executors (`&Pool`, `&mut
    // SqliteConnection`) in a way that a known rustc higher-ranked-lifetime
    // limitation cannot prove `Send`. `#[launch]` requires the launch future to
    // be `Send`, so the migration is driven to completion on a dedicated
    // current-thread runtime before the server is built. Same shared pool, same
    // ordering (migrate before serving), same panic-on-failure behavior.
    let migrate_pool = pool.clone();
    let migrate_result = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build migration runtime");
        rt.block_on(migrations::migrate_database(
            &migrate_pool,
            schema::CURRENT_SCHEMA,
        ))
    })
    .join()
    .expect("Migration thread panicked");
    match migrate_result {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting roll-call");

    rocket::build()
        .manage(pool)
        .mount(
            "/",
            routes![
                index,
                add_student,
                mark_attendance_route,
                delete_student_route,
                delete_attendance_route,
                attendance,
                summary,
                delete_page,
                delete_by_name,
                health,
            ],
        )
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
