#[cfg(test)]
pub mod test_db {
    use crate::db::{create_student, mark_attendance};
    use crate::error::AppError;
    use crate::migrations::migrate_database;
    use crate::schema::CURRENT_SCHEMA;
    use chrono::NaiveDate;
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();

    #[derive(Default)]
    pub struct TestDbBuilder {
        students: Vec<TestStudent>,
        marks: Vec<TestMark>,
    }

    pub struct TestStudent {
        pub name: String,
        pub roll_no: String,
    }

    pub struct TestMark {
        pub roll_no: String,
        pub date: NaiveDate,
        pub status: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn student(mut self, name: &str, roll_no: &str) -> Self {
            self.students.push(TestStudent {
                name: name.to_string(),
                roll_no: roll_no.to_string(),
            });
            self
        }

        pub fn mark(mut self, roll_no: &str, date: &str, status: &str) -> Self {
            self.marks.push(TestMark {
                roll_no: roll_no.to_string(),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("Invalid test date"),
                status: status.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            let pool = setup_test_pool().await;

            let mut student_id_map: HashMap<String, i64> = HashMap::new();

            for student in &self.students {
                let id = create_student(&pool, &student.name, &student.roll_no).await?;
                student_id_map.insert(student.roll_no.clone(), id);
            }

            for mark in &self.marks {
                let student_id = student_id_map.get(&mark.roll_no).copied().ok_or_else(|| {
                    AppError::Internal(format!("Unknown roll number {}", mark.roll_no))
                })?;

                mark_attendance(&pool, student_id, mark.date, &mark.status).await?;
            }

            Ok(TestDb {
                pool,
                student_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub student_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn student_id(&self, roll_no: &str) -> Option<i64> {
            self.student_id_map.get(roll_no).copied()
        }

        pub async fn count_students(&self) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM students")
                .fetch_one(&self.pool)
                .await
        }

        pub async fn count_attendance(&self, student_id: i64) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE student_id = ?")
                .bind(student_id)
                .fetch_one(&self.pool)
                .await
        }
    }

    // Every new connection to sqlite::memory: opens a distinct empty
    // database, so the pool is pinned to a single connection.
    pub async fn setup_test_pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        migrate_database(&pool, CURRENT_SCHEMA)
            .await
            .expect("Failed to migrate test database");

        pool
    }

    pub async fn setup_test_client(test_db: &TestDb) -> Client {
        Client::tracked(crate::init_rocket(test_db.pool.clone()).await)
            .await
            .expect("Failed to build test client")
    }
}
