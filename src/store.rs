use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::time::timeout;

use crate::err::Error;
use crate::models::{RecordPatch, StudentRecord};

// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    student_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL
)"#;

pub async fn connect(url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("Failed to connect to the student database")
}

pub async fn prepare_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .context("Failed to prepare the students table")?;
    Ok(())
}

#[derive(Clone)]
pub struct StudentStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl StudentStore {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn find_by_student_id(&self, id: &str) -> Result<Option<StudentRecord>, Error> {
        let query =
            sqlx::query_as::<_, StudentRecord>("SELECT * FROM students WHERE student_id = $1 LIMIT 1")
                .bind(id)
                .fetch_optional(&self.pool);
        self.run("find student", query).await
    }

    pub async fn find_by_student_id_or_email(
        &self,
        id: &str,
        email: &str,
    ) -> Result<Option<StudentRecord>, Error> {
        let query = sqlx::query_as::<_, StudentRecord>(
            "SELECT * FROM students WHERE student_id = $1 OR email = $2 LIMIT 1",
        )
        .bind(id)
        .bind(email)
        .fetch_optional(&self.pool);
        self.run("find student by id or email", query).await
    }

    pub async fn create(&self, record: &StudentRecord) -> Result<(), Error> {
        let query = sqlx::query("INSERT INTO students VALUES ($1, $2, $3, $4, $5)")
            .bind(&record.student_id)
            .bind(&record.name)
            .bind(&record.email)
            .bind(&record.password_hash)
            .bind(record.created_at)
            .execute(&self.pool);
        let res = self.run("create student", query).await?;
        if res.rows_affected() < 1 {
            return Err(Error::internal(
                "DatabaseError",
                "Could not save student record!",
            ));
        }
        Ok(())
    }

    pub async fn update_partial(
        &self,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<StudentRecord>, Error> {
        let query = sqlx::query_as::<_, StudentRecord>(
            "UPDATE students SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                password_hash = COALESCE($4, password_hash) \
             WHERE student_id = $1 \
             RETURNING *",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.password_hash)
        .fetch_optional(&self.pool);
        self.run("update student", query).await
    }

    pub async fn delete(&self, id: &str) -> Result<Option<StudentRecord>, Error> {
        let query = sqlx::query_as::<_, StudentRecord>(
            "DELETE FROM students WHERE student_id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool);
        self.run("delete student", query).await
    }

    async fn run<T, F>(&self, what: &'static str, query: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match timeout(self.op_timeout, query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(store_error(err)),
            Err(_) => Err(Error::internal(
                "StoreTimeout",
                format!("`{}` did not complete within {:?}", what, self.op_timeout),
            )),
        }
    }
}

fn store_error(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        return Error::AlreadyExists {
            message: "Student with provided studentId or email already exists!".to_string(),
        };
    }
    Error::internal("DatabaseError", format!("{:?}", err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        return db.code().as_deref() == Some(UNIQUE_VIOLATION);
    }
    false
}
