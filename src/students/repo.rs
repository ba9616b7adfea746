use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::repo_types::{
    EnrollmentStatus, NewStudent, Student, StudentRow, StudentUpdate, Track, ALS_STRAND,
};
use crate::error::StoreError;

/// Passthrough access to the two student tables. One backend request per call.
#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn list_enrolled(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError>;
    async fn list_pending(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError>;
    async fn list_all(&self, track: Track) -> Result<Vec<Student>, StoreError>;
    async fn approve(&self, track: Track, lrn: &str) -> Result<(), StoreError>;
    async fn update(
        &self,
        track: Track,
        lrn: &str,
        update: &StudentUpdate,
    ) -> Result<(), StoreError>;
    async fn delete(&self, track: Track, lrn: &str) -> Result<(), StoreError>;
    async fn add(&self, track: Track, student: NewStudent) -> Result<Student, StoreError>;
}

/// Stamps the ALS label on rows of the strand-less table and applies the strand filter
/// the table itself cannot.
pub(crate) fn finish_rows<I>(
    track: Track,
    rows: I,
    strand: Option<&str>,
) -> Result<Vec<Student>, StoreError>
where
    I: IntoIterator<Item = StudentRow>,
{
    let mut out = rows
        .into_iter()
        .map(Student::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if !track.has_strand() {
        for s in &mut out {
            s.strand = Some(ALS_STRAND.to_string());
        }
        if let Some(strand) = strand {
            out.retain(|s| s.strand.as_deref() == Some(strand));
        }
    }
    Ok(out)
}

fn strand_column(track: Track) -> &'static str {
    if track.has_strand() {
        "strand"
    } else {
        "NULL::text"
    }
}

/// Writes reach listing streams through the table triggers, not from here.
#[derive(Clone)]
pub struct PgStudentStore {
    db: PgPool,
}

impl PgStudentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn select(
        &self,
        track: Track,
        status: Option<EnrollmentStatus>,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT lrn, lname, fname, mname, {} AS strand, enrollment_status, four_ps FROM {}",
            strand_column(track),
            track.table()
        ));
        let mut sep = " WHERE ";
        if let Some(status) = status {
            qb.push(sep).push("enrollment_status = ").push_bind(status.as_str());
            sep = " AND ";
        }
        if let (true, Some(strand)) = (track.has_strand(), strand) {
            qb.push(sep).push("strand = ").push_bind(strand);
        }

        let rows = qb
            .build_query_as::<StudentRow>()
            .fetch_all(&self.db)
            .await?;
        debug!(?track, ?status, count = rows.len(), "students fetched");
        finish_rows(track, rows, strand)
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn list_enrolled(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        self.select(track, Some(EnrollmentStatus::Enrolled), strand)
            .await
    }

    async fn list_pending(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        self.select(track, Some(EnrollmentStatus::Pending), strand)
            .await
    }

    async fn list_all(&self, track: Track) -> Result<Vec<Student>, StoreError> {
        self.select(track, None, None).await
    }

    async fn approve(&self, track: Track, lrn: &str) -> Result<(), StoreError> {
        let done = sqlx::query(&format!(
            "UPDATE {} SET enrollment_status = $2 WHERE lrn = $1",
            track.table()
        ))
        .bind(lrn)
        .bind(EnrollmentStatus::Enrolled.as_str())
        .execute(&self.db)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("student {lrn}")));
        }
        Ok(())
    }

    async fn update(
        &self,
        track: Track,
        lrn: &str,
        update: &StudentUpdate,
    ) -> Result<(), StoreError> {
        let strand_set = if track.has_strand() {
            ", strand = COALESCE($7, strand)"
        } else {
            ""
        };
        let sql = format!(
            r#"
            UPDATE {}
               SET lname = COALESCE($2, lname),
                   fname = COALESCE($3, fname),
                   mname = COALESCE($4, mname),
                   enrollment_status = COALESCE($5, enrollment_status),
                   four_ps = COALESCE($6, four_ps){}
             WHERE lrn = $1
            "#,
            track.table(),
            strand_set
        );
        let mut query = sqlx::query(&sql)
            .bind(lrn)
            .bind(update.lname.as_deref())
            .bind(update.fname.as_deref())
            .bind(update.mname.as_deref())
            .bind(update.enrollment_status.map(EnrollmentStatus::as_str))
            .bind(update.four_ps.as_deref());
        if track.has_strand() {
            query = query.bind(update.strand.as_deref());
        }

        let done = query.execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("student {lrn}")));
        }
        Ok(())
    }

    async fn delete(&self, track: Track, lrn: &str) -> Result<(), StoreError> {
        let done = sqlx::query(&format!("DELETE FROM {} WHERE lrn = $1", track.table()))
            .bind(lrn)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("student {lrn}")));
        }
        Ok(())
    }

    async fn add(&self, track: Track, student: NewStudent) -> Result<Student, StoreError> {
        let lrn = student.lrn.clone();
        let row = if track.has_strand() {
            sqlx::query_as::<_, StudentRow>(
                r#"
                INSERT INTO students (lrn, lname, fname, mname, strand, enrollment_status, four_ps)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING lrn, lname, fname, mname, strand, enrollment_status, four_ps
                "#,
            )
            .bind(&student.lrn)
            .bind(&student.lname)
            .bind(&student.fname)
            .bind(&student.mname)
            .bind(student.strand.as_deref())
            .bind(EnrollmentStatus::Pending.as_str())
            .bind(student.four_ps.as_deref())
            .fetch_one(&self.db)
            .await
        } else {
            sqlx::query_as::<_, StudentRow>(
                r#"
                INSERT INTO als_students (lrn, lname, fname, mname, enrollment_status, four_ps)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING lrn, lname, fname, mname, NULL::text AS strand, enrollment_status, four_ps
                "#,
            )
            .bind(&student.lrn)
            .bind(&student.lname)
            .bind(&student.fname)
            .bind(&student.mname)
            .bind(EnrollmentStatus::Pending.as_str())
            .bind(student.four_ps.as_deref())
            .fetch_one(&self.db)
            .await
        }
        .map_err(|e| {
            if let sqlx::Error::Database(d) = &e {
                if d.is_unique_violation() {
                    return StoreError::DuplicateLrn(lrn);
                }
            }
            StoreError::from(e)
        })?;

        let mut added = finish_rows(track, [row], None)?;
        added
            .pop()
            .ok_or_else(|| StoreError::Backend("insert returned no row".into()))
    }
}
