use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    repo::StudentStore,
    repo_types::{EnrollmentStatus, NewStudent, Student, StudentUpdate, Track},
};
use crate::{
    error::StoreError,
    events::{ChangeFeed, ChangeKind},
};

/// Student tables held in memory, keyed by track then LRN.
#[derive(Default)]
pub struct MemoryStudentStore {
    tables: RwLock<HashMap<Track, Vec<Student>>>,
    changes: ChangeFeed,
}

impl MemoryStudentStore {
    pub fn new(changes: ChangeFeed) -> Self {
        Self {
            tables: RwLock::default(),
            changes,
        }
    }

    /// Seeds a row as-is, status included.
    pub async fn insert_raw(&self, track: Track, student: Student) {
        self.tables
            .write()
            .await
            .entry(track)
            .or_default()
            .push(student);
    }

    async fn select<F>(&self, track: Track, keep: F) -> Vec<Student>
    where
        F: Fn(&Student) -> bool,
    {
        self.tables
            .read()
            .await
            .get(&track)
            .map(|rows| rows.iter().filter(|s| keep(s)).cloned().collect())
            .unwrap_or_default()
    }

    async fn modify<F>(&self, track: Track, lrn: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Student),
    {
        let mut tables = self.tables.write().await;
        let student = tables
            .get_mut(&track)
            .and_then(|rows| rows.iter_mut().find(|s| s.lrn == lrn))
            .ok_or_else(|| StoreError::NotFound(format!("student {lrn}")))?;
        f(student);
        drop(tables);
        self.changes.publish(track, ChangeKind::Update);
        Ok(())
    }
}

fn strand_matches(s: &Student, strand: Option<&str>) -> bool {
    strand.map_or(true, |st| s.strand.as_deref() == Some(st))
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn list_enrolled(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .select(track, |s| {
                s.enrollment_status == EnrollmentStatus::Enrolled && strand_matches(s, strand)
            })
            .await)
    }

    async fn list_pending(
        &self,
        track: Track,
        strand: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .select(track, |s| {
                s.enrollment_status == EnrollmentStatus::Pending && strand_matches(s, strand)
            })
            .await)
    }

    async fn list_all(&self, track: Track) -> Result<Vec<Student>, StoreError> {
        Ok(self.select(track, |_| true).await)
    }

    async fn approve(&self, track: Track, lrn: &str) -> Result<(), StoreError> {
        self.modify(track, lrn, |s| {
            s.enrollment_status = EnrollmentStatus::Enrolled
        })
        .await
    }

    async fn update(
        &self,
        track: Track,
        lrn: &str,
        update: &StudentUpdate,
    ) -> Result<(), StoreError> {
        self.modify(track, lrn, |s| update.apply(track, s)).await
    }

    async fn delete(&self, track: Track, lrn: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(track).or_default();
        let before = rows.len();
        rows.retain(|s| s.lrn != lrn);
        if rows.len() == before {
            return Err(StoreError::NotFound(format!("student {lrn}")));
        }
        drop(tables);
        self.changes.publish(track, ChangeKind::Delete);
        Ok(())
    }

    async fn add(&self, track: Track, student: NewStudent) -> Result<Student, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(track).or_default();
        if rows.iter().any(|s| s.lrn == student.lrn) {
            return Err(StoreError::DuplicateLrn(student.lrn));
        }
        let added = student.into_pending(track);
        rows.push(added.clone());
        drop(tables);
        self.changes.publish(track, ChangeKind::Insert);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(lrn: &str, strand: Option<&str>) -> NewStudent {
        NewStudent {
            lrn: lrn.into(),
            lname: "Santos".into(),
            fname: "Lia".into(),
            mname: "M".into(),
            strand: strand.map(Into::into),
            four_ps: None,
        }
    }

    #[tokio::test]
    async fn added_students_start_pending_and_move_to_enrolled_on_approval() {
        let store = MemoryStudentStore::default();
        let added = store
            .add(Track::General, new_student("1", Some("STEM")))
            .await
            .unwrap();
        assert_eq!(added.enrollment_status, EnrollmentStatus::Pending);
        assert!(store
            .list_enrolled(Track::General, None)
            .await
            .unwrap()
            .is_empty());

        store.approve(Track::General, "1").await.unwrap();
        let enrolled = store
            .list_enrolled(Track::General, Some("STEM"))
            .await
            .unwrap();
        assert_eq!(enrolled.len(), 1);
        assert!(store
            .list_pending(Track::General, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn tracks_are_separate_tables() {
        let store = MemoryStudentStore::default();
        store.add(Track::Als, new_student("1", None)).await.unwrap();
        assert!(store.list_all(Track::General).await.unwrap().is_empty());
        assert_eq!(store.list_all(Track::Als).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_lrn_is_not_found() {
        let store = MemoryStudentStore::default();
        let err = store.approve(Track::General, "404").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store.delete(Track::General, "404").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_lrn_is_rejected() {
        let store = MemoryStudentStore::default();
        store.add(Track::General, new_student("7", None)).await.unwrap();
        let err = store
            .add(Track::General, new_student("7", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateLrn(lrn) if lrn == "7"));
    }

    #[tokio::test]
    async fn writes_are_published_on_the_feed() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(Track::General);
        let store = MemoryStudentStore::new(feed);
        store.add(Track::General, new_student("1", None)).await.unwrap();
        let change = sub.next().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
    }
}
