use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{AcademicStats, Semester, Student};

/// Persistence used by the stats lifecycle.
///
/// Writes are independent; concurrent recomputations for one student resolve
/// as last write wins on the stats record.
#[async_trait]
pub trait GradeStore: Send + Sync {
    async fn find_student(&self, email: &str) -> Result<Option<Student>>;

    async fn list_students(&self) -> Result<Vec<Student>>;

    async fn fetch_semester(&self, id: Uuid) -> Result<Option<Semester>>;

    async fn fetch_semesters(&self, student_id: Uuid) -> Result<Vec<Semester>>;

    async fn insert_semester(&self, semester: &Semester) -> Result<()>;

    /// Replaces term, courses and derived totals of an existing semester.
    async fn replace_semester(&self, semester: &Semester) -> Result<()>;

    /// Returns false when nothing was deleted.
    async fn delete_semester(&self, id: Uuid) -> Result<bool>;

    async fn fetch_stats(&self, student_id: Uuid) -> Result<Option<AcademicStats>>;

    async fn save_stats(&self, student_id: Uuid, stats: &AcademicStats) -> Result<()>;
}
