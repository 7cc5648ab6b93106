use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AcademicError, AcademicResult};
use crate::gpa;
use crate::models::{AcademicStats, CgpaMethod, Freshness, Semester, SemesterSubmission, Student};
use crate::store::GradeStore;

#[derive(Debug, Clone)]
pub struct StatsView {
    pub student: Student,
    pub stats: Option<AcademicStats>,
    pub freshness: Freshness,
    pub semesters: Vec<Semester>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub recalculated: usize,
    pub failed: usize,
}

async fn require_student<S: GradeStore + ?Sized>(
    store: &S,
    email: &str,
) -> AcademicResult<Student> {
    store
        .find_student(email)
        .await?
        .ok_or_else(|| AcademicError::StudentNotFound(email.to_string()))
}

fn ensure_unique_term(existing: &[Semester], candidate: &Semester) -> AcademicResult<()> {
    let clash = existing
        .iter()
        .any(|semester| semester.id != candidate.id && semester.key() == candidate.key());
    if clash {
        return Err(AcademicError::DuplicateSemester {
            semester: candidate.label(),
        });
    }
    Ok(())
}

/// Whether the persisted record still matches the semesters it was computed from.
pub fn freshness(stats: Option<&AcademicStats>, semesters: &[Semester]) -> Freshness {
    match stats {
        None if semesters.is_empty() => Freshness::Fresh,
        None => Freshness::Stale,
        Some(stats) => {
            let edited_since = semesters
                .iter()
                .any(|semester| semester.updated_at > stats.last_calculated);
            if edited_since || stats.total_semesters != semesters.len() as i64 {
                Freshness::Stale
            } else {
                Freshness::Fresh
            }
        }
    }
}

/// The record to publish for a view. A student with no semesters gets the zeroed
/// record; semesters without any computed record are an error rather than zeros.
pub fn published_stats(view: &StatsView, method: CgpaMethod) -> AcademicResult<AcademicStats> {
    match &view.stats {
        Some(stats) => Ok(stats.clone()),
        None if view.semesters.is_empty() => Ok(AcademicStats::zeroed(method, Utc::now())),
        None => Err(AcademicError::StatsNotCalculated(view.student.email.clone())),
    }
}

/// Full recomputation of a student's stats, run after every semester create, update
/// or delete. On failure the previously persisted record stays in place.
pub async fn recalculate<S: GradeStore + ?Sized>(
    store: &S,
    student_id: Uuid,
    method: CgpaMethod,
) -> AcademicResult<AcademicStats> {
    let semesters = store.fetch_semesters(student_id).await?;

    let stats = match gpa::compute_cgpa(&semesters, method) {
        Ok(stats) => stats,
        Err(err) => {
            warn!(%student_id, error = %err, "recalculation failed, keeping previous stats");
            return Err(err);
        }
    };

    store.save_stats(student_id, &stats).await?;
    info!(
        %student_id,
        cgpa = stats.cumulative_cgpa,
        credits = stats.total_credits,
        semesters = stats.total_semesters,
        %method,
        "academic stats recalculated"
    );
    Ok(stats)
}

pub async fn submit_semester<S: GradeStore + ?Sized>(
    store: &S,
    email: &str,
    submission: SemesterSubmission,
    method: CgpaMethod,
) -> AcademicResult<(Semester, AcademicStats)> {
    let student = require_student(store, email).await?;
    let totals = gpa::compute_semester(&submission.courses)?;

    let semester = Semester {
        id: Uuid::new_v4(),
        student_id: student.id,
        season: submission.semester,
        year: submission.year,
        courses: submission.courses,
        semester_gpa: totals.semester_gpa,
        total_credits: totals.total_credits,
        updated_at: Utc::now(),
    };

    let existing = store.fetch_semesters(student.id).await?;
    ensure_unique_term(&existing, &semester)?;

    store.insert_semester(&semester).await?;
    info!(
        student = %student.email,
        semester = %semester.label(),
        gpa = semester.semester_gpa,
        credits = semester.total_credits,
        "semester recorded"
    );

    let stats = recalculate(store, student.id, method).await?;
    Ok((semester, stats))
}

pub async fn update_semester<S: GradeStore + ?Sized>(
    store: &S,
    semester_id: Uuid,
    submission: SemesterSubmission,
    method: CgpaMethod,
) -> AcademicResult<(Semester, AcademicStats)> {
    let current = store
        .fetch_semester(semester_id)
        .await?
        .ok_or(AcademicError::SemesterNotFound(semester_id))?;
    let totals = gpa::compute_semester(&submission.courses)?;

    let semester = Semester {
        season: submission.semester,
        year: submission.year,
        courses: submission.courses,
        semester_gpa: totals.semester_gpa,
        total_credits: totals.total_credits,
        updated_at: Utc::now(),
        ..current
    };

    let existing = store.fetch_semesters(semester.student_id).await?;
    ensure_unique_term(&existing, &semester)?;

    store.replace_semester(&semester).await?;
    info!(
        semester = %semester.label(),
        id = %semester.id,
        gpa = semester.semester_gpa,
        "semester updated"
    );

    let stats = recalculate(store, semester.student_id, method).await?;
    Ok((semester, stats))
}

pub async fn delete_semester<S: GradeStore + ?Sized>(
    store: &S,
    semester_id: Uuid,
    method: CgpaMethod,
) -> AcademicResult<AcademicStats> {
    let semester = store
        .fetch_semester(semester_id)
        .await?
        .ok_or(AcademicError::SemesterNotFound(semester_id))?;

    if !store.delete_semester(semester_id).await? {
        return Err(AcademicError::SemesterNotFound(semester_id));
    }
    info!(semester = %semester.label(), id = %semester_id, "semester deleted");

    recalculate(store, semester.student_id, method).await
}

pub async fn recalculate_student<S: GradeStore + ?Sized>(
    store: &S,
    email: &str,
    method: CgpaMethod,
) -> AcademicResult<AcademicStats> {
    let student = require_student(store, email).await?;
    recalculate(store, student.id, method).await
}

/// Maintenance pass over every student, one at a time.
pub async fn recalculate_all<S: GradeStore + ?Sized>(
    store: &S,
    method: CgpaMethod,
) -> AcademicResult<BatchSummary> {
    let mut summary = BatchSummary::default();

    for student in store.list_students().await? {
        match recalculate(store, student.id, method).await {
            Ok(_) => summary.recalculated += 1,
            Err(err) => {
                warn!(student = %student.email, error = %err, "skipping student");
                summary.failed += 1;
            }
        }
    }

    debug!(?summary, "batch recalculation finished");
    Ok(summary)
}

pub async fn stats<S: GradeStore + ?Sized>(store: &S, email: &str) -> AcademicResult<StatsView> {
    let student = require_student(store, email).await?;
    let semesters = store.fetch_semesters(student.id).await?;
    let stats = store.fetch_stats(student.id).await?;
    let freshness = freshness(stats.as_ref(), &semesters);

    Ok(StatsView {
        student,
        stats,
        freshness,
        semesters,
    })
}
