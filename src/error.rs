use thiserror::Error;
use uuid::Uuid;

pub type AcademicResult<T> = Result<T, AcademicError>;

#[derive(Debug, Error)]
pub enum AcademicError {
    /// Letter grade outside the grade point table; the whole submission is rejected.
    #[error("course {course_code}: unrecognized grade {grade:?}")]
    InvalidGrade { course_code: String, grade: String },

    #[error("course {course_code}: {reason}")]
    InvalidCourse { course_code: String, reason: String },

    /// Persisted semester data that cannot be aggregated; the previous stats record is kept.
    #[error("cannot aggregate {semester}: {reason}")]
    InvalidAggregationInput { semester: String, reason: String },

    #[error("{semester} is already recorded for this student")]
    DuplicateSemester { semester: String },

    #[error("semester {0} not found")]
    SemesterNotFound(Uuid),

    #[error("no student registered with email {0}")]
    StudentNotFound(String),

    /// Semesters exist but no stats record has been computed from them yet.
    #[error("no stats calculated yet for {0}; run recalculate")]
    StatsNotCalculated(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AcademicError {
    pub fn invalid_course(course_code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCourse {
            course_code: course_code.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_aggregation(semester: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAggregationInput {
            semester: semester.into(),
            reason: reason.into(),
        }
    }
}
