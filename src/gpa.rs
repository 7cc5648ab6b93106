use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{AcademicError, AcademicResult};
use crate::grades::{self, LetterGrade};
use crate::models::{AcademicStats, CgpaMethod, CgpaPoint, CourseRecord, GradeShare, Semester};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemesterTotals {
    pub semester_gpa: f64,
    pub total_credits: f64,
}

/// Zero denominators evaluate to 0 instead of NaN.
pub fn weighted_ratio(weighted_sum: f64, total_weight: f64) -> f64 {
    if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn validate_course(course: &CourseRecord) -> AcademicResult<LetterGrade> {
    if course.course_code.trim().is_empty() {
        return Err(AcademicError::invalid_course(
            course.course_name.clone(),
            "missing course code",
        ));
    }
    if !course.credit_hours.is_finite() || course.credit_hours < 0.0 {
        return Err(AcademicError::invalid_course(
            course.course_code.clone(),
            format!("credit hours must be a non-negative number, got {}", course.credit_hours),
        ));
    }
    grades::resolve(course)
}

pub fn compute_semester(courses: &[CourseRecord]) -> AcademicResult<SemesterTotals> {
    let mut total_credits = 0.0;
    let mut weighted_tenths = 0.0;

    for course in courses {
        let grade = validate_course(course)?;
        total_credits += course.credit_hours;
        weighted_tenths += f64::from(grade.tenths()) * course.credit_hours;
    }

    Ok(SemesterTotals {
        semester_gpa: weighted_ratio(weighted_tenths, total_credits) / 10.0,
        total_credits,
    })
}

fn check_semester(semester: &Semester) -> AcademicResult<()> {
    if !semester.total_credits.is_finite() || semester.total_credits < 0.0 {
        return Err(AcademicError::invalid_aggregation(
            semester.label(),
            format!("total credits {} is negative or not a number", semester.total_credits),
        ));
    }
    if !semester.semester_gpa.is_finite() || !(0.0..=4.0).contains(&semester.semester_gpa) {
        return Err(AcademicError::invalid_aggregation(
            semester.label(),
            format!("semester GPA {} is outside 0..=4", semester.semester_gpa),
        ));
    }
    Ok(())
}

/// Oldest first.
pub fn chronological(semesters: &[Semester]) -> Vec<&Semester> {
    let mut ordered: Vec<&Semester> = semesters.iter().collect();
    ordered.sort_by_key(|semester| semester.key());
    ordered
}

pub fn latest(semesters: &[Semester]) -> Option<&Semester> {
    semesters.iter().max_by_key(|semester| semester.key())
}

pub fn compute_cgpa(semesters: &[Semester], method: CgpaMethod) -> AcademicResult<AcademicStats> {
    let now = Utc::now();
    if semesters.is_empty() {
        return Ok(AcademicStats::zeroed(method, now));
    }

    for semester in semesters {
        check_semester(semester)?;
    }

    // Both methods produce the same credit-weighted average; sequential folds
    // in chronological order so it can be extended independently.
    let (weighted_points, total_credits) = match method {
        CgpaMethod::Accumulated => semesters
            .iter()
            .fold((0.0_f64, 0.0_f64), |(points, credits), s| {
                (points + s.semester_gpa * s.total_credits, credits + s.total_credits)
            }),
        CgpaMethod::Sequential => chronological(semesters)
            .into_iter()
            .fold((0.0_f64, 0.0_f64), |(points, credits), s| {
                (points + s.semester_gpa * s.total_credits, credits + s.total_credits)
            }),
    };

    Ok(AcademicStats {
        cumulative_cgpa: round2(weighted_ratio(weighted_points, total_credits)),
        total_credits,
        total_semesters: semesters.len() as i64,
        current_semester_gpa: latest(semesters)
            .map(|semester| round2(semester.semester_gpa))
            .unwrap_or(0.0),
        method,
        last_calculated: now,
    })
}

/// Running cumulative GPA after each semester, oldest first.
pub fn cgpa_progression(semesters: &[Semester]) -> AcademicResult<Vec<CgpaPoint>> {
    let mut points = Vec::with_capacity(semesters.len());
    let mut weighted = 0.0;
    let mut credits = 0.0;

    for semester in chronological(semesters) {
        check_semester(semester)?;
        weighted += semester.semester_gpa * semester.total_credits;
        credits += semester.total_credits;
        points.push(CgpaPoint {
            label: semester.label(),
            semester_gpa: semester.semester_gpa,
            semester_credits: semester.total_credits,
            cumulative_cgpa: round2(weighted_ratio(weighted, credits)),
            cumulative_credits: credits,
        });
    }

    Ok(points)
}

/// Courses and credits per letter grade, best grade first. Unrecognized grades are not counted.
pub fn grade_distribution(semesters: &[Semester]) -> Vec<GradeShare> {
    let mut shares: BTreeMap<LetterGrade, (usize, f64)> = BTreeMap::new();

    for course in semesters.iter().flat_map(|semester| semester.courses.iter()) {
        if let Some(grade) = LetterGrade::parse(&course.grade) {
            let entry = shares.entry(grade).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += course.credit_hours;
        }
    }

    shares
        .into_iter()
        .map(|(grade, (courses, credits))| GradeShare {
            grade,
            courses,
            credits,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Season;
    use uuid::Uuid;

    fn course(code: &str, credits: f64, grade: &str) -> CourseRecord {
        CourseRecord {
            course_code: code.to_string(),
            course_name: format!("{code} lecture"),
            credit_hours: credits,
            grade: grade.to_string(),
        }
    }

    fn semester(season: Season, year: i32, gpa: f64, credits: f64) -> Semester {
        Semester {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            season,
            year,
            courses: Vec::new(),
            semester_gpa: gpa,
            total_credits: credits,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn semester_gpa_is_credit_weighted() {
        let totals =
            compute_semester(&[course("CSE110", 3.0, "A"), course("MAT110", 3.0, "B")]).unwrap();
        assert_eq!(totals.semester_gpa, 3.5);
        assert_eq!(totals.total_credits, 6.0);
    }

    #[test]
    fn uniform_grades_yield_their_point_value() {
        for grade in LetterGrade::ALL {
            let courses: Vec<CourseRecord> = (0..5)
                .map(|i| course(&format!("C{i}"), 3.0, grade.as_str()))
                .collect();
            let totals = compute_semester(&courses).unwrap();
            assert_eq!(totals.semester_gpa, grade.points(), "grade {grade}");
        }
    }

    #[test]
    fn semester_gpa_is_kept_unrounded_until_the_cumulative_step() {
        let first = compute_semester(&[course("CSE110", 3.0, "A"), course("CSE111", 4.0, "A")])
            .unwrap();
        let second = compute_semester(&[course("CSE220", 3.0, "A"), course("CSE221", 4.0, "A-")])
            .unwrap();
        assert_eq!(first.semester_gpa, 4.0);
        assert!((second.semester_gpa - 26.8 / 7.0).abs() < 1e-12);

        let fall = semester(Season::Fall, 2024, first.semester_gpa, first.total_credits);
        let spring = semester(Season::Spring, 2025, second.semester_gpa, second.total_credits);

        let stats = compute_cgpa(&[fall, spring], CgpaMethod::Accumulated).unwrap();
        assert_eq!(stats.cumulative_cgpa, 3.91);
        assert_eq!(stats.current_semester_gpa, 3.83);
        assert_eq!(stats.total_credits, 14.0);
    }

    #[test]
    fn zero_credit_semesters_have_zero_gpa() {
        let empty = compute_semester(&[]).unwrap();
        assert_eq!(empty.semester_gpa, 0.0);
        assert_eq!(empty.total_credits, 0.0);

        let audit_only =
            compute_semester(&[course("LAB001", 0.0, "A"), course("LAB002", 0.0, "B")]).unwrap();
        assert_eq!(audit_only.semester_gpa, 0.0);
        assert_eq!(audit_only.total_credits, 0.0);
    }

    #[test]
    fn unrecognized_grade_rejects_the_whole_semester() {
        let err = compute_semester(&[course("CSE110", 3.0, "A"), course("ENG101", 3.0, "X")])
            .unwrap_err();
        assert!(matches!(
            err,
            AcademicError::InvalidGrade { ref course_code, .. } if course_code == "ENG101"
        ));
    }

    #[test]
    fn negative_credit_hours_are_rejected() {
        let err = compute_semester(&[course("CSE110", -3.0, "A")]).unwrap_err();
        assert!(matches!(err, AcademicError::InvalidCourse { .. }));
    }

    #[test]
    fn missing_course_code_is_rejected() {
        let err = compute_semester(&[course("  ", 3.0, "A")]).unwrap_err();
        assert!(matches!(err, AcademicError::InvalidCourse { .. }));
    }

    #[test]
    fn empty_history_gives_zeroed_record() {
        let stats = compute_cgpa(&[], CgpaMethod::Accumulated).unwrap();
        assert_eq!(stats.cumulative_cgpa, 0.0);
        assert_eq!(stats.total_credits, 0.0);
        assert_eq!(stats.total_semesters, 0);
        assert_eq!(stats.current_semester_gpa, 0.0);
    }

    #[test]
    fn cumulative_cgpa_weights_by_semester_credits() {
        let semesters = vec![
            semester(Season::Fall, 2024, 3.0, 15.0),
            semester(Season::Spring, 2025, 4.0, 12.0),
        ];
        let stats = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        assert_eq!(stats.cumulative_cgpa, 3.44);
        assert_eq!(stats.total_credits, 27.0);
        assert_eq!(stats.total_semesters, 2);
        assert_eq!(stats.current_semester_gpa, 4.0);
    }

    #[test]
    fn current_semester_uses_season_rank_within_a_year() {
        let semesters = vec![
            semester(Season::Fall, 2025, 2.5, 12.0),
            semester(Season::Summer, 2025, 3.9, 6.0),
            semester(Season::Spring, 2025, 3.1, 15.0),
        ];
        let stats = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        assert_eq!(stats.current_semester_gpa, 2.5);
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let forward = vec![
            semester(Season::Spring, 2024, 3.25, 16.0),
            semester(Season::Summer, 2024, 3.5, 8.0),
            semester(Season::Fall, 2024, 2.75, 12.0),
            semester(Season::Spring, 2025, 4.0, 4.0),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = compute_cgpa(&forward, CgpaMethod::Accumulated).unwrap();
        let b = compute_cgpa(&reversed, CgpaMethod::Accumulated).unwrap();
        assert_eq!(a.cumulative_cgpa, b.cumulative_cgpa);
        assert_eq!(a.total_credits, b.total_credits);
        assert_eq!(a.current_semester_gpa, b.current_semester_gpa);
        assert_eq!(a.current_semester_gpa, 4.0);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let semesters = vec![
            semester(Season::Fall, 2023, 3.67, 13.0),
            semester(Season::Spring, 2024, 2.91, 17.0),
        ];
        let first = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        let second = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        assert_eq!(first.cumulative_cgpa.to_bits(), second.cumulative_cgpa.to_bits());
        assert_eq!(first.total_credits.to_bits(), second.total_credits.to_bits());
    }

    #[test]
    fn methods_agree_on_the_average() {
        let semesters = vec![
            semester(Season::Fall, 2024, 3.0, 15.0),
            semester(Season::Spring, 2025, 4.0, 12.0),
            semester(Season::Summer, 2024, 2.0, 6.0),
        ];
        let accumulated = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        let sequential = compute_cgpa(&semesters, CgpaMethod::Sequential).unwrap();
        assert_eq!(accumulated.cumulative_cgpa, sequential.cumulative_cgpa);
        assert_eq!(sequential.method, CgpaMethod::Sequential);
    }

    #[test]
    fn negative_semester_credits_abort_aggregation() {
        let semesters = vec![
            semester(Season::Fall, 2024, 3.0, 15.0),
            semester(Season::Spring, 2025, 4.0, -12.0),
        ];
        let err = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap_err();
        assert!(matches!(
            err,
            AcademicError::InvalidAggregationInput { ref semester, .. } if semester == "Spring 2025"
        ));
    }

    #[test]
    fn all_zero_credit_history_has_zero_cgpa() {
        let semesters = vec![semester(Season::Fall, 2024, 0.0, 0.0)];
        let stats = compute_cgpa(&semesters, CgpaMethod::Accumulated).unwrap();
        assert_eq!(stats.cumulative_cgpa, 0.0);
        assert_eq!(stats.total_semesters, 1);
    }

    #[test]
    fn progression_runs_oldest_first() {
        let semesters = vec![
            semester(Season::Spring, 2025, 4.0, 12.0),
            semester(Season::Fall, 2024, 3.0, 15.0),
        ];
        let points = cgpa_progression(&semesters).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "Fall 2024");
        assert_eq!(points[0].cumulative_cgpa, 3.0);
        assert_eq!(points[1].label, "Spring 2025");
        assert_eq!(points[1].cumulative_cgpa, 3.44);
        assert_eq!(points[1].cumulative_credits, 27.0);
    }

    #[test]
    fn distribution_groups_by_letter() {
        let mut first = semester(Season::Fall, 2024, 3.5, 6.0);
        first.courses = vec![course("CSE110", 3.0, "A"), course("MAT110", 3.0, "B")];
        let mut second = semester(Season::Spring, 2025, 4.0, 4.0);
        second.courses = vec![course("PHY111", 4.0, "a")];

        let shares = grade_distribution(&[first, second]);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].grade, LetterGrade::A);
        assert_eq!(shares[0].courses, 2);
        assert_eq!(shares[0].credits, 7.0);
        assert_eq!(shares[1].grade, LetterGrade::B);
    }
}
