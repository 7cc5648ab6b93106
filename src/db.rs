use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{
    AcademicStats, CgpaMethod, CourseRecord, Season, Semester, SemesterSubmission, Student,
};
use crate::store::GradeStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_student(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    program: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO student_hub.students (id, full_name, email, program)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, program = EXCLUDED.program
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(program)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Seeds students and returns demo semesters to submit through the lifecycle.
pub async fn seed(pool: &PgPool) -> anyhow::Result<Vec<(&'static str, SemesterSubmission)>> {
    let students = [
        ("Avery Lee", "avery.lee@studenthub.edu", "Computer Science"),
        ("Jules Moreno", "jules.moreno@studenthub.edu", "Electrical Engineering"),
        ("Kiara Patel", "kiara.patel@studenthub.edu", "Economics"),
    ];

    for (name, email, program) in students {
        upsert_student(pool, name, email, program).await?;
    }

    let course = |code: &str, name: &str, credits: f64, grade: &str| CourseRecord {
        course_code: code.to_string(),
        course_name: name.to_string(),
        credit_hours: credits,
        grade: grade.to_string(),
    };

    Ok(vec![
        (
            "avery.lee@studenthub.edu",
            SemesterSubmission {
                semester: Season::Fall,
                year: 2025,
                courses: vec![
                    course("CSE110", "Programming Language I", 3.0, "A"),
                    course("MAT110", "Differential Calculus", 3.0, "B+"),
                    course("ENG101", "English Fundamentals", 3.0, "A-"),
                ],
            },
        ),
        (
            "avery.lee@studenthub.edu",
            SemesterSubmission {
                semester: Season::Spring,
                year: 2026,
                courses: vec![
                    course("CSE111", "Programming Language II", 3.0, "A"),
                    course("MAT120", "Integral Calculus", 3.0, "B"),
                    course("PHY111", "Principles of Physics I", 3.0, "B-"),
                    course("CSE111L", "Programming Language II Lab", 1.0, "A+"),
                ],
            },
        ),
        (
            "jules.moreno@studenthub.edu",
            SemesterSubmission {
                semester: Season::Summer,
                year: 2025,
                courses: vec![
                    course("EEE101", "Electrical Circuits I", 3.0, "C+"),
                    course("HUM103", "Ethics and Culture", 3.0, "B"),
                ],
            },
        ),
    ])
}

pub fn read_courses_csv(csv_path: &Path) -> anyhow::Result<Vec<CourseRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course_code: String,
        course_name: String,
        credit_hours: f64,
        grade: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut courses = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        courses.push(CourseRecord {
            course_code: row.course_code,
            course_name: row.course_name,
            credit_hours: row.credit_hours,
            grade: row.grade,
        });
    }

    Ok(courses)
}

pub fn read_submission_json(json_path: &Path) -> anyhow::Result<SemesterSubmission> {
    let raw = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("malformed semester in {}", json_path.display()))
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        program: row.get("program"),
    }
}

fn semester_from_row(row: &PgRow) -> anyhow::Result<Semester> {
    let season: String = row.get("season");
    Ok(Semester {
        id: row.get("id"),
        student_id: row.get("student_id"),
        season: season.parse::<Season>()?,
        year: row.get("year"),
        courses: Vec::new(),
        semester_gpa: row.get("semester_gpa"),
        total_credits: row.get("total_credits"),
        updated_at: row.get("updated_at"),
    })
}

async fn insert_courses(
    tx: &mut Transaction<'_, Postgres>,
    semester: &Semester,
) -> anyhow::Result<()> {
    for (position, course) in semester.courses.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO student_hub.courses
            (semester_id, position, course_code, course_name, credit_hours, grade)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(semester.id)
        .bind(position as i32)
        .bind(&course.course_code)
        .bind(&course.course_name)
        .bind(course.credit_hours)
        .bind(&course.grade)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl PgStore {
    async fn attach_courses(&self, semesters: &mut [Semester]) -> anyhow::Result<()> {
        if semesters.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = semesters.iter().map(|s| s.id).collect();
        let rows = sqlx::query(
            "SELECT semester_id, course_code, course_name, credit_hours, grade \
             FROM student_hub.courses \
             WHERE semester_id = ANY($1) \
             ORDER BY semester_id, position",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_semester: HashMap<Uuid, Vec<CourseRecord>> = HashMap::new();
        for row in rows {
            by_semester
                .entry(row.get("semester_id"))
                .or_default()
                .push(CourseRecord {
                    course_code: row.get("course_code"),
                    course_name: row.get("course_name"),
                    credit_hours: row.get("credit_hours"),
                    grade: row.get("grade"),
                });
        }

        for semester in semesters.iter_mut() {
            semester.courses = by_semester.remove(&semester.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl GradeStore for PgStore {
    async fn find_student(&self, email: &str) -> anyhow::Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT id, full_name, email, program FROM student_hub.students WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(student_from_row))
    }

    async fn list_students(&self) -> anyhow::Result<Vec<Student>> {
        let rows = sqlx::query(
            "SELECT id, full_name, email, program FROM student_hub.students ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(student_from_row).collect())
    }

    async fn fetch_semester(&self, id: Uuid) -> anyhow::Result<Option<Semester>> {
        let row = sqlx::query(
            "SELECT id, student_id, season, year, semester_gpa, total_credits, updated_at \
             FROM student_hub.semesters WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut semesters = vec![semester_from_row(&row)?];
        self.attach_courses(&mut semesters).await?;
        Ok(semesters.pop())
    }

    async fn fetch_semesters(&self, student_id: Uuid) -> anyhow::Result<Vec<Semester>> {
        let rows = sqlx::query(
            "SELECT id, student_id, season, year, semester_gpa, total_credits, updated_at \
             FROM student_hub.semesters WHERE student_id = $1 \
             ORDER BY year, created_at",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut semesters = rows
            .iter()
            .map(semester_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.attach_courses(&mut semesters).await?;
        Ok(semesters)
    }

    async fn insert_semester(&self, semester: &Semester) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO student_hub.semesters
            (id, student_id, season, year, semester_gpa, total_credits, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(semester.id)
        .bind(semester.student_id)
        .bind(semester.season.as_str())
        .bind(semester.year)
        .bind(semester.semester_gpa)
        .bind(semester.total_credits)
        .bind(semester.updated_at)
        .execute(&mut *tx)
        .await
        .context("failed to insert semester")?;

        insert_courses(&mut tx, semester).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_semester(&self, semester: &Semester) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE student_hub.semesters
            SET season = $2, year = $3, semester_gpa = $4, total_credits = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(semester.id)
        .bind(semester.season.as_str())
        .bind(semester.year)
        .bind(semester.semester_gpa)
        .bind(semester.total_credits)
        .bind(semester.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("semester {} disappeared during update", semester.id);
        }

        sqlx::query("DELETE FROM student_hub.courses WHERE semester_id = $1")
            .bind(semester.id)
            .execute(&mut *tx)
            .await?;
        insert_courses(&mut tx, semester).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_semester(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM student_hub.semesters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_stats(&self, student_id: Uuid) -> anyhow::Result<Option<AcademicStats>> {
        let row = sqlx::query(
            "SELECT cumulative_cgpa, total_credits, total_semesters, current_semester_gpa, \
             method, last_calculated \
             FROM student_hub.academic_stats WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let method: String = row.get("method");
        Ok(Some(AcademicStats {
            cumulative_cgpa: row.get("cumulative_cgpa"),
            total_credits: row.get("total_credits"),
            total_semesters: row.get("total_semesters"),
            current_semester_gpa: row.get("current_semester_gpa"),
            method: method.parse::<CgpaMethod>()?,
            last_calculated: row.get("last_calculated"),
        }))
    }

    async fn save_stats(&self, student_id: Uuid, stats: &AcademicStats) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO student_hub.academic_stats
            (student_id, cumulative_cgpa, total_credits, total_semesters,
             current_semester_gpa, method, last_calculated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id) DO UPDATE
            SET cumulative_cgpa = EXCLUDED.cumulative_cgpa,
                total_credits = EXCLUDED.total_credits,
                total_semesters = EXCLUDED.total_semesters,
                current_semester_gpa = EXCLUDED.current_semester_gpa,
                method = EXCLUDED.method,
                last_calculated = EXCLUDED.last_calculated
            "#,
        )
        .bind(student_id)
        .bind(stats.cumulative_cgpa)
        .bind(stats.total_credits)
        .bind(stats.total_semesters)
        .bind(stats.current_semester_gpa)
        .bind(stats.method.as_str())
        .bind(stats.last_calculated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_json_uses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fall.json");
        std::fs::write(
            &path,
            r#"{"semester":"Fall","year":2024,"courses":[
                {"courseCode":"CSE110","courseName":"Programming I","creditHours":3,"grade":"A"}
            ]}"#,
        )
        .unwrap();

        let submission = read_submission_json(&path).unwrap();
        assert_eq!(submission.semester, Season::Fall);
        assert_eq!(submission.year, 2024);
        assert_eq!(submission.courses[0].course_code, "CSE110");
        assert_eq!(submission.courses[0].credit_hours, 3.0);
    }

    #[test]
    fn course_csv_keeps_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.csv");
        std::fs::write(
            &path,
            "course_code,course_name,credit_hours,grade\n\
             CSE220,Data Structures,3,A-\n\
             CSE221,Algorithms,3,B+\n",
        )
        .unwrap();

        let courses = read_courses_csv(&path).unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].course_code, "CSE220");
        assert_eq!(courses[1].grade, "B+");
    }
}
