use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::grades::LetterGrade;

#[derive(Debug, Error)]
#[error("unknown {kind} {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Ordering key within a year: Spring < Summer < Fall.
    pub fn rank(self) -> u8 {
        match self {
            Season::Spring => 1,
            Season::Summer => 2,
            Season::Fall => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" => Ok(Season::Fall),
            _ => Err(ParseEnumError {
                kind: "semester",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CgpaMethod {
    #[default]
    Accumulated,
    Sequential,
}

impl CgpaMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CgpaMethod::Accumulated => "accumulated",
            CgpaMethod::Sequential => "sequential",
        }
    }
}

impl fmt::Display for CgpaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CgpaMethod {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accumulated" => Ok(CgpaMethod::Accumulated),
            "sequential" => Ok(CgpaMethod::Sequential),
            _ => Err(ParseEnumError {
                kind: "cgpa method",
                value: value.to_string(),
            }),
        }
    }
}

/// Whole-number credit totals go out as JSON integers; fractional lab credits keep their fraction.
fn serialize_credits<S: Serializer>(credits: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if credits.fract() == 0.0 && credits.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*credits as i64)
    } else {
        serializer.serialize_f64(*credits)
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub course_code: String,
    pub course_name: String,
    pub credit_hours: f64,
    pub grade: String,
}

/// Request body for submitting or replacing a semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterSubmission {
    pub semester: Season,
    pub year: i32,
    pub courses: Vec<CourseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(rename = "semester")]
    pub season: Season,
    pub year: i32,
    pub courses: Vec<CourseRecord>,
    #[serde(rename = "semesterGPA")]
    pub semester_gpa: f64,
    #[serde(serialize_with = "serialize_credits")]
    pub total_credits: f64,
    pub updated_at: DateTime<Utc>,
}

impl Semester {
    /// Chronological sort key.
    pub fn key(&self) -> (i32, u8) {
        (self.year, self.season.rank())
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.season, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicStats {
    #[serde(rename = "cumulativeCGPA")]
    pub cumulative_cgpa: f64,
    #[serde(serialize_with = "serialize_credits")]
    pub total_credits: f64,
    pub total_semesters: i64,
    #[serde(rename = "currentSemesterGPA")]
    pub current_semester_gpa: f64,
    /// Persisted alongside the record, not part of the JSON body.
    #[serde(skip)]
    pub method: CgpaMethod,
    pub last_calculated: DateTime<Utc>,
}

impl AcademicStats {
    pub fn zeroed(method: CgpaMethod, last_calculated: DateTime<Utc>) -> Self {
        Self {
            cumulative_cgpa: 0.0,
            total_credits: 0.0,
            total_semesters: 0,
            current_semester_gpa: 0.0,
            method,
            last_calculated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CgpaPoint {
    pub label: String,
    pub semester_gpa: f64,
    pub semester_credits: f64,
    pub cumulative_cgpa: f64,
    pub cumulative_credits: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeShare {
    pub grade: LetterGrade,
    pub courses: usize,
    pub credits: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stats(total_credits: f64) -> AcademicStats {
        AcademicStats {
            cumulative_cgpa: 3.44,
            total_credits,
            total_semesters: 2,
            current_semester_gpa: 4.0,
            method: CgpaMethod::Sequential,
            last_calculated: Utc.with_ymd_and_hms(2025, 6, 1, 14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn stats_serialize_with_camel_case_keys() {
        let value = serde_json::to_value(stats(27.0)).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "cumulativeCGPA",
                "currentSemesterGPA",
                "lastCalculated",
                "totalCredits",
                "totalSemesters",
            ]
        );
        assert_eq!(value["cumulativeCGPA"], serde_json::json!(3.44));
        assert_eq!(value["totalSemesters"], serde_json::json!(2));
        assert_eq!(value["currentSemesterGPA"], serde_json::json!(4.0));

        let stamp = value["lastCalculated"].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), stats(27.0).last_calculated);
    }

    #[test]
    fn whole_credit_totals_serialize_as_integers() {
        let value = serde_json::to_value(stats(27.0)).unwrap();
        assert_eq!(value["totalCredits"], serde_json::json!(27));
        assert!(value["totalCredits"].is_i64());

        let value = serde_json::to_value(stats(27.5)).unwrap();
        assert_eq!(value["totalCredits"], serde_json::json!(27.5));
    }

    #[test]
    fn semester_serializes_the_term_as_semester() {
        let semester = Semester {
            id: Uuid::nil(),
            student_id: Uuid::nil(),
            season: Season::Fall,
            year: 2024,
            courses: Vec::new(),
            semester_gpa: 3.5,
            total_credits: 6.0,
            updated_at: Utc.with_ymd_and_hms(2024, 12, 20, 9, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&semester).unwrap();
        assert_eq!(value["semester"], serde_json::json!("Fall"));
        assert_eq!(value["semesterGPA"], serde_json::json!(3.5));
        assert_eq!(value["totalCredits"], serde_json::json!(6));
    }
}
