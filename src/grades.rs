use std::fmt;

use crate::error::{AcademicError, AcademicResult};
use crate::models::CourseRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 13] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::DMinus,
        LetterGrade::F,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|grade| grade.as_str() == normalized)
    }

    /// Grade points scaled by ten, so weighted sums stay whole numbers.
    pub fn tenths(self) -> u32 {
        match self {
            LetterGrade::APlus | LetterGrade::A => 40,
            LetterGrade::AMinus => 37,
            LetterGrade::BPlus => 33,
            LetterGrade::B => 30,
            LetterGrade::BMinus => 27,
            LetterGrade::CPlus => 23,
            LetterGrade::C => 20,
            LetterGrade::CMinus => 17,
            LetterGrade::DPlus => 13,
            LetterGrade::D => 10,
            LetterGrade::DMinus => 7,
            LetterGrade::F => 0,
        }
    }

    pub fn points(self) -> f64 {
        f64::from(self.tenths()) / 10.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a course's grade, failing with the offending course identified.
pub fn resolve(course: &CourseRecord) -> AcademicResult<LetterGrade> {
    LetterGrade::parse(&course.grade).ok_or_else(|| AcademicError::InvalidGrade {
        course_code: course.course_code.clone(),
        grade: course.grade.clone(),
    })
}
