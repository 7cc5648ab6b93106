use std::fmt::Write;

use crate::error::AcademicResult;
use crate::gpa;
use crate::lifecycle::StatsView;
use crate::models::Freshness;

pub fn build_transcript(view: &StatsView) -> AcademicResult<String> {
    let progression = gpa::cgpa_progression(&view.semesters)?;
    let distribution = gpa::grade_distribution(&view.semesters);

    let mut output = String::new();

    let _ = writeln!(output, "# Academic Transcript");
    let _ = writeln!(
        output,
        "{} ({}, {})",
        view.student.full_name, view.student.email, view.student.program
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    match &view.stats {
        Some(stats) => {
            let _ = writeln!(
                output,
                "- CGPA: {:.2} ({} method)",
                stats.cumulative_cgpa, stats.method
            );
            let _ = writeln!(output, "- Credits earned: {}", stats.total_credits);
            let _ = writeln!(output, "- Semesters: {}", stats.total_semesters);
            let _ = writeln!(output, "- Current semester GPA: {:.2}", stats.current_semester_gpa);
            let _ = writeln!(
                output,
                "- Last calculated: {}",
                stats.last_calculated.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => {
            let _ = writeln!(output, "No academic stats recorded yet.");
        }
    }

    if view.freshness == Freshness::Stale {
        let _ = writeln!(
            output,
            "- Note: semesters changed since the last calculation; run recalculate."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Semesters");

    if view.semesters.is_empty() {
        let _ = writeln!(output, "No semesters recorded.");
    } else {
        for semester in gpa::chronological(&view.semesters).into_iter().rev() {
            let _ = writeln!(
                output,
                "### {} (GPA {:.2}, {} credits)",
                semester.label(),
                semester.semester_gpa,
                semester.total_credits
            );
            let _ = writeln!(output, "| Code | Course | Credits | Grade |");
            let _ = writeln!(output, "| --- | --- | --- | --- |");
            for course in &semester.courses {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} | {} |",
                    course.course_code, course.course_name, course.credit_hours, course.grade
                );
            }
            let _ = writeln!(output);
        }
    }

    let _ = writeln!(output, "## CGPA Progression");

    if progression.is_empty() {
        let _ = writeln!(output, "No semesters recorded.");
    } else {
        for point in &progression {
            let _ = writeln!(
                output,
                "- {}: semester {:.2} over {} credits, cumulative {:.2} over {} credits",
                point.label,
                point.semester_gpa,
                point.semester_credits,
                point.cumulative_cgpa,
                point.cumulative_credits
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");

    if distribution.is_empty() {
        let _ = writeln!(output, "No graded courses.");
    } else {
        for share in &distribution {
            let _ = writeln!(
                output,
                "- {}: {} courses ({} credits)",
                share.grade, share.courses, share.credits
            );
        }
    }

    Ok(output)
}
