use std::fmt::Write;
use std::io;

use serde::Serialize;

use crate::band::{Band, BandDistribution};
use crate::stats::Analysis;

pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(value) => format!("{value:.1}%"),
        None => "insufficient data".to_string(),
    }
}

fn band_line(distribution: &BandDistribution) -> String {
    let total = distribution.total();
    Band::RANKED
        .iter()
        .map(|band| {
            let count = distribution.count(*band);
            if total == 0 {
                format!("{} {}: {}", band.emoji(), band.label(), count)
            } else {
                format!(
                    "{} {}: {} ({:.0}%)",
                    band.emoji(),
                    band.label(),
                    count,
                    count as f64 * 100.0 / total as f64
                )
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn build_report(analysis: &Analysis, week_label: Option<&str>) -> String {
    let mut output = String::new();
    let school = &analysis.school;

    let _ = writeln!(output, "# Weekly Assessment Completion Report");
    match analysis.window_start {
        Some(start) => {
            let _ = writeln!(
                output,
                "Assessments due {} to {}{}",
                start,
                analysis.reference_date,
                week_label.map(|w| format!(" ({w})")).unwrap_or_default()
            );
        }
        None => {
            let _ = writeln!(
                output,
                "Assessments due on or before {}{}",
                analysis.reference_date,
                week_label.map(|w| format!(" ({w})")).unwrap_or_default()
            );
        }
    }
    if analysis.sources.len() > 1 {
        let _ = writeln!(output, "Combined exports: {}", analysis.sources.join(", "));
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## School Overview");
    let _ = writeln!(
        output,
        "- Completion: {} {} {}",
        format_rate(school.average_completion),
        school.band.emoji(),
        school.band.label()
    );
    let _ = writeln!(
        output,
        "- {} students across {} classes ({} records with assessments due)",
        school.distinct_students, school.class_count, school.eligible_records
    );
    if school.classes_without_data > 0 {
        let _ = writeln!(
            output,
            "- {} classes have no assessments due yet",
            school.classes_without_data
        );
    }
    let _ = writeln!(output, "- Bands by record: {}", band_line(&school.band_distribution));
    let _ = writeln!(
        output,
        "- Bands by student: {}",
        band_line(&school.student_band_distribution)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");
    if analysis.subjects.is_empty() {
        let _ = writeln!(output, "No sheets could be analyzed.");
    } else {
        for subject in analysis.subjects.values() {
            let _ = writeln!(
                output,
                "- {}: {} {} across {} classes ({} of {} students with work due)",
                subject.subject,
                format_rate(subject.average_completion),
                subject.band.label(),
                subject.class_count,
                subject.eligible,
                subject.enrolled
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Classes");
    for class in analysis.class_stats() {
        let _ = writeln!(output, "### {} {}", class.subject, class.class_label);
        let _ = writeln!(
            output,
            "- Completion: {} {} {}",
            format_rate(class.average_completion),
            class.band.emoji(),
            class.band.label()
        );
        let _ = writeln!(
            output,
            "- {} of {} students with work due",
            class.eligible, class.enrolled
        );
        if class.has_data() {
            let _ = writeln!(output, "- Bands: {}", band_line(&class.band_distribution));
        }
        if !class.needs_attention.is_empty() {
            let names: Vec<String> = class
                .needs_attention
                .iter()
                .map(|s| format!("{} ({:.1}%)", s.student_name, s.completion_rate))
                .collect();
            let _ = writeln!(output, "- Needs attention: {}", names.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Ranking");
    if school.top_classes.is_empty() {
        let _ = writeln!(output, "No class has assessments due yet.");
    } else {
        for ranking in &school.top_classes {
            let _ = writeln!(
                output,
                "- {} {}: {:.1}% {}",
                ranking.subject,
                ranking.class_label,
                ranking.average_completion,
                ranking.band.label()
            );
        }
        let _ = writeln!(output, "Lowest:");
        for ranking in &school.bottom_classes {
            let _ = writeln!(
                output,
                "- {} {}: {:.1}% {}",
                ranking.subject,
                ranking.class_label,
                ranking.average_completion,
                ranking.band.label()
            );
        }
    }

    if !analysis.skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Skipped Sheets");
        for skipped in &analysis.skipped {
            match &skipped.source {
                Some(source) => {
                    let _ = writeln!(
                        output,
                        "- {} ({}): {}",
                        skipped.sheet_name, source, skipped.reason
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", skipped.sheet_name, skipped.reason);
                }
            }
        }
    }

    output
}

#[derive(Debug, Serialize)]
struct StudentRow<'a> {
    student_name: &'a str,
    subject: &'a str,
    class_label: &'a str,
    total_due: usize,
    submitted: usize,
    not_submitted: usize,
    ignored: usize,
    has_due: bool,
    completion_rate: Option<f64>,
    band: Band,
    band_color: &'static str,
}

/// One CSV row per student record; `completion_rate` is empty when nothing
/// was due.
pub fn write_student_csv<W: io::Write>(analysis: &Analysis, writer: W) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;
    for record in analysis.records() {
        csv_writer.serialize(StudentRow {
            student_name: &record.student_name,
            subject: &record.subject,
            class_label: &record.class_label,
            total_due: record.total_due,
            submitted: record.submitted,
            not_submitted: record.not_submitted,
            ignored: record.ignored,
            has_due: record.has_due,
            completion_rate: record.eligible_rate().map(|r| (r * 100.0).round() / 100.0),
            band: record.band,
            band_color: record.band.color(),
        })?;
        written += 1;
    }
    csv_writer.flush()?;
    Ok(written)
}
