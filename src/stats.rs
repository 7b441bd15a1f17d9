use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::band::{Band, BandDistribution};
use crate::ingest::Ingestion;
use crate::models::{SkippedSheet, StudentCompletionRecord};
use crate::records::completion_rate;

const TOP_PERFORMER_RATE: f64 = 90.0;
const NEEDS_ATTENTION_RATE: f64 = 60.0;
const STUDENT_LIST_LIMIT: usize = 10;
const CLASS_RANKING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student_name: String,
    pub completion_rate: f64,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatistics {
    pub subject: String,
    pub class_label: String,
    pub enrolled: usize,
    pub eligible: usize,
    /// `None` means insufficient data, never 0%.
    pub average_completion: Option<f64>,
    pub band: Band,
    pub band_distribution: BandDistribution,
    pub top_performers: Vec<StudentSummary>,
    pub needs_attention: Vec<StudentSummary>,
    pub students: Vec<StudentCompletionRecord>,
}

impl ClassStatistics {
    pub fn from_records(
        subject: &str,
        class_label: &str,
        students: Vec<StudentCompletionRecord>,
    ) -> Self {
        let rates: Vec<f64> = students
            .iter()
            .filter_map(StudentCompletionRecord::eligible_rate)
            .collect();
        let average_completion = mean(&rates);

        let mut eligible: Vec<StudentSummary> = students
            .iter()
            .filter(|s| s.has_due)
            .map(|s| StudentSummary {
                student_name: s.student_name.clone(),
                completion_rate: s.completion_rate,
                band: s.band,
            })
            .collect();
        eligible.sort_by(|a, b| {
            by_rate_desc(a.completion_rate, b.completion_rate)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });

        let top_performers = eligible
            .iter()
            .filter(|s| s.completion_rate >= TOP_PERFORMER_RATE)
            .take(STUDENT_LIST_LIMIT)
            .cloned()
            .collect();
        let needs_attention = eligible
            .iter()
            .rev()
            .filter(|s| s.completion_rate < NEEDS_ATTENTION_RATE)
            .take(STUDENT_LIST_LIMIT)
            .cloned()
            .collect();

        Self {
            subject: subject.to_string(),
            class_label: class_label.to_string(),
            enrolled: students.len(),
            eligible: rates.len(),
            average_completion,
            band: Band::from_percentage(average_completion),
            band_distribution: BandDistribution::from_rates(rates),
            top_performers,
            needs_attention,
            students,
        }
    }

    pub fn has_data(&self) -> bool {
        self.average_completion.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectStatistics {
    pub subject: String,
    pub class_count: usize,
    pub enrolled: usize,
    pub eligible: usize,
    pub average_completion: Option<f64>,
    pub band: Band,
    pub band_distribution: BandDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRanking {
    pub subject: String,
    pub class_label: String,
    pub average_completion: f64,
    pub band: Band,
}

/// One student's completion across every subject they appear in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOverall {
    pub student_name: String,
    pub total_due: usize,
    pub submitted: usize,
    pub completion_rate: Option<f64>,
    pub band: Band,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoolKpi {
    pub distinct_students: usize,
    pub eligible_records: usize,
    pub class_count: usize,
    pub classes_without_data: usize,
    pub average_completion: Option<f64>,
    pub band: Band,
    /// One entry per eligible (student, subject) record.
    pub band_distribution: BandDistribution,
    /// One entry per student, using their cross-subject rate.
    pub student_band_distribution: BandDistribution,
    pub top_classes: Vec<ClassRanking>,
    pub bottom_classes: Vec<ClassRanking>,
}

/// Output contract handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub reference_date: NaiveDate,
    pub window_start: Option<NaiveDate>,
    pub sources: Vec<String>,
    pub classes: BTreeMap<String, BTreeMap<String, ClassStatistics>>,
    pub subjects: BTreeMap<String, SubjectStatistics>,
    pub students: Vec<StudentOverall>,
    pub school: SchoolKpi,
    pub skipped: Vec<SkippedSheet>,
}

impl Analysis {
    pub fn class_stats(&self) -> impl Iterator<Item = &ClassStatistics> {
        self.classes.values().flat_map(|classes| classes.values())
    }

    pub fn records(&self) -> impl Iterator<Item = &StudentCompletionRecord> {
        self.class_stats().flat_map(|class| class.students.iter())
    }
}

pub fn analyze(
    ingestion: Ingestion,
    reference_date: NaiveDate,
    window_start: Option<NaiveDate>,
) -> Analysis {
    let mut grouped: BTreeMap<String, BTreeMap<String, Vec<StudentCompletionRecord>>> =
        BTreeMap::new();
    for sheet in ingestion.sheets {
        grouped
            .entry(sheet.subject)
            .or_default()
            .entry(sheet.class_label)
            .or_default()
            .extend(sheet.students);
    }

    let classes: BTreeMap<String, BTreeMap<String, ClassStatistics>> = grouped
        .into_iter()
        .map(|(subject, classes)| {
            let stats = classes
                .into_iter()
                .map(|(class_label, students)| {
                    let stats = ClassStatistics::from_records(&subject, &class_label, students);
                    (class_label, stats)
                })
                .collect();
            (subject, stats)
        })
        .collect();

    let subjects = classes
        .iter()
        .map(|(subject, classes)| (subject.clone(), subject_statistics(subject, classes.values())))
        .collect();

    let all_classes: Vec<&ClassStatistics> = classes.values().flat_map(|c| c.values()).collect();
    let students = student_overall(all_classes.iter().flat_map(|c| c.students.iter()));
    let school = school_kpi(&all_classes, &students);

    Analysis {
        reference_date,
        window_start,
        sources: ingestion.sources,
        classes,
        subjects,
        students,
        school,
        skipped: ingestion.skipped,
    }
}

fn subject_statistics<'a>(
    subject: &str,
    classes: impl Iterator<Item = &'a ClassStatistics>,
) -> SubjectStatistics {
    let mut class_count = 0;
    let mut enrolled = 0;
    let mut rates = Vec::new();
    for class in classes {
        class_count += 1;
        enrolled += class.enrolled;
        rates.extend(class.students.iter().filter_map(StudentCompletionRecord::eligible_rate));
    }
    let average_completion = mean(&rates);

    SubjectStatistics {
        subject: subject.to_string(),
        class_count,
        enrolled,
        eligible: rates.len(),
        average_completion,
        band: Band::from_percentage(average_completion),
        band_distribution: BandDistribution::from_rates(rates),
    }
}

fn student_overall<'a>(
    records: impl Iterator<Item = &'a StudentCompletionRecord>,
) -> Vec<StudentOverall> {
    let mut by_name: BTreeMap<&str, (usize, usize, Vec<String>)> = BTreeMap::new();
    for record in records.filter(|r| r.has_due) {
        let entry = by_name.entry(record.student_name.as_str()).or_default();
        entry.0 += record.total_due;
        entry.1 += record.submitted;
        entry.2.push(record.subject.clone());
    }

    by_name
        .into_iter()
        .map(|(name, (total_due, submitted, subjects))| {
            let rate = (total_due > 0).then(|| completion_rate(submitted, total_due));
            StudentOverall {
                student_name: name.to_string(),
                total_due,
                submitted,
                completion_rate: rate,
                band: Band::from_percentage(rate),
                subjects,
            }
        })
        .collect()
}

fn school_kpi(classes: &[&ClassStatistics], students: &[StudentOverall]) -> SchoolKpi {
    let records: Vec<&StudentCompletionRecord> =
        classes.iter().flat_map(|c| c.students.iter()).collect();
    let rates: Vec<f64> = records.iter().filter_map(|r| r.eligible_rate()).collect();
    let distinct: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.has_due)
        .map(|r| r.student_name.as_str())
        .collect();
    let average_completion = mean(&rates);

    let mut student_band_distribution = BandDistribution::default();
    for student in students {
        student_band_distribution.add(student.band);
    }

    let mut ranked: Vec<ClassRanking> = classes
        .iter()
        .filter_map(|c| {
            c.average_completion.map(|average| ClassRanking {
                subject: c.subject.clone(),
                class_label: c.class_label.clone(),
                average_completion: average,
                band: c.band,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        by_rate_desc(a.average_completion, b.average_completion)
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.class_label.cmp(&b.class_label))
    });
    let top_classes = ranked.iter().take(CLASS_RANKING_LIMIT).cloned().collect();
    let bottom_classes = ranked.iter().rev().take(CLASS_RANKING_LIMIT).cloned().collect();

    SchoolKpi {
        distinct_students: distinct.len(),
        eligible_records: rates.len(),
        class_count: classes.len(),
        classes_without_data: classes.iter().filter(|c| !c.has_data()).count(),
        average_completion,
        band: Band::from_percentage(average_completion),
        band_distribution: BandDistribution::from_rates(rates),
        student_band_distribution,
        top_classes,
        bottom_classes,
    }
}

/// Arithmetic mean; `None` for an empty population.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn by_rate_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::due_date::DueWindow;
    use crate::ingest::fixtures::{n, sheet, t, today};
    use crate::ingest::ingest_workbook;
    use crate::models::{CellValue, Workbook};

    fn analyze_workbook(workbook: &Workbook) -> Analysis {
        let window = DueWindow::until(today());
        let ingestion = ingest_workbook(workbook, &AnalysisConfig::default(), window).unwrap();
        analyze(ingestion, today(), None)
    }

    fn sample_workbook() -> Workbook {
        Workbook {
            sheets: vec![
                sheet(
                    "03/1 Arabic",
                    &[("A1", -2), ("A2", -1), ("A3", 3)],
                    &[
                        ("طالب 1", vec![n(10.0), n(10.0), n(10.0)]),
                        ("طالب 2", vec![n(10.0), t("M"), CellValue::Empty]),
                        ("طالب 3", vec![t("AB"), t("I"), n(10.0)]),
                    ],
                ),
                sheet(
                    "03/2 Arabic",
                    &[("A1", -2)],
                    &[("طالب 4", vec![t("M")])],
                ),
                sheet(
                    "Math 03/1",
                    &[("Q1", -5), ("Q2", -1)],
                    &[("طالب 1", vec![n(1.0), t("M")]), ("طالب 2", vec![n(1.0), n(1.0)])],
                ),
                sheet("Science 03/1", &[("Lab", 5)], &[("طالب 1", vec![n(1.0)])]),
            ],
        }
    }

    #[test]
    fn class_average_excludes_students_with_nothing_due() {
        let analysis = analyze_workbook(&sample_workbook());
        let class = &analysis.classes["Arabic"]["03/1"];

        assert_eq!(class.enrolled, 3);
        assert_eq!(class.eligible, 2);
        assert_eq!(class.average_completion, Some(75.0));
        assert_eq!(class.band, Band::VeryGood);
        assert_eq!(class.band_distribution.count(Band::Excellent), 1);
        assert_eq!(class.band_distribution.count(Band::NeedsImprovement), 1);
        assert_eq!(class.band_distribution.total(), 2);

        // including the no-due student at 0% would drag the average to 50
        let naive = mean(&class.students.iter().map(|s| s.completion_rate).collect::<Vec<_>>());
        assert_eq!(naive, Some(50.0));
        assert_ne!(naive, class.average_completion);
    }

    #[test]
    fn class_without_eligible_students_has_no_data() {
        let analysis = analyze_workbook(&sample_workbook());
        let science = &analysis.classes["Science"]["03/1"];

        assert_eq!(science.average_completion, None);
        assert_eq!(science.band, Band::NotAvailable);
        assert_eq!(science.band_distribution.total(), 0);
        assert!(!science.has_data());
        assert_eq!(analysis.school.classes_without_data, 1);
    }

    #[test]
    fn subject_rolls_up_all_classes() {
        let analysis = analyze_workbook(&sample_workbook());
        let arabic = &analysis.subjects["Arabic"];

        assert_eq!(arabic.class_count, 2);
        assert_eq!(arabic.enrolled, 4);
        assert_eq!(arabic.eligible, 3);
        let expected = (100.0 + 50.0 + 0.0) / 3.0;
        assert!((arabic.average_completion.unwrap() - expected).abs() < 1e-9);
        assert_eq!(arabic.band_distribution.count(Band::NoCompletion), 1);
    }

    #[test]
    fn school_counts_each_student_once_per_subject() {
        let analysis = analyze_workbook(&sample_workbook());
        let school = &analysis.school;

        // Arabic: 100, 50, 0 (طالب 3 excluded); Math: 50, 100; Science: nothing due
        assert_eq!(school.eligible_records, 5);
        assert_eq!(school.distinct_students, 3);
        assert_eq!(school.average_completion, Some(60.0));
        assert_eq!(school.band, Band::Good);
        assert_eq!(school.band_distribution.total(), 5);
        assert_eq!(school.class_count, 4);
    }

    #[test]
    fn student_overall_pools_submissions_across_subjects() {
        let analysis = analyze_workbook(&sample_workbook());
        let first = analysis
            .students
            .iter()
            .find(|s| s.student_name == "طالب 1")
            .unwrap();

        // Arabic 2/2, Math 1/2; Science has nothing due
        assert_eq!((first.submitted, first.total_due), (3, 4));
        assert_eq!(first.completion_rate, Some(75.0));
        assert_eq!(first.subjects, vec!["Arabic".to_string(), "Math".to_string()]);
        assert!(analysis.students.iter().all(|s| s.student_name != "طالب 3"));
        assert_eq!(analysis.school.student_band_distribution.total(), analysis.students.len());
    }

    #[test]
    fn rankings_and_student_lists() {
        let analysis = analyze_workbook(&sample_workbook());
        let school = &analysis.school;

        assert_eq!(school.top_classes.len(), 3);
        assert_eq!(school.top_classes[0].subject, "Arabic");
        assert_eq!(school.top_classes[0].class_label, "03/1");
        assert_eq!(school.bottom_classes[0].class_label, "03/2");

        let class = &analysis.classes["Arabic"]["03/1"];
        assert_eq!(class.top_performers.len(), 1);
        assert_eq!(class.top_performers[0].student_name, "طالب 1");
        assert_eq!(class.needs_attention.len(), 1);
        assert_eq!(class.needs_attention[0].student_name, "طالب 2");
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let workbook = sample_workbook();
        let first = analyze_workbook(&workbook);
        let second = analyze_workbook(&workbook);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        for (a, b) in first.class_stats().zip(second.class_stats()) {
            assert_eq!(
                a.average_completion.map(f64::to_bits),
                b.average_completion.map(f64::to_bits)
            );
        }
    }

    #[test]
    fn empty_population_has_no_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.0]), Some(0.0));
    }

    #[test]
    fn averages_are_banded_without_rounding() {
        let average = mean(&[89.992, 90.0]);
        assert!((average.unwrap() - 89.996).abs() < 1e-9);
        assert_eq!(Band::from_percentage(average), Band::VeryGood);
    }
}
