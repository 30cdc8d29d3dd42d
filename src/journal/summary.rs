// src/journal/summary.rs
// Periodic rollups: daily, weekly, monthly, quarterly, yearly.
//
// Trigger state lives in the filesystem: a summary is due iff its period has
// completed and its file does not exist. No sidecar state store.

use crate::error::Result;
use crate::journal::writer::ensure_dir;
use crate::llm::{ChatMessage, LlmClient};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Daily => "Daily Summary",
            Self::Weekly => "Weekly Summary",
            Self::Monthly => "Monthly Summary",
            Self::Quarterly => "Quarterly Summary",
            Self::Yearly => "Yearly Summary",
        }
    }
}

/// A summary that should exist but does not yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuePeriod {
    pub period: Period,
    /// First day of the summarized period.
    pub start: NaiveDate,
}

/// Summary file path: `<root>/summaries/<period>/<start>-<period>.md`.
/// Every period is named by its start date (weekly = its Monday).
pub fn summary_path(journal_root: &Path, period: Period, start: NaiveDate) -> PathBuf {
    journal_root
        .join("summaries")
        .join(period.as_str())
        .join(format!(
            "{}-{}.md",
            start.format("%Y-%m-%d"),
            period.as_str()
        ))
}

fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn quarter_start_month(month: u32) -> u32 {
    ((month - 1) / 3) * 3 + 1
}

fn prev_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

/// The period boundaries crossed when the calendar reaches `day`: entering a
/// Monday completes a week, entering the 1st completes a month, and so on.
/// Returns the completed periods' start dates.
pub(crate) fn boundaries_entering(day: NaiveDate) -> Vec<DuePeriod> {
    let mut out = Vec::new();
    if day.weekday() == Weekday::Mon {
        out.push(DuePeriod {
            period: Period::Weekly,
            start: day - Days::new(7),
        });
    }
    if day.day() == 1 {
        let prev = prev_day(day);
        out.push(DuePeriod {
            period: Period::Monthly,
            start: month_start(prev),
        });
        if matches!(day.month(), 1 | 4 | 7 | 10) {
            let prev_quarter_start = NaiveDate::from_ymd_opt(
                prev.year(),
                quarter_start_month(prev.month()),
                1,
            );
            if let Some(start) = prev_quarter_start {
                out.push(DuePeriod {
                    period: Period::Quarterly,
                    start,
                });
            }
        }
        if day.month() == 1 {
            if let Some(start) = NaiveDate::from_ymd_opt(day.year() - 1, 1, 1) {
                out.push(DuePeriod {
                    period: Period::Yearly,
                    start,
                });
            }
        }
    }
    out
}

/// Compute every summary due between the last commit date and the current
/// one, skipping files that already exist.
///
/// Dailies are due for days with entries in `[last_date, current_date)`; the
/// current day is still in progress. Higher periods come from the gap walk
/// over `(last_date, current_date]` and are due even with no activity, which
/// keeps the timeline continuous — but only periods that start after
/// `last_date`. The period containing the last commit is outside the gap and
/// not this walk's to produce. Ordered daily → yearly so each rollup can
/// ingest the tier below it.
pub fn due_summaries(
    journal_root: &Path,
    last_date: NaiveDate,
    current_date: NaiveDate,
) -> Vec<DuePeriod> {
    let mut due = Vec::new();

    let mut day = last_date;
    while day < current_date {
        let entries = crate::journal::writer::daily_path(journal_root, day);
        if entries.exists() && !summary_path(journal_root, Period::Daily, day).exists() {
            due.push(DuePeriod {
                period: Period::Daily,
                start: day,
            });
        }
        day = day + Days::new(1);
    }

    let mut day = last_date + Days::new(1);
    while day <= current_date {
        for candidate in boundaries_entering(day) {
            if candidate.start > last_date
                && !summary_path(journal_root, candidate.period, candidate.start).exists()
            {
                due.push(candidate);
            }
        }
        day = day + Days::new(1);
    }

    due.sort_by_key(|d| (d.period, d.start));
    due.dedup();
    due
}

#[derive(Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    summary: String,
}

/// Sources feeding one summary: relative link target plus file content.
struct SourceDoc {
    link: String,
    content: String,
}

/// Collect the source documents for a due period. Daily summaries read the
/// day's entries; each higher tier reads the tier below it.
fn gather_sources(journal_root: &Path, due: &DuePeriod) -> Vec<SourceDoc> {
    let mut sources = Vec::new();
    match due.period {
        Period::Daily => {
            let path = crate::journal::writer::daily_path(journal_root, due.start);
            if let Ok(content) = std::fs::read_to_string(&path) {
                sources.push(SourceDoc {
                    link: format!("../../daily/{}-journal.md", due.start.format("%Y-%m-%d")),
                    content,
                });
            }
        }
        Period::Weekly => {
            for offset in 0..7 {
                let day = due.start + Days::new(offset);
                push_summary_source(journal_root, Period::Daily, day, &mut sources);
            }
        }
        Period::Monthly => {
            // Weeks belong to the month their Monday falls in
            let mut monday = due.start;
            while monday.weekday() != Weekday::Mon {
                monday = monday + Days::new(1);
            }
            while monday.month() == due.start.month() {
                push_summary_source(journal_root, Period::Weekly, monday, &mut sources);
                monday = monday + Days::new(7);
            }
        }
        Period::Quarterly => {
            for offset in 0..3 {
                let month = NaiveDate::from_ymd_opt(
                    due.start.year(),
                    due.start.month() + offset,
                    1,
                );
                if let Some(month) = month {
                    push_summary_source(journal_root, Period::Monthly, month, &mut sources);
                }
            }
        }
        Period::Yearly => {
            for month in [1, 4, 7, 10] {
                if let Some(quarter) = NaiveDate::from_ymd_opt(due.start.year(), month, 1) {
                    push_summary_source(journal_root, Period::Quarterly, quarter, &mut sources);
                }
            }
        }
    }
    sources
}

fn push_summary_source(
    journal_root: &Path,
    period: Period,
    start: NaiveDate,
    sources: &mut Vec<SourceDoc>,
) {
    let path = summary_path(journal_root, period, start);
    if let Ok(content) = std::fs::read_to_string(&path) {
        if !content.contains(NO_ACTIVITY) {
            sources.push(SourceDoc {
                link: format!(
                    "../{}/{}-{}.md",
                    period.as_str(),
                    start.format("%Y-%m-%d"),
                    period.as_str()
                ),
                content,
            });
        }
    }
}

const NO_ACTIVITY: &str = "No activity recorded for this period.";

fn render_summary_file(due: &DuePeriod, body: &str, links: &[String]) -> String {
    let mut out = format!(
        "# {} — {}\n\n",
        due.period.title(),
        due.start.format("%Y-%m-%d")
    );
    out.push_str(body.trim());
    out.push('\n');
    if !links.is_empty() {
        out.push_str("\n## Sources\n\n");
        for link in links {
            out.push_str(&format!("- [{}]({})\n", link, link));
        }
    }
    out
}

/// Generate one summary file. Existing files are never touched; regeneration
/// requires deleting the file first.
#[instrument(name = "summary.generate", skip_all, fields(period = due.period.as_str(), start = %due.start))]
pub async fn generate_summary(
    journal_root: &Path,
    client: &Arc<dyn LlmClient>,
    due: &DuePeriod,
) -> Result<Option<PathBuf>> {
    let path = summary_path(journal_root, due.period, due.start);
    if path.exists() {
        return Ok(None);
    }

    let sources = gather_sources(journal_root, due);
    let content = if sources.is_empty() {
        render_summary_file(due, NO_ACTIVITY, &[])
    } else {
        let combined: String = sources
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let messages = vec![
            ChatMessage::system(crate::generate::prompts::SUMMARY_SYSTEM),
            ChatMessage::user(format!(
                "Period: {} starting {}\n\nSource material:\n\n{}",
                due.period.as_str(),
                due.start.format("%Y-%m-%d"),
                combined
            )),
        ];
        let result = client.complete_json(messages).await?;
        let payload: SummaryPayload = crate::llm::json::parse_json_hardened(&result.content)
            .map_err(crate::error::AiError::InvalidResponse)?;
        let links: Vec<String> = sources.into_iter().map(|s| s.link).collect();
        render_summary_file(due, &payload.summary, &links)
    };

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(&path, content).map_err(|e| crate::error::ScribeError::from_io(e, &path))?;
    info!(path = %path.display(), "Summary written");
    crate::telemetry::outcome_counter("summary.generated", true);
    Ok(Some(path))
}

/// Generate every due summary in cascade order. Individual failures are
/// logged and skipped; the next commit's trigger retries them.
pub async fn generate_due_summaries(
    journal_root: &Path,
    client: &Arc<dyn LlmClient>,
    last_date: NaiveDate,
    current_date: NaiveDate,
) -> Vec<PathBuf> {
    let due = due_summaries(journal_root, last_date, current_date);
    let mut written = Vec::new();
    for item in &due {
        match generate_summary(journal_root, client, item).await {
            Ok(Some(path)) => written.push(path),
            Ok(None) => {}
            Err(e) => {
                crate::telemetry::outcome_counter("summary.generated", false);
                warn!(
                    period = item.period.as_str(),
                    start = %item.start,
                    error = %e,
                    "Summary generation failed; will retry on a later commit"
                );
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn test_summary_path_shape() {
        let path = summary_path(Path::new("/j"), Period::Weekly, date("2025-06-02"));
        assert_eq!(
            path,
            PathBuf::from("/j/summaries/weekly/2025-06-02-weekly.md")
        );
    }

    #[test]
    fn test_boundaries_plain_monday() {
        let due = boundaries_entering(date("2025-06-09"));
        assert_eq!(
            due,
            vec![DuePeriod {
                period: Period::Weekly,
                start: date("2025-06-02")
            }]
        );
    }

    #[test]
    fn test_boundaries_midweek_day_is_empty() {
        assert!(boundaries_entering(date("2025-06-11")).is_empty());
    }

    #[test]
    fn test_boundaries_month_start() {
        let due = boundaries_entering(date("2025-06-01"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].period, Period::Monthly);
        assert_eq!(due[0].start, date("2025-05-01"));
    }

    #[test]
    fn test_boundaries_quarter_start() {
        let due = boundaries_entering(date("2025-07-01"));
        let periods: Vec<Period> = due.iter().map(|d| d.period).collect();
        assert!(periods.contains(&Period::Monthly));
        assert!(periods.contains(&Period::Quarterly));
        let quarterly = due.iter().find(|d| d.period == Period::Quarterly).expect("q");
        assert_eq!(quarterly.start, date("2025-04-01"));
    }

    #[test]
    fn test_boundaries_year_start() {
        let due = boundaries_entering(date("2026-01-01"));
        let periods: Vec<Period> = due.iter().map(|d| d.period).collect();
        assert!(periods.contains(&Period::Monthly));
        assert!(periods.contains(&Period::Quarterly));
        assert!(periods.contains(&Period::Yearly));
        let yearly = due.iter().find(|d| d.period == Period::Yearly).expect("y");
        assert_eq!(yearly.start, date("2025-01-01"));
    }

    #[test]
    fn test_gap_walk_two_idle_weeks() {
        // Last entry Sunday 2025-06-01; new commit Monday 2025-06-16.
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        crate::journal::writer::write_block(root, date("2025-06-01"), "### 09:00 AM — Commit aaa1111\n")
            .expect("write entry");

        let due = due_summaries(root, date("2025-06-01"), date("2025-06-16"));

        // Daily for the one day with entries
        assert!(due.contains(&DuePeriod {
            period: Period::Daily,
            start: date("2025-06-01")
        }));
        // Exactly the two idle weeks inside the gap. The week of 05-26
        // contains the last commit itself and is not the gap walk's to
        // produce; the week of 06-16 is in progress.
        let weeks: Vec<NaiveDate> = due
            .iter()
            .filter(|d| d.period == Period::Weekly)
            .map(|d| d.start)
            .collect();
        assert_eq!(weeks, vec![date("2025-06-02"), date("2025-06-09")]);
        // Monthly boundary for May was crossed on 06-01 before the last
        // commit, not in this gap
        assert!(due.iter().all(|d| d.period != Period::Monthly));
    }

    #[test]
    fn test_existing_summary_not_due() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        crate::journal::writer::write_block(root, date("2025-06-01"), "### 09:00 AM — Commit aaa1111\n")
            .expect("write entry");

        let path = summary_path(root, Period::Daily, date("2025-06-01"));
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "# Daily Summary — 2025-06-01\n").expect("write summary");

        let due = due_summaries(root, date("2025-06-01"), date("2025-06-03"));
        assert!(due.iter().all(|d| d.period != Period::Daily));
    }

    #[test]
    fn test_same_day_has_nothing_due() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(due_summaries(tmp.path(), date("2025-06-05"), date("2025-06-05")).is_empty());
    }

    #[test]
    fn test_no_activity_render() {
        let due = DuePeriod {
            period: Period::Weekly,
            start: date("2025-06-02"),
        };
        let content = render_summary_file(&due, NO_ACTIVITY, &[]);
        assert!(content.starts_with("# Weekly Summary — 2025-06-02"));
        assert!(content.contains(NO_ACTIVITY));
        assert!(!content.contains("## Sources"));
    }

    #[test]
    fn test_render_with_links() {
        let due = DuePeriod {
            period: Period::Daily,
            start: date("2025-06-01"),
        };
        let content = render_summary_file(
            &due,
            "Fixed the merge ordering.",
            &["../../daily/2025-06-01-journal.md".to_string()],
        );
        assert!(content.contains("[../../daily/2025-06-01-journal.md](../../daily/2025-06-01-journal.md)"));
    }
}
