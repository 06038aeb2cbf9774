use std::io::Write;
use std::path::Path;

use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use crate::eval::{RuleMatch, SubmissionRequest};

/// Parse a level name from config ("error", "warn", "info", "debug", "trace", "off").
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or_else(|_| {
        eprintln!("salloc-gate: unknown log level {name:?}, using info");
        LevelFilter::Info
    })
}

/// Install the diagnostic logger on stderr. Safe to call more than once;
/// later calls are ignored.
pub fn init(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never);
}

/// Append a decision record to the decision log.
/// Best-effort: failures are silently ignored (logging must never block the hook).
pub fn log_decision(path: &Path, req: &SubmissionRequest, result: &RuleMatch) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    else {
        return;
    };

    let line_truncated: String = req
        .submit_line()
        .unwrap_or("")
        .replace(['\t', '\n'], " ")
        .chars()
        .take(200)
        .collect();
    let ts = timestamp_now();

    let _ = writeln!(
        file,
        "{ts}\t{decision}\tuid={uid}\tgid={gid}\tpartition={partition}\t{line}\t{reason}",
        decision = result.decision.as_str(),
        uid = req.user_id,
        gid = req.group_id,
        partition = req.partition_label(),
        line = line_truncated,
        reason = result.reason.replace('\n', "; "),
    );
}

/// Current UTC time for decision records, e.g. `2024-02-29T12:34:56Z`.
fn timestamp_now() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_timestamp(since_epoch.as_secs())
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

fn format_timestamp(secs: u64) -> String {
    let (year, month, day) = civil_date(secs / SECS_PER_DAY);
    let of_day = secs % SECS_PER_DAY;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        of_day / 3600,
        of_day / 60 % 60,
        of_day % 60
    )
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Gregorian (year, month, day) of the given day count since 1970-01-01.
fn civil_date(mut days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    loop {
        let year_len = if is_leap_year(year) { 366 } else { 365 };
        if days < year_len {
            break;
        }
        days -= year_len;
        year += 1;
    }

    let feb = if is_leap_year(year) { 29 } else { 28 };
    let month_lens = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for len in month_lens {
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }
    (year, month, days + 1)
}
