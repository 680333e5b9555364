//! Human-readable rendering of supervisor reports

use std::time::Duration;

use corral_core::{ListEntry, RunState, StartReport, StatusReport};
use corral_util::format_duration;

pub fn print_started(report: &StartReport) {
    let mode = if report.pumped { " (log rotation on)" } else { "" };
    println!(
        "Started '{}' (pid {}), logging to {}{}",
        report.record.name,
        report.record.pid,
        report.record.log_path.display(),
        mode,
    );
}

pub fn print_restarted(report: &StartReport) {
    println!(
        "Restarted '{}' (pid {}), logging to {}",
        report.record.name,
        report.record.pid,
        report.record.log_path.display(),
    );
}

pub fn print_status(report: &StatusReport) {
    match report.state {
        RunState::Running => {
            // Both are always present when running
            let record = report.record.as_ref();
            let uptime = report.uptime_secs.unwrap_or(0);
            println!(
                "'{}' is running: pid {}, up {}, since {}",
                report.name,
                record.map(|r| r.pid).unwrap_or(0),
                format_duration(Duration::from_secs(uptime)),
                record.map(|r| r.start_time_human.as_str()).unwrap_or("?"),
            );
            if let Some(record) = record {
                println!("  cmd: {}", record.cmd.display());
                println!("  log: {}", record.log_path.display());
            }
        }
        RunState::NotRunning => println!("'{}' is not running", report.name),
    }
}

pub fn print_list(entries: &[ListEntry]) {
    if entries.is_empty() {
        println!("No recorded commands");
        return;
    }

    let name_width = entries
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(4)
        .max("NAME".len());

    println!("{:<name_width$}  {:>8}  {:<11}  {:>10}  CMD", "NAME", "PID", "STATE", "UPTIME");
    for entry in entries {
        let pid = entry.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let state = if entry.error.is_some() {
            "unreadable"
        } else {
            match entry.state {
                RunState::Running => "running",
                RunState::NotRunning => "not running",
            }
        };
        let uptime = entry
            .uptime_secs
            .map(|s| format_duration(Duration::from_secs(s)))
            .unwrap_or_else(|| "-".into());
        // An unreadable record's parse error replaces the command column
        let detail = entry
            .error
            .as_deref()
            .or(entry.cmd.as_deref())
            .unwrap_or("-");
        println!(
            "{:<name_width$}  {:>8}  {:<11}  {:>10}  {}",
            entry.name, pid, state, uptime, detail,
        );
    }
}
