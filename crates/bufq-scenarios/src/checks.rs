//! Pass/fail verdicts over scenario reports.

use crate::config::StressConfig;
use crate::engine::{CloseDrainReport, StressReport};
use crate::stats::ScenarioStats;

pub type CheckResult = Result<(), String>;

/// Metadata recorded at allocation time must drain in allocation order.
pub fn verify_slot_fifo(delivered: &[usize], expected: usize) -> CheckResult {
    if delivered.len() != expected {
        return Err(format!(
            "drained {} messages (expected {expected})",
            delivered.len()
        ));
    }
    for (i, value) in delivered.iter().enumerate() {
        if *value != i {
            return Err(format!("position {i} carried metadata {value}"));
        }
    }
    Ok(())
}

/// Every message index must have been read exactly once.
pub fn verify_exactly_once(read_counts: &[u32]) -> CheckResult {
    for (x, count) in read_counts.iter().enumerate() {
        if *count != 1 {
            return Err(format!("message {x} was read {count} times"));
        }
    }
    Ok(())
}

/// Stress counters must balance: everything produced was consumed, and the
/// queue ended empty.
pub fn verify_stress(report: &StressReport, config: &StressConfig) -> CheckResult {
    verify_exactly_once(&report.read_counts)?;

    let ScenarioStats {
        produced, consumed, ..
    } = report.stats;
    if produced != config.messages {
        return Err(format!(
            "produced {produced} messages (expected {})",
            config.messages
        ));
    }
    if consumed != config.messages {
        return Err(format!(
            "consumed {consumed} messages (expected {})",
            config.messages
        ));
    }
    if report.final_stats.outstanding_slots() != 0 {
        return Err(format!(
            "{} slots still outstanding after drain",
            report.final_stats.outstanding_slots()
        ));
    }
    if report.final_stats.used_bytes() != 0 {
        return Err(format!(
            "{} arena bytes still held after drain",
            report.final_stats.used_bytes()
        ));
    }
    Ok(())
}

/// Closing must deliver the entire committed backlog, nothing more.
pub fn verify_drained(report: &CloseDrainReport) -> CheckResult {
    if report.produced == 0 {
        return Err("scenario produced nothing".into());
    }
    if report.consumed != report.produced {
        return Err(format!(
            "consumed {} of {} committed messages",
            report.consumed, report.produced
        ));
    }
    Ok(())
}
