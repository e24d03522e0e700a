// One collection pass: CPU + memory + processes -> Snapshot.

use std::time::Instant;

use crate::error::Result;
use crate::models::{Snapshot, sort_by_cpu_desc};
use crate::probe::SystemProbe;

/// Runs exactly one pass over the required probes.
///
/// CPU and memory are required: if either fails there is no snapshot for this tick. A failed
/// process probe only means "no process data this tick" and yields an empty table.
/// Processes come out busiest first; `process_limit` keeps only the first N (0 keeps all).
/// `cpu.process_count` is the size of the full table, whatever the limit.
pub fn collect_snapshot(
    probe: &dyn SystemProbe,
    sequence: u64,
    process_limit: usize,
) -> Result<Snapshot> {
    let started = Instant::now();
    let timestamp_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                operation = "get_timestamp",
                "system time error"
            );
            0
        });

    let mut cpu = probe.cpu()?.normalized();
    let memory = probe.memory()?;
    let processes = match probe.processes() {
        Ok(mut p) => {
            // Counted from this tick's table, before the limit applies.
            cpu.process_count = p.len().min(u32::MAX as usize) as u32;
            sort_by_cpu_desc(&mut p);
            if process_limit > 0 {
                p.truncate(process_limit);
            }
            p
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                operation = "processes",
                "process table unavailable this tick"
            );
            vec![]
        }
    };

    tracing::debug!(
        operation = "collect_snapshot",
        sequence,
        processes = processes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot collected"
    );

    Ok(Snapshot {
        sequence,
        timestamp_ms,
        cpu,
        memory,
        processes,
    })
}
