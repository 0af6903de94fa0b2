use std::fmt;
use std::io::Write;

use tracing::warn;

use crate::validation::ValidationResult;

/// Writes one line to the output sink. Sink failures are logged, never
/// propagated.
pub fn emit(out: &mut (dyn Write + Send), line: fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{line}") {
        warn!(error = %e, "failed to write to output");
    }
}

/// Human-readable report of a finished validation task.
pub fn write_result(out: &mut (dyn Write + Send), result: &ValidationResult) {
    for entry in &result.entries {
        let verdict = if entry.passed() { "PASS" } else { "FAIL" };
        emit(out, format_args!("Sub-test: {} [{verdict}]", entry.name));
        match &entry.error {
            Some(detail) => {
                if !detail.error_msg.is_empty() {
                    emit(out, format_args!("  error: {}", detail.error_msg));
                }
                emit(out, format_args!("  request id: {}", detail.req_id));
                emit(out, format_args!("  remote: {}", detail.remote));
                emit(out, format_args!("  local: {}", detail.local));
            }
            None => emit(out, format_args!("  message: {}", entry.message)),
        }
        emit(out, format_args!("------------------------"));
    }
    let failed = result.failed().count();
    emit(
        out,
        format_args!(
            "Validation task {} completed: {} passed, {} failed",
            result.task_id,
            result.entries.len() - failed,
            failed
        ),
    );
}
