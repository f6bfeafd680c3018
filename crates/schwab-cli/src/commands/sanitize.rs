use schwab_api_wrapper::sanitize::sanitize_dir;
use serde_json::{json, Value};
use tracing::error;

use crate::cli::SanitizeArgs;
use crate::error::CliError;

/// Runs without credentials; only the file system is touched.
pub fn run(args: &SanitizeArgs) -> Result<Value, CliError> {
    let report = sanitize_dir(&args.input, &args.output)?;

    let failed = report.failures().count();
    if failed > 0 {
        for failure in report.failures() {
            if let Err(reason) = &failure.result {
                error!(input = %failure.input.display(), %reason, "file not sanitized");
            }
        }
        return Err(CliError::SanitizeIncomplete {
            failed,
            total: report.files.len(),
        });
    }

    let written: Vec<String> = report
        .files
        .iter()
        .map(|file| file.output.display().to_string())
        .collect();
    Ok(json!({ "written": report.written(), "files": written }))
}
