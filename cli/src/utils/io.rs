use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

/// Pretty-print `value` as JSON to `output`, or stdout when unset.
pub fn write_report<T: Serialize>(value: &T, output: Option<&Path>) -> io::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, body + "\n"),
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "{}", body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&serde_json::json!({ "count": 2 }), Some(&path)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["count"], 2);
    }
}
