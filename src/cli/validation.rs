//! CLI argument validation functions

use std::fs;
use std::path::PathBuf;

/// Longest accepted poll interval (one day)
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate the poll interval is between 1 second and one day
pub fn validate_poll_interval(secs_str: &str) -> Result<u64, String> {
    let secs: u64 = secs_str.parse().map_err(|_| {
        format!("Poll interval must be a whole number of seconds, got: '{}'", secs_str)
    })?;

    if secs == 0 {
        return Err("Poll interval must be at least 1 second".to_string());
    }
    if secs > MAX_POLL_INTERVAL_SECS {
        return Err(format!(
            "Poll interval cannot exceed {} seconds",
            MAX_POLL_INTERVAL_SECS
        ));
    }

    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_poll_interval_validation() {
        for valid in ["1", "60", "86400"] {
            assert!(validate_poll_interval(valid).is_ok(), "{valid} should be valid");
        }
        for invalid in ["0", "86401", "-5", "abc", ""] {
            assert!(validate_poll_interval(invalid).is_err(), "'{invalid}' should be invalid");
        }
    }

    #[test]
    fn test_config_file_path_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[application]").unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(validate_config_file_path(path).unwrap(), file.path());

        assert!(validate_config_file_path("/definitely/not/here.toml").is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(validate_config_file_path(dir.path().to_str().unwrap()).is_err());
    }
}
