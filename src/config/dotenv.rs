use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Reads `KEY=value` pairs from a `.env` file. A missing file yields no pairs.
pub(super) fn load(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse(raw.as_str()))
}

pub(super) fn parse(raw: &str) -> HashMap<String, String> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let assignment = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);
    let (key, value) = assignment.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

/// Quoted values are taken verbatim; bare values lose a trailing ` # comment`.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    match value.split_once(" #") {
        Some((bare, _)) => bare.trim_end(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_keys_are_read_from_env_file_lines() {
        let pairs = parse(
            "# provider\nexport GEMINI_API_KEY=\"abc 123\"\nREVERSE_AI_MODEL=flash # pinned\nREVERSE_AI_BIND='0.0.0.0:9000'\nEMPTY=\n=orphan\nnot an assignment\n",
        );
        assert_eq!(pairs.get("GEMINI_API_KEY").map(String::as_str), Some("abc 123"));
        assert_eq!(pairs.get("REVERSE_AI_MODEL").map(String::as_str), Some("flash"));
        assert_eq!(pairs.get("REVERSE_AI_BIND").map(String::as_str), Some("0.0.0.0:9000"));
        assert_eq!(pairs.get("EMPTY").map(String::as_str), Some(""));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn lone_quote_is_kept_as_value() {
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("'abc"), "'abc");
    }

    #[test]
    fn missing_env_file_yields_no_pairs() {
        let path = std::env::temp_dir()
            .join(format!("reverse_ai_env_{}", uuid::Uuid::new_v4()))
            .join(".env");
        assert!(load(path.as_path()).expect("missing file is fine").is_empty());
    }
}
