//! Cassette files on disk

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::options::ErbOption;
use crate::interaction::Interaction;
use crate::{Result, VcrError};

/// Top-level key holding the interaction array
pub const HTTP_INTERACTIONS_KEY: &str = "http_interactions";

/// Top-level key holding the writer version
pub const RECORDED_WITH_KEY: &str = "recorded_with";

/// Version string written into every cassette
#[must_use]
pub fn recorded_with() -> String {
    format!("tapedeck {}", env!("CARGO_PKG_VERSION"))
}

/// Make a cassette name safe for use as a relative path.
///
/// Every run of characters outside `[A-Za-z0-9_/-]` collapses to a single `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/') {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }

    sanitized
}

/// `<library_dir>/<sanitized_name>.<extension>`
#[must_use]
pub fn cassette_path(library_dir: &Path, name: &str, extension: &str) -> PathBuf {
    library_dir.join(format!("{}.{extension}", sanitize_name(name)))
}

/// Whether a file exists and is non-empty
#[must_use]
pub fn file_has_content(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Read a cassette file, rendering templates when enabled.
///
/// Missing and empty files yield `None`.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read
pub fn read_cassette_file(path: &Path, erb: Option<&ErbOption>) -> Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if content.is_empty() {
        return Ok(None);
    }

    Ok(Some(match erb {
        Some(ErbOption::Variables(vars)) => render_template(&content, |name| {
            vars.get(name).map(String::as_str)
        }),
        _ => content,
    }))
}

/// Write a cassette file, creating parent directories as needed
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
pub fn write_cassette_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

/// Substitute `<%= name %>` placeholders; unknown names are left as written
fn render_template<'v>(content: &str, lookup: impl Fn(&str) -> Option<&'v str>) -> String {
    let mut rendered = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("<%=") {
        let Some(len) = rest[start..].find("%>") else {
            break;
        };
        let placeholder = &rest[start..start + len + 2];
        let name = placeholder[3..placeholder.len() - 2].trim();

        rendered.push_str(&rest[..start]);
        rendered.push_str(lookup(name).unwrap_or(placeholder));
        rest = &rest[start + len + 2..];
    }

    rendered.push_str(rest);
    rendered
}

/// Extract interactions from a decoded cassette document
///
/// # Errors
///
/// Returns `InvalidCassetteFormat` if the document is not a map with an
/// `http_interactions` array, or `Serialization` if an entry is malformed
pub fn parse_document(document: &Value, path: &Path) -> Result<Vec<Interaction>> {
    let entries = document
        .get(HTTP_INTERACTIONS_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| VcrError::InvalidCassetteFormat {
            path: path.to_path_buf(),
        })?;

    entries
        .iter()
        .map(|entry| Ok(serde_json::from_value(entry.clone())?))
        .collect()
}

/// Build the document written on eject
///
/// # Errors
///
/// Returns error if an interaction cannot be encoded
pub fn build_document(interactions: &[Interaction]) -> Result<Value> {
    Ok(json!({
        HTTP_INTERACTIONS_KEY: serde_json::to_value(interactions)?,
        RECORDED_WITH_KEY: recorded_with(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("foo bar/baz!"), "foo_bar/baz_");
        assert_eq!(sanitize_name("a  ::  b"), "a_b");
        assert_eq!(sanitize_name("already-safe/name_1"), "already-safe/name_1");
        assert_eq!(sanitize_name("ünïcode"), "_n_code");
    }

    #[test]
    fn test_cassette_path() {
        let path = cassette_path(Path::new("/fixtures"), "api/users list", "yml");
        assert_eq!(path, PathBuf::from("/fixtures/api/users_list.yml"));
    }

    #[test]
    fn test_missing_and_empty_files_read_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.yml");
        assert!(read_cassette_file(&missing, None).unwrap().is_none());
        assert!(!file_has_content(&missing));

        let empty = temp_dir.path().join("empty.yml");
        fs::write(&empty, "").unwrap();
        assert!(read_cassette_file(&empty, None).unwrap().is_none());
        assert!(!file_has_content(&empty));
    }

    #[test]
    fn test_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/deeper/cassette.yml");
        write_cassette_file(&path, "content").unwrap();
        assert!(file_has_content(&path));
    }

    #[test]
    fn test_render_template() {
        let mut vars = BTreeMap::new();
        vars.insert("host".to_string(), "api.example.com".to_string());

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("templated.yml");
        fs::write(&path, "uri: http://<%= host %>/<%=unknown%>").unwrap();

        let rendered = read_cassette_file(&path, Some(&ErbOption::Variables(vars))).unwrap();
        assert_eq!(
            rendered.as_deref(),
            Some("uri: http://api.example.com/<%=unknown%>")
        );

        let raw = read_cassette_file(&path, Some(&ErbOption::Enabled(false))).unwrap();
        assert_eq!(raw.as_deref(), Some("uri: http://<%= host %>/<%=unknown%>"));
    }

    #[test]
    fn test_parse_document_rejects_bare_array() {
        let result = parse_document(&json!([]), Path::new("old.yml"));
        assert!(matches!(result, Err(VcrError::InvalidCassetteFormat { .. })));

        let result = parse_document(&json!({"http_interactions": {}}), Path::new("old.yml"));
        assert!(matches!(result, Err(VcrError::InvalidCassetteFormat { .. })));
    }

    #[test]
    fn test_build_document_shape() {
        let document = build_document(&[]).unwrap();
        assert_eq!(document[HTTP_INTERACTIONS_KEY], json!([]));
        assert!(document[RECORDED_WITH_KEY]
            .as_str()
            .unwrap()
            .starts_with("tapedeck "));
    }
}
