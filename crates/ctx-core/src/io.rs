use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Write the assembled prompt to `path` without ever leaving a half-written
/// file behind: the text goes to a hidden tempfile beside the target which
/// is then renamed over it.
pub fn write_output(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".coding-context-")
        .tempfile_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_parents_and_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/prompt.md");

        write_output(&path, "first").unwrap();
        write_output(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".coding-context-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
