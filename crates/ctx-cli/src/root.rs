use std::path::{Path, PathBuf};

/// Resolve the directory a run works in.
///
/// `--dir` / `CODING_CONTEXT_DIR` wins, made absolute against the current
/// directory; otherwise the current directory itself.
pub fn resolve_dir(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match explicit {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => cwd.join(p),
        None => cwd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_absolute_dir_is_kept() {
        assert_eq!(resolve_dir(Some(Path::new("/srv/app"))), PathBuf::from("/srv/app"));
    }

    #[test]
    fn relative_dir_is_joined_to_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolve_dir(Some(Path::new("sub"))), cwd.join("sub"));
        assert_eq!(resolve_dir(None), cwd);
    }
}
