//! Path key helpers for the expectations store.
//!
//! All three helpers are purely lexical: none of them touch the
//! filesystem, so a key can be computed for a path that no longer exists.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path string: collapse `.` components, redundant
/// separators, and `..` where a preceding component can absorb it.
///
/// `..` at the root collapses away; `..` at the head of a relative path is
/// preserved. A leading `~` is carried through as an ordinary component.
pub fn lexical_normalize(path: &str) -> String {
    let mut absolute = false;
    let mut parts: Vec<String> = Vec::new();

    for component in Path::new(path).components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => match parts.last().map(String::as_str) {
                Some("..") | None => {
                    if !absolute {
                        parts.push("..".to_string());
                    }
                }
                Some(_) => {
                    parts.pop();
                }
            },
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::Prefix(_) => {}
        }
    }

    if absolute {
        format!("/{}", parts.join("/"))
    } else if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Expand a leading `~` component to the given home directory. Paths
/// without a home marker pass through unchanged. Only the bare-`~` form is
/// recognized; `~user` is not.
pub fn expand_home(path: &str, home: Option<&Path>) -> crate::Result<PathBuf> {
    if path == "~" {
        return home
            .map(Path::to_path_buf)
            .ok_or_else(|| crate::GatewatchError::HomeDirUnavailable(path.to_string()));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home
            .map(|h| h.join(rest))
            .ok_or_else(|| crate::GatewatchError::HomeDirUnavailable(path.to_string()));
    }
    Ok(PathBuf::from(path))
}

/// Replace the home-directory prefix of `path` with `~`. Returns `None`
/// when `path` is neither the home directory nor a proper subpath of it.
pub fn contract_home(path: &str, home: &Path) -> Option<String> {
    match Path::new(path).strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => Some("~".to_string()),
        Ok(rest) => Some(format!("~/{}", rest.display())),
        Err(_) => None,
    }
}
