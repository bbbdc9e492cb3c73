//! Path rules for the store.
//!
//! A resource path starts with '/', has no repeated slashes and no trailing
//! slash. A collection prefix is the same but always ends in exactly one '/'.
//! '..' is not resolved: `/foo/../baa` and `/baa` are different paths.

use crate::StoreError;

/// Collapse runs of '/' and strip a trailing '/'.
pub fn standardize(path: &str) -> Result<String, StoreError> {
    if !path.starts_with('/') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' && last_was_slash {
            continue;
        }
        last_was_slash = c == '/';
        out.push(c);
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    Ok(out)
}

/// Standardize a collection prefix, e.g. `//window` -> `/window/`.
pub fn standardize_prefix(prefix: &str) -> Result<String, StoreError> {
    let mut p = standardize(prefix)?;
    if !p.ends_with('/') {
        p.push('/');
    }
    Ok(p)
}

/// The collection owning `path`: everything up to and including the second '/'.
///
/// `/window/12` -> `/window/`, `/flash` -> None.
pub fn collection_of(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let end = rest.find('/')?;
    Some(&path[..end + 2])
}

/// Whether `path` equals or lies below one of `reserved`.
pub fn is_reserved(path: &str, reserved: &[String]) -> bool {
    reserved.iter().any(|r| {
        path == r
            || path
                .strip_prefix(r.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
