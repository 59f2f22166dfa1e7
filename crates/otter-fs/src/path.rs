//! Lexical path helpers. Nothing here touches a binding.

/// Collapse `.`, `..`, repeated and trailing separators.
pub fn normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !is_absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if is_absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Every prefix of `path` that names a directory, shallowest first, in the
/// caller's spelling. `"a/b/c"` yields `a`, `a/b`, `a/b/c`.
pub fn prefixes(path: &str) -> Vec<&str> {
    let trimmed = path.trim_end_matches('/');
    let mut out: Vec<&str> = trimmed
        .match_indices('/')
        .map(|(idx, _)| &trimmed[..idx])
        .filter(|prefix| !prefix.is_empty() && !prefix.ends_with('/'))
        .collect();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
    out
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Split into parent and final component. The parent of a single relative
/// component is `"."`.
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (".", trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots_and_separators() {
        assert_eq!(normalize("/foo//bar/./baz/../qux/"), "/foo/bar/qux");
        assert_eq!(normalize("a/../../b"), "../b");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("./"), ".");
    }

    #[test]
    fn prefixes_keep_the_callers_spelling() {
        assert_eq!(prefixes("a/b/c"), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(prefixes("/x/y/"), vec!["/x", "/x/y"]);
        assert_eq!(prefixes("a//b"), vec!["a", "a//b"]);
    }

    #[test]
    fn split_parent_handles_root_and_relative() {
        assert_eq!(split_parent("/a"), ("/", "a"));
        assert_eq!(split_parent("a/b/"), ("a", "b"));
        assert_eq!(split_parent("file"), (".", "file"));
    }
}
