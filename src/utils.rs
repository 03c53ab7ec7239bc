/// Joins a remote directory and an entry name with `/`.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Returns every prefix of a remote path, shortest first.
///
/// `"/a/b/c"` yields `"/a"`, `"/a/b"`, `"/a/b/c"`; relative paths stay relative.
pub fn ancestors(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut prefixes = Vec::new();

    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !current.is_empty() || absolute {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }

    prefixes
}

/// Splits a remote path into its parent directory and last component.
///
/// `"/a/b"` gives `("/a", "b")`, `"/a"` gives `("/", "a")` and a bare
/// name is relative to `"."`.
pub fn split(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => (".", path),
    }
}
