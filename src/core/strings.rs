//! String and path-name helpers shared across the engine. Pure functions,
//! no I/O. Paths are handled as forward-slash strings because that is what
//! package files contain.

/// Strips one outermost pair of single or double quotes, if present.
/// Mismatched or absent quotes leave the input untouched.
pub fn remove_quotes(s: &str) -> &str {
    let first = s.find(['\'', '"']);
    let last = s.rfind(['\'', '"']);
    match (first, last) {
        (Some(f), Some(l)) if f < l => &s[f + 1..l],
        _ => s,
    }
}

/// Collapses runs of `/` into a single slash.
pub fn collapse_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_slash = false;
    for c in input.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

pub fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

pub fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Drops the extension from a file name, keeping everything before the last
/// dot. Names without a dot pass through unchanged.
pub fn drop_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) => &filename[..pos],
        None => filename,
    }
}

/// Last path component. A trailing slash (directory form) is ignored, so
/// `a/b/` and `a/b` both yield `b`.
pub fn name_from_path(path: &str) -> &str {
    let trimmed = strip_trailing_slash(path);
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Everything up to and including the last `/`.
pub fn parent_dir_from_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos + 1],
        None => path,
    }
}

/// Name of the directory containing the last path component. Wrapped in
/// double quotes when it contains whitespace so it can be re-embedded in a
/// command line.
pub fn parent_dir_name_from_path(path: &str) -> String {
    let trimmed = strip_trailing_slash(path);
    let Some(last_slash) = trimmed.rfind('/') else {
        return String::new();
    };
    let Some(second_last) = trimmed[..last_slash].rfind('/') else {
        return String::new();
    };
    let name = &trimmed[second_last + 1..last_slash];
    if name.contains(char::is_whitespace) {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

/// The value part of a `key=value` line, trimmed. Empty when there is no `=`.
pub fn value_from_line(line: &str) -> &str {
    match line.find('=') {
        Some(pos) => line[pos + 1..].trim(),
        None => "",
    }
}
