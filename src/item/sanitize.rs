use std::collections::HashSet;

/// Normalizes a single header key into `[a-z0-9_]`.
///
/// Surrounding whitespace is trimmed, runs of whitespace, `-` and `_` become
/// one underscore, everything else that is not an ASCII letter or digit is
/// dropped. The result may be empty.
pub fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut separator = false;

    for c in key.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            separator = true;
        } else if c.is_ascii_alphanumeric() {
            if separator && !out.is_empty() {
                out.push('_');
            }
            separator = false;
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// Sanitizes a whole header row.
///
/// Keys that sanitize to nothing are named `column_<n>` after their 1-based
/// position. Collisions get the smallest `_<n>` suffix (from 2) that no other
/// key of the row uses. Applying it to its own output changes nothing.
///
/// # Examples
///
/// ```
/// use tabutils::item::sanitize::sanitize_keys;
///
/// let keys = sanitize_keys(&["Some Date", "Some Value", "some-value", "©"]);
/// assert_eq!(keys, vec!["some_date", "some_value", "some_value_2", "column_4"]);
/// assert_eq!(sanitize_keys(&keys), keys);
/// ```
pub fn sanitize_keys<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    let bases: Vec<String> = keys
        .iter()
        .enumerate()
        .map(|(index, key)| {
            let key = sanitize_key(key.as_ref());
            if key.is_empty() {
                format!("column_{}", index + 1)
            } else {
                key
            }
        })
        .collect();

    let reserved: HashSet<&str> = bases.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(bases.len());
    let mut out = Vec::with_capacity(bases.len());

    for base in &bases {
        let key = if used.contains(base) {
            (2..)
                .map(|n| format!("{}_{}", base, n))
                .find(|candidate| !used.contains(candidate) && !reserved.contains(candidate.as_str()))
                .unwrap_or_else(|| base.clone())
        } else {
            base.clone()
        };
        used.insert(key.clone());
        out.push(key);
    }
    out
}

/// Keys used when a source has no header row.
pub fn generated_keys(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("column_{}", n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_should_be_lowercased_and_restricted() {
        assert_eq!(sanitize_key("Sparse Data"), "sparse_data");
        assert_eq!(sanitize_key("  Unicode  Test "), "unicode_test");
        assert_eq!(sanitize_key("price ($)"), "price");
        assert_eq!(sanitize_key("a__b--c"), "a_b_c");
        assert_eq!(sanitize_key("_leading"), "leading");
        assert_eq!(sanitize_key("Ādam"), "dam");
    }

    #[test]
    fn duplicates_should_get_unused_suffixes() {
        let keys = sanitize_keys(&["a", "A", "a_2", "a"]);
        assert_eq!(keys, vec!["a", "a_3", "a_2", "a_4"]);
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        let headers = ["Name", "name", "E-mail", "", "Zip Code", "zip_code"];
        let once = sanitize_keys(&headers);
        let twice = sanitize_keys(&once);

        assert_eq!(once, twice);
        let unique: HashSet<&String> = once.iter().collect();
        assert_eq!(unique.len(), once.len());
    }

    #[test]
    fn generated_keys_are_one_based() {
        assert_eq!(generated_keys(3), vec!["column_1", "column_2", "column_3"]);
    }
}
