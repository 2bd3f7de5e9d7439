use std::collections::BTreeSet;

/// Whether `name` is excluded by the attachment's skip list.
pub fn is_skipped(skip: &[String], name: &str) -> bool {
    skip.iter().any(|s| s == name)
}

/// Skip entries that do not name any known policy, in declaration order, deduplicated.
pub fn unknown_skip_entries<'a>(skip: &'a [String], known: &BTreeSet<String>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    skip.iter()
        .map(String::as_str)
        .filter(|s| !known.contains(*s))
        .filter(|s| seen.insert(*s))
        .collect()
}
