//! Skip-list validation against the policies a group actually contains.

use attestguard_domain::unknown_skip_entries;
use std::collections::BTreeSet;
use tracing::warn;

/// Check `skip` against the resolved names of the policies in a group.
///
/// Unknown names are logged once each and returned; they never fail the call.
pub fn validate_skip_list<'a, I>(group: &str, skip: &[String], names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if skip.is_empty() {
        return Vec::new();
    }
    let known: BTreeSet<String> = names.into_iter().map(str::to_string).collect();
    let unknown: Vec<String> = unknown_skip_entries(skip, &known)
        .into_iter()
        .map(str::to_string)
        .collect();
    for name in &unknown {
        warn!(group = %group, policy = %name, "skip entry does not match any policy in the group");
    }
    unknown
}
