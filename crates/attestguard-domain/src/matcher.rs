//! Applicability rules: which policies and group material blocks apply to which evidence.

use attestguard_types::{EvalPhase, MaterialKind, PolicyAttachment};

/// Policy-to-material-type rule. An empty filter applies to every type.
pub fn policy_applies(filter: &[MaterialKind], kind: &MaterialKind) -> bool {
    filter.is_empty() || filter.contains(kind)
}

/// Combined attachment rule: the attachment's own type (if any) and the policy filter.
pub fn attachment_applies(
    attachment: &PolicyAttachment,
    policy_filter: &[MaterialKind],
    kind: &MaterialKind,
) -> bool {
    if let Some(t) = &attachment.material_type
        && !t.is_empty()
        && t != kind
    {
        return false;
    }
    policy_applies(policy_filter, kind)
}

/// Group-material-to-evidence rule.
///
/// `block_name` must already be interpolated. A named block matches by identifier
/// (and by type when one is declared too); an unnamed block is a wildcard over
/// its declared type, or over everything when no type is declared.
pub fn material_block_matches(
    block_name: Option<&str>,
    block_kind: Option<&MaterialKind>,
    evidence_id: &str,
    evidence_kind: &MaterialKind,
) -> bool {
    let kind_ok = match block_kind {
        Some(k) if !k.is_empty() => k == evidence_kind,
        _ => true,
    };
    match block_name.map(str::trim) {
        Some(name) if !name.is_empty() => name == evidence_id && kind_ok,
        _ => kind_ok,
    }
}

/// Phase gate. An empty list allows every phase.
pub fn phase_allows(phases: &[EvalPhase], current: EvalPhase) -> bool {
    phases.is_empty() || phases.contains(&current)
}
