use attestguard_types::PolicyKind;

/// WebAssembly binary magic: `\0asm`.
const WASM_MAGIC: &[u8] = b"\0asm";

/// Detect the policy language from its bytes. Anything that is not WASM is Rego.
pub fn detect_policy_kind(body: &[u8]) -> PolicyKind {
    if body.starts_with(WASM_MAGIC) {
        PolicyKind::Wasm
    } else {
        PolicyKind::Rego
    }
}
