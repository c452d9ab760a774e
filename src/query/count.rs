use super::Context;
use crate::protocol::Reply;

/// COUNT(key): 1 if present (and unexpired), else 0 — reported as a VAL
/// NUMBER rather than a bare boolean so it composes with the same reply
/// family every other read-like op uses.
pub fn count(ctx: &mut Context, key: &[u8]) -> Reply {
    let present = super::resolve_live(ctx, key).is_some();
    Reply::Val {
        encoding: 1, // Encoding::Number
        value: if present { b"1".to_vec() } else { b"0".to_vec() },
    }
}
