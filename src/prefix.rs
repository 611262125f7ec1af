//! Shortest-prefix separators for the index layer.
//!
//! The index never stores a full key next to a child pointer — only
//! enough of the key to route correctly. This module is the pure,
//! allocation-free core that the rest of the crate is built on, the
//! same way [`crate::encoding`] is the leaf the on-disk structures sit
//! on top of.
//!
//! Both functions assume their inputs are ordinary byte strings and
//! that callers compare `a < b`; they do not themselves enforce
//! ordering.

/// Length of the longest common prefix of `a` and `b`.
pub fn common_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Shortest prefix of `b` that is still strictly greater than `a`.
///
/// Callers must guarantee `b > a` (as bytes, lexicographically).
/// When `a` is empty the result is `b`'s first byte. The behavior is
/// unspecified if `a == b`.
pub fn significant<'b>(a: &[u8], b: &'b [u8]) -> &'b [u8] {
    let cl = common_len(a, b);
    &b[..cl + 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_len_identical() {
        assert_eq!(common_len(b"hi", b"hi"), 2);
    }

    #[test]
    fn common_len_partial() {
        assert_eq!(common_len(b"hi", b"hip"), 2);
        assert_eq!(common_len(b"hi", b"ho"), 1);
        assert_eq!(common_len(b"", b"abc"), 0);
    }

    #[test]
    fn significant_minimality() {
        assert_eq!(significant(b"hi", b"hip"), b"hip");
        assert_eq!(significant(b"hi", b"ho"), b"ho");
        assert_eq!(significant(b"", b"abc"), b"a");
    }

    #[test]
    fn significant_borrows_from_b() {
        let b = b"zzzzz".to_vec();
        let sep = significant(b"a", &b);
        assert_eq!(sep, b"z");
    }
}
