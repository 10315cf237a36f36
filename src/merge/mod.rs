/// Trait for implementing custom merge operators
///
/// A merge operator folds the chain of `Merge` records recorded for a single
/// user key (plus the `Set` base value, if one exists below them) into the
/// one value a reader observes.
///
/// The iterator core applies the fold pairwise. `newer` is the operand
/// nearer the newest version of the key and `older` the operand nearer the
/// oldest; the result written into `out` must equal folding the whole
/// version chain from oldest to newest. Operators must be associative under
/// this convention. They need not be commutative — but a non-commutative
/// operator depends on exactly this argument order, in both iteration
/// directions.
///
/// `out` is a scratch buffer owned by the caller. It is cleared before every
/// invocation and must not alias either operand; the iterator maintains two
/// value buffers and swaps their roles between folds for this reason.
pub trait MergeOperator: Send + Sync {
    /// Returns the name of this merge operator
    fn name(&self) -> &str;

    /// Folds two operands for `key`, writing the result into `out`.
    fn merge(&self, key: &[u8], newer: &[u8], older: &[u8], out: &mut Vec<u8>);
}

/// Built-in merge operator for appending byte strings
///
/// The folded value is the operands in oldest-to-newest order, concatenated.
pub struct ConcatMerge;

impl MergeOperator for ConcatMerge {
    fn name(&self) -> &str {
        "ConcatMerge"
    }

    fn merge(&self, _key: &[u8], newer: &[u8], older: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(older);
        out.extend_from_slice(newer);
    }
}

/// Built-in merge operator for integer counters
///
/// Interprets both operands as decimal i64 strings and adds them. Operands
/// that fail to parse count as zero.
pub struct CounterMerge;

impl CounterMerge {
    fn parse(operand: &[u8]) -> i64 {
        std::str::from_utf8(operand)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
    }
}

impl MergeOperator for CounterMerge {
    fn name(&self) -> &str {
        "CounterMerge"
    }

    fn merge(&self, _key: &[u8], newer: &[u8], older: &[u8], out: &mut Vec<u8>) {
        let sum = Self::parse(older) + Self::parse(newer);
        out.extend_from_slice(sum.to_string().as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(op: &dyn MergeOperator, newer: &[u8], older: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        op.merge(b"key", newer, older, &mut out);
        out
    }

    #[test]
    fn test_concat_orders_oldest_first() {
        let merged = apply(&ConcatMerge, b"new", b"old");
        assert_eq!(merged, b"oldnew");
    }

    #[test]
    fn test_concat_is_associative() {
        // Folding a, b, c oldest-to-newest must not depend on grouping.
        let left = apply(&ConcatMerge, b"c", &apply(&ConcatMerge, b"b", b"a"));
        let right = apply(&ConcatMerge, &apply(&ConcatMerge, b"c", b"b"), b"a");
        assert_eq!(left, b"abc");
        assert_eq!(left, right);
    }

    #[test]
    fn test_counter_merge() {
        assert_eq!(apply(&CounterMerge, b"5", b"10"), b"15");
        assert_eq!(apply(&CounterMerge, b"-2", b"16"), b"14");
    }

    #[test]
    fn test_counter_merge_garbage_operand() {
        assert_eq!(apply(&CounterMerge, b"oops", b"7"), b"7");
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(ConcatMerge.name(), "ConcatMerge");
        assert_eq!(CounterMerge.name(), "CounterMerge");
    }
}
