//! End-to-end scenarios spanning `builder` and `reader` together.
//! Per-component unit tests live alongside their own modules; these
//! exercise the full write-then-read round trip the way a consumer
//! would.

mod tests_roundtrip;
