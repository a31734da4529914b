//! Cross-component scenarios live under `tests/`; this crate has no
//! library surface of its own.
