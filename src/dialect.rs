//! Identifier quoting and placeholder rendering.
//!
//! The builder walks the plan; the dialect only maps identifiers and
//! parameter slots to SQL fragments.

pub trait Dialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }
}

/// Double-quoted identifiers and `?` placeholders; the default everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {}
