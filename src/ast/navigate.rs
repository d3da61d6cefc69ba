//! Span-addressable AST navigation, grounded on
//! `mastercyb-trident/src/ast/navigate.rs`. Used by the semantic analyzer
//! for forward references and by any future editor integration (out of
//! scope) that needs "find the declaration at this position."

use super::{Decl, File};
use crate::span::Span;

/// Find a top-level declaration by name.
pub fn find_decl<'a>(file: &'a File, name: &str) -> Option<&'a Decl> {
    file.decls.iter().find(|d| d.name() == Some(name))
}

/// Find the top-level declaration whose span contains `pos` (byte offset
/// within `pos.file_id`).
pub fn find_decl_at(file: &File, pos: Span) -> Option<&Decl> {
    file.decls
        .iter()
        .find(|d| contains(d.span(), pos))
}

fn contains(outer: Span, inner: Span) -> bool {
    outer.file_id == inner.file_id && outer.start <= inner.start && inner.end <= outer.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse(src: &str) -> File {
        let (tokens, _comments, _diags) = crate::lexer::Lexer::new(src, 0).tokenize();
        Parser::new(tokens, 0).parse_file().0
    }

    #[test]
    fn finds_function_by_name() {
        let file = parse("fun main() -> u8 { return 0; }\n");
        assert!(find_decl(&file, "main").is_some());
        assert!(find_decl(&file, "nope").is_none());
    }
}
