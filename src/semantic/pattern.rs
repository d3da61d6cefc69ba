//! Pattern checking: `case` exhaustiveness over enum scrutinees,
//! range-pattern integer requirement, redundant-arm detection.

use std::collections::HashSet;

use crate::ast::{CaseArm, Pattern};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::Span;

/// Verify that `arms` cover every variant of an enum with the given
/// variant names, or that a wildcard/guard arm is present. Reports
/// `NonExhaustivePattern` listing the missing variants, and
/// `RedundantPattern` for an arm that can never be reached because an
/// earlier arm (a wildcard, or a repeat of the same variant) already
/// covers it.
pub fn check_enum_exhaustiveness(variants: &[String], arms: &[CaseArm], scrutinee_span: Span, diagnostics: &mut Vec<Diagnostic>) {
    let mut covered: HashSet<&str> = HashSet::new();
    let mut has_catch_all = false;

    for arm in arms {
        if has_catch_all {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::RedundantPattern,
                "unreachable case arm: a previous wildcard already covers every value",
                scrutinee_span,
            ));
            continue;
        }
        match &arm.pattern {
            Pattern::Wildcard => has_catch_all = true,
            Pattern::Guarded(_) if arm.guard.is_none() => has_catch_all = true,
            Pattern::EnumVariant(name) => {
                if !covered.insert(name.as_str()) {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::RedundantPattern,
                        format!("variant '{}' is already covered by an earlier arm", name),
                        scrutinee_span,
                    ));
                }
            }
            _ => {}
        }
    }

    if has_catch_all {
        return;
    }

    let missing: Vec<&String> = variants.iter().filter(|v| !covered.contains(v.as_str())).collect();
    if !missing.is_empty() {
        let names = missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
        diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::NonExhaustivePattern,
                format!("non-exhaustive case: missing variant(s) {}", names),
                scrutinee_span,
            )
            .with_help("add arms for the missing variants, or a wildcard `_` arm"),
        );
    }
}

/// Range and plain-integer patterns require an integer scrutinee.
pub fn requires_integer_scrutinee(arms: &[CaseArm]) -> bool {
    arms.iter().any(|a| matches!(a.pattern, Pattern::Int(_) | Pattern::Range(_, _)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Spanned;

    fn arm(pattern: Pattern) -> CaseArm {
        CaseArm {
            pattern,
            guard: None,
            body: Spanned::dummy(crate::ast::Expr::IntLiteral(0)),
        }
    }

    #[test]
    fn flags_missing_variant() {
        let variants = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let arms = vec![arm(Pattern::EnumVariant("A".to_string())), arm(Pattern::EnumVariant("B".to_string()))];
        let mut diags = Vec::new();
        check_enum_exhaustiveness(&variants, &arms, Span::dummy(), &mut diags);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::NonExhaustivePattern));
    }

    #[test]
    fn wildcard_satisfies_exhaustiveness() {
        let variants = vec!["A".to_string(), "B".to_string()];
        let arms = vec![arm(Pattern::EnumVariant("A".to_string())), arm(Pattern::Wildcard)];
        let mut diags = Vec::new();
        check_enum_exhaustiveness(&variants, &arms, Span::dummy(), &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn full_coverage_without_wildcard_is_fine() {
        let variants = vec!["A".to_string(), "B".to_string()];
        let arms = vec![arm(Pattern::EnumVariant("A".to_string())), arm(Pattern::EnumVariant("B".to_string()))];
        let mut diags = Vec::new();
        check_enum_exhaustiveness(&variants, &arms, Span::dummy(), &mut diags);
        assert!(diags.is_empty());
    }
}
