//! Attribute processing: `@abi`, `@extern`, `@interrupt`,
//! `@tsmc`, `@derive`. Unknown `@`-names are warnings, not errors
//! (forward-compatible).

use crate::abi::AbiKind;
use crate::ast::{Attribute, FunctionDecl};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::types::AbiSpec;

const KNOWN_ATTRIBUTES: &[&str] = &["abi", "extern", "interrupt", "tsmc", "derive"];

pub fn validate_attributes(f: &FunctionDecl, abi: AbiKind, diagnostics: &mut Vec<Diagnostic>) {
    for attr in &f.attributes {
        if !KNOWN_ATTRIBUTES.contains(&attr.name.as_str()) {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnknownAttribute,
                    format!("unknown attribute '@{}'", attr.name),
                    attr.span,
                )
                .with_help("unrecognized attributes are ignored, not rejected, for forward compatibility"),
            );
            continue;
        }
        if attr.name == "abi" {
            match &attr.arg {
                Some(raw) => {
                    if parse_abi_spec(raw).is_none() {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticKind::InvalidAbiSpec,
                            format!("malformed @abi spec '{}'", raw),
                            attr.span,
                        ));
                    }
                }
                None => diagnostics.push(Diagnostic::error(
                    DiagnosticKind::InvalidAbiSpec,
                    "@abi requires a string argument, e.g. @abi(\"register: A=x, HL=y\")",
                    attr.span,
                )),
            }
        }
        if attr.name == "extern" && f.body.is_some() {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnknownAttribute,
                    "'@extern' function has a body; the body is ignored",
                    attr.span,
                )
                .with_help("remove the body, or remove @extern"),
            );
        }
    }
    let _ = abi;
}

/// Parse `"register: A=x, HL=y"` into an `AbiSpec` mapping register names to
/// parameter/slot names. Returns `None` on malformed input.
pub fn parse_abi_spec(raw: &str) -> Option<AbiSpec> {
    let (kind, rest) = raw.split_once(':')?;
    if kind.trim() != "register" {
        return None;
    }
    let mut mapping = Vec::new();
    for entry in rest.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (reg, slot) = entry.split_once('=')?;
        mapping.push((reg.trim().to_string(), slot.trim().to_string()));
    }
    if mapping.is_empty() {
        return None;
    }
    Some(AbiSpec { raw: raw.to_string(), mapping })
}

pub fn find_abi_spec(attributes: &[Attribute]) -> Option<AbiSpec> {
    attributes
        .iter()
        .find(|a| a.name == "abi")
        .and_then(|a| a.arg.as_deref())
        .and_then(parse_abi_spec)
}

pub fn is_extern(attributes: &[Attribute]) -> bool {
    attributes.iter().any(|a| a.name == "extern")
}

pub fn interrupt_vector(attributes: &[Attribute]) -> Option<&str> {
    attributes.iter().find(|a| a.name == "interrupt").and_then(|a| a.arg.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_mapping() {
        let spec = parse_abi_spec("register: A=x, HL=y").unwrap();
        assert_eq!(spec.mapping, vec![("A".to_string(), "x".to_string()), ("HL".to_string(), "y".to_string())]);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse_abi_spec("stack: x, y").is_none());
    }

    #[test]
    fn rejects_empty_mapping() {
        assert!(parse_abi_spec("register:").is_none());
    }
}
