//! Calling-convention / parameter-passing policy: register, stack,
//! SMC, or TSMC ABI, selected per function by attributes and a small
//! default heuristic.

use crate::ast::FunctionDecl;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbiKind {
    Register,
    Stack,
    Smc,
    Tsmc,
}

/// Parameter-passing policy: `@tsmc` forces TSMC; `@interrupt`
/// disables SMC (interrupt entry must be re-entrant); otherwise register
/// ABI for small parameter counts, stack ABI otherwise. The threshold of 3
/// is the Z80 default (three single-byte/word values fit comfortably in
/// BC/DE/HL); other backends may override it (`policy_for_threshold`).
pub fn policy_for(f: &FunctionDecl, param_count: usize) -> AbiKind {
    policy_for_threshold(f, param_count, 3)
}

pub fn policy_for_threshold(f: &FunctionDecl, param_count: usize, register_threshold: usize) -> AbiKind {
    let has_tsmc = f.attributes.iter().any(|a| a.name == "tsmc");
    let is_interrupt = f.attributes.iter().any(|a| a.name == "interrupt");

    if has_tsmc && !is_interrupt {
        return AbiKind::Tsmc;
    }
    if is_interrupt {
        return if param_count <= register_threshold { AbiKind::Register } else { AbiKind::Stack };
    }
    if param_count <= register_threshold {
        AbiKind::Register
    } else {
        AbiKind::Stack
    }
}

/// Whether `abi` may be realized on a ROM-resident target: SMC/TSMC
/// write into code, which a ROM target cannot do.
pub fn allowed_on_rom(abi: AbiKind) -> bool {
    !matches!(abi, AbiKind::Smc | AbiKind::Tsmc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Spanned;

    fn func(attrs: &[&str], param_count: usize) -> FunctionDecl {
        FunctionDecl {
            is_pub: false,
            attributes: attrs
                .iter()
                .map(|name| crate::ast::Attribute { name: name.to_string(), arg: None, span: crate::span::Span::dummy() })
                .collect(),
            name: Spanned::dummy("f".to_string()),
            params: (0..param_count)
                .map(|i| crate::ast::Param {
                    name: Spanned::dummy(format!("p{i}")),
                    ty: Spanned::dummy(crate::ast::TypeExpr::Named("u8".to_string())),
                })
                .collect(),
            return_ty: None,
            body: None,
            span: crate::span::Span::dummy(),
        }
    }

    #[test]
    fn tsmc_attribute_forces_tsmc_abi() {
        let f = func(&["tsmc"], 2);
        assert_eq!(policy_for(&f, 2), AbiKind::Tsmc);
    }

    #[test]
    fn interrupt_disables_smc_even_with_tsmc_requested() {
        let f = func(&["tsmc", "interrupt"], 2);
        assert_eq!(policy_for(&f, 2), AbiKind::Register);
    }

    #[test]
    fn small_param_count_defaults_to_register() {
        let f = func(&[], 2);
        assert_eq!(policy_for(&f, 2), AbiKind::Register);
    }

    #[test]
    fn large_param_count_defaults_to_stack() {
        let f = func(&[], 5);
        assert_eq!(policy_for(&f, 5), AbiKind::Stack);
    }

    #[test]
    fn smc_and_tsmc_are_not_allowed_on_rom() {
        assert!(!allowed_on_rom(AbiKind::Smc));
        assert!(!allowed_on_rom(AbiKind::Tsmc));
        assert!(allowed_on_rom(AbiKind::Register));
        assert!(allowed_on_rom(AbiKind::Stack));
    }
}
