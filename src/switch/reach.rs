/*!
Estimating whether a fused compare-and-branch can reach its target

The decision is made before the branch is emitted and, for forward branches, before the target is
bound, so it can only rely on a [`LabelHint`] from an earlier emission pass. Every estimate is padded
away from zero, and an unknown distance is never considered short: a short encoding which turns out
not to reach is a layout error, not something to be fixed up later.
*/
use crate::asm::encode::CBCOND_DISP_BITS;
use crate::asm::{Assembler, Label, LabelHint};
use crate::target::{TargetConfig, INSTRUCTION_SIZE};
use crate::util::is_simm;

/**
Estimate the displacement from `probe` to `target`, in bytes.

A bound target gives an exact displacement. Otherwise a valid hint gives the displacement measured in
the previous pass. Known displacements are padded by the configured slack away from zero; `None`
means the distance is unknown.
*/
pub fn estimate_displacement(
    asm: &Assembler,
    probe: usize,
    hint: &LabelHint,
    target: Label,
    config: &TargetConfig,
) -> Option<isize> {
    let disp = if let Some(position) = asm.label_position(target) {
        position as isize - probe as isize
    } else {
        hint.displacement()?
    };
    let slack = config.self_offset_slack() as isize;
    Some(if disp < 0 { disp - slack } else { disp + slack })
}

/// Whether a displacement, in bytes, is within the reach of a fused compare-and-branch
#[inline]
pub fn is_in_fused_reach(disp: isize) -> bool {
    disp != 0 && is_simm((disp / INSTRUCTION_SIZE as isize) as i64, CBCOND_DISP_BITS)
}

/// Whether a fused compare-and-branch at `probe` is certain to reach `target`
pub fn is_short_branch(
    asm: &Assembler,
    probe: usize,
    hint: &LabelHint,
    target: Label,
    config: &TargetConfig,
) -> bool {
    match estimate_displacement(asm, probe, hint, target, config) {
        Some(disp) => is_in_fused_reach(disp),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_distances_are_never_short() {
        let mut asm = Assembler::new();
        let l = asm.new_label();
        let hint = asm.request_hint(l);
        assert!(!is_short_branch(&asm, 0, &hint, l, &TargetConfig::default()));
    }

    #[test]
    fn backward_distances_are_exact_plus_slack() {
        let config = TargetConfig::default();
        let mut asm = Assembler::new();
        let l = asm.new_label();
        asm.bind(l).unwrap();
        for _ in 0..10 {
            asm.nop();
        }
        let hint = asm.request_hint(l);
        assert_eq!(
            estimate_displacement(&asm, 40, &hint, l, &config),
            Some(-48)
        );
        assert!(is_short_branch(&asm, 40, &hint, l, &config));
        // -512 instructions is the furthest reach; slack must keep the branch within it
        assert!(is_short_branch(&asm, 2040, &hint, l, &config));
        assert!(!is_short_branch(&asm, 2044, &hint, l, &config));
        assert!(is_short_branch(
            &asm,
            2048,
            &hint,
            l,
            &config.with_max_self_offset(0)
        ));
    }

    #[test]
    fn forward_distances_come_from_the_previous_pass() {
        let config = TargetConfig::default();
        let mut asm = Assembler::new();
        let near = asm.new_label();
        let far = asm.new_label();
        asm.request_hint(near);
        asm.request_hint(far);
        for _ in 0..100 {
            asm.nop();
        }
        asm.bind(near).unwrap();
        for _ in 0..500 {
            asm.nop();
        }
        asm.bind(far).unwrap();
        asm.reset();
        let hint = asm.request_hint(near);
        assert_eq!(
            estimate_displacement(&asm, 0, &hint, near, &config),
            Some(408)
        );
        assert!(is_short_branch(&asm, 0, &hint, near, &config));
        let hint = asm.request_hint(far);
        assert!(!is_short_branch(&asm, 0, &hint, far, &config));
    }

    #[test]
    fn reach_bounds() {
        assert!(!is_in_fused_reach(0));
        assert!(is_in_fused_reach(4));
        assert!(is_in_fused_reach(511 * 4));
        assert!(!is_in_fused_reach(512 * 4));
        assert!(is_in_fused_reach(-512 * 4));
        assert!(!is_in_fused_reach(-513 * 4));
    }
}
