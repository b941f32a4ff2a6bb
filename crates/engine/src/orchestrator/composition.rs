//! Effective narrative composition: how the tier gap between the character
//! and the current threat (or the world's baseline) re-shapes each scene.

use showrunner_domain::{
    composition_for_gap, CompositionMode, CompositionSettings, OpSettings, PowerTier,
};

/// Recompute composition for the current scene. The threat tier comes from
/// the outcome judge when an opponent is on screen; otherwise the world's
/// baseline tier stands in. An active OP configuration raises the mode one
/// step whenever the character is at or above the reference tier.
pub fn effective_composition(
    world_tier: PowerTier,
    character_tier: PowerTier,
    op: &OpSettings,
    current_threat_tier: Option<PowerTier>,
) -> CompositionSettings {
    let reference = current_threat_tier.unwrap_or(world_tier);
    let differential = character_tier.gap_above(reference);
    let mut mode = composition_for_gap(differential);

    if op.enabled && differential >= 0 {
        mode = match mode {
            CompositionMode::Standard => CompositionMode::Blended,
            CompositionMode::Blended | CompositionMode::OpDominant => CompositionMode::OpDominant,
        };
    }

    CompositionSettings { mode, differential }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showrunner_domain::OpPreset;

    fn tier(t: &str) -> PowerTier {
        PowerTier::parse(t).expect("tier")
    }

    #[test]
    fn test_standard_at_parity() {
        let comp = effective_composition(tier("T8"), tier("T8"), &OpSettings::default(), None);
        assert_eq!(comp.mode, CompositionMode::Standard);
        assert_eq!(comp.differential, 0);
    }

    #[test]
    fn test_threat_tier_overrides_world_baseline() {
        // T6 character in a T8 world, but facing a T5 threat: outgunned
        let comp = effective_composition(
            tier("T8"),
            tier("T6"),
            &OpSettings::default(),
            Some(tier("T5")),
        );
        assert_eq!(comp.differential, -1);
        assert_eq!(comp.mode, CompositionMode::Standard);

        // Same character mopping up a T10 mob
        let comp = effective_composition(
            tier("T8"),
            tier("T6"),
            &OpSettings::default(),
            Some(tier("T10")),
        );
        assert_eq!(comp.differential, 4);
        assert_eq!(comp.mode, CompositionMode::OpDominant);
    }

    #[test]
    fn test_op_mode_raises_one_step() {
        let mut op = OpSettings::default();
        op.enable_preset(OpPreset::BoredGod);

        let comp = effective_composition(tier("T8"), tier("T8"), &op, None);
        assert_eq!(comp.mode, CompositionMode::Blended);

        let comp = effective_composition(tier("T10"), tier("T7"), &op, None);
        assert_eq!(comp.mode, CompositionMode::OpDominant);
    }

    #[test]
    fn test_op_mode_does_not_mask_being_outgunned() {
        let mut op = OpSettings::default();
        op.enable_preset(OpPreset::Restrainer);
        let comp = effective_composition(tier("T8"), tier("T9"), &op, Some(tier("T3")));
        assert_eq!(comp.mode, CompositionMode::Standard);
    }
}
