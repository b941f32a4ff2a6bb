//! The built-in narrative-guidance corpus.
//!
//! Versioned with the binary the same way prompt templates are: changing a
//! chunk means shipping a new build. Indexed into the vector store at
//! startup; never mutated at runtime.

use showrunner_domain::{RuleCategory, RuleChunk};

fn chunk(id: &str, category: RuleCategory, tags: &[&str], content: &str) -> RuleChunk {
    RuleChunk {
        id: id.to_string(),
        category,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        content: content.to_string(),
    }
}

/// The full static corpus.
pub fn builtin_chunks() -> Vec<RuleChunk> {
    use RuleCategory::*;

    vec![
        // ── Narrative scales ────────────────────────────────────────────
        chunk("scale_personal", Scale, &["personal", "intimate"],
            "Personal scale: stakes are one heart, one promise, one meal shared. Keep the camera \
             close. Victories are measured in trust earned, not territory."),
        chunk("scale_local", Scale, &["local", "town"],
            "Local scale: a town, a guild, a mountain pass. Name shopkeepers and guards. \
             Consequences ripple through streets the player can walk again tomorrow."),
        chunk("scale_continental", Scale, &["continental", "war"],
            "Continental scale: armies, borders, succession crises. Give factions faces. Cut \
             between throne rooms and muddy roads so scope never erases people."),
        chunk("scale_planetary", Scale, &["planetary"],
            "Planetary scale: civilizations, cataclysms, world-engines. Anchor every global event \
             to one witness on the ground or the stakes turn abstract."),
        chunk("scale_cosmic", Scale, &["cosmic"],
            "Cosmic scale: gods, voids, concepts given teeth. Keep human-scale texture in the \
             frame — a cup of tea before the heavens split — or awe collapses into noise."),
        chunk("scale_mythic", Scale, &["mythic"],
            "Mythic scale: the story knows it is a story. Prophecies rhyme, cycles close. \
             Foreshadowing planted in act one must return transformed."),

        // ── DNA narration guidance ──────────────────────────────────────
        chunk("dna_comedy_vs_drama_low", Dna, &["comedy_vs_drama", "low"],
            "comedy_vs_drama low — comedy-forward narration: deflate tension with timing, not mockery. Let absurd \
             logistics complicate fights. Punchlines land at paragraph ends."),
        chunk("dna_comedy_vs_drama_high", Dna, &["comedy_vs_drama", "high"],
            "comedy_vs_drama high — drama-forward narration: hold silences. Let consequences sit un-softened for a full \
             beat before anyone jokes. Humor only as pressure release, never as escape hatch."),
        chunk("dna_power_fantasy_vs_struggle_low", Dna, &["power_fantasy_vs_struggle", "low"],
            "power_fantasy_vs_struggle low — power-fantasy narration: competence is the pleasure. Show mastery through casual \
             detail — enemies react, bystanders gawk. Never fake weakness to create stakes."),
        chunk("dna_power_fantasy_vs_struggle_high", Dna, &["power_fantasy_vs_struggle", "high"],
            "power_fantasy_vs_struggle high — struggle narration: every victory costs something visible — breath, blood, time, \
             pride. Let failure teach. The body keeps the score between scenes."),
        chunk("dna_grounded_vs_absurd_low", Dna, &["grounded_vs_absurd", "low"],
            "grounded_vs_absurd low — grounded narration: physics and logistics hold. Injuries persist. Magic has rules \
             the prose respects even when characters don't."),
        chunk("dna_grounded_vs_absurd_high", Dna, &["grounded_vs_absurd", "high"],
            "grounded_vs_absurd high — absurd narration: the world bends for the bit. Escalate cheerfully past realism, \
             but keep emotional logic airtight — feelings are the one thing never played false."),
        chunk("dna_fast_vs_slow_low", Dna, &["fast_vs_slow", "low"],
            "fast_vs_slow low — fast pacing: scenes end one line after their point is made. Skip travel unless \
             something happens on the road. Timeskips are allowed mid-arc."),
        chunk("dna_fast_vs_slow_high", Dna, &["fast_vs_slow", "high"],
            "fast_vs_slow high — slow pacing: linger. Meals, training repetitions, weather. Progress is earned in \
             increments the reader can count."),

        // ── Genre frameworks ────────────────────────────────────────────
        chunk("genre_shonen", Genre, &["shonen", "tournament", "rival"],
            "Shonen structure: escalation ladders, named techniques, rivals who convert to \
             allies. Training sequences pay off visibly. Willpower is a resource the narration \
             treats as real."),
        chunk("genre_seinen", Genre, &["seinen"],
            "Seinen structure: moral cost up front. Institutions fail; individuals compromise. \
             Violence is fast, ugly, and remembered by the survivors."),
        chunk("genre_isekai", Genre, &["isekai"],
            "Isekai structure: systems and interfaces are diegetic. The outsider's knowledge is \
             leverage. Comfort-building (a home, a shop, a found family) is a valid arc."),
        chunk("genre_mystery", Genre, &["mystery", "investigation"],
            "Mystery structure: clues on-screen before deductions. The narration may misdirect \
             but never lie. Each revelation re-prices earlier scenes."),
        chunk("genre_horror", Genre, &["horror"],
            "Horror structure: deny full view of the threat. Wrongness in small details first. \
             Safety is always conditional and recently negotiated."),
        chunk("genre_slice_of_life", Genre, &["slice_of_life"],
            "Slice-of-life structure: stakes are relational. Conflict resolves through \
             conversation and shared work. Seasons and festivals mark time."),
        chunk("genre_comedy", Genre, &["comedy"],
            "Comedy structure: setups are promises. Escalate a running gag exactly three times, \
             then subvert on the fourth. Embarrassment, not injury, is the cost of failure."),

        // ── OP tension sources ──────────────────────────────────────────
        chunk("op_tension_existential", OpTension, &["existential"],
            "Existential tension: the fight was never the question. What does overwhelming \
             strength leave to want? Boredom, disconnection, and meaning carry scenes where \
             victory is certain."),
        chunk("op_tension_social", OpTension, &["social"],
            "Social tension: power cannot make anyone love, trust, or understand you. Stakes \
             live in dinners, rumors, misread intentions — arenas where strength is useless."),
        chunk("op_tension_structural", OpTension, &["structural"],
            "Structural tension: one person cannot be everywhere. Institutions, laws, and \
             scarcity still bind. Winning the battle while the system wins the war is the shape \
             of a good arc."),
        chunk("op_tension_ensemble", OpTension, &["ensemble"],
            "Ensemble tension: the protagonist is safe; their people are not. Threats route \
             around the mountain to strike the village. Allies' growth carries the drama."),
        chunk("op_tension_control", OpTension, &["control"],
            "Control tension: the power wants out. Restraint is the real fight — every use \
             risks collateral the character must witness. Treat suppression as ongoing effort."),
        chunk("op_tension_consequence", OpTension, &["consequence"],
            "Consequence tension: every exercise of power rewrites the map. Factions respond, \
             markets shift, imitators rise. The drama is managing the wake, not the wave."),
        chunk("op_tension_burden", OpTension, &["burden"],
            "Burden tension: power isolates. Secrets must be kept, normal life performed. The \
             cost is paid in everything the character can no longer honestly share."),
        chunk("op_tension_moral", OpTension, &["moral"],
            "Moral tension: strength settles nothing worth settling. Put choices in front of \
             the character that no punch can resolve, and let the easy physical wins underline \
             the hard ethical ones."),
        chunk("op_tension_relational", OpTension, &["relational"],
            "Relational tension: the wanderer's curse — every bond formed is a bond that will \
             be outgrown or outlived. Connection is the risk the character keeps taking anyway."),
        chunk("op_tension_information", OpTension, &["information"],
            "Information tension: the character knows too much — loops, futures, hidden truths. \
             Acting on knowledge without revealing its source is the recurring bind."),

        // ── OP power expression ─────────────────────────────────────────
        chunk("op_expression_instantaneous", OpExpression, &["instantaneous"],
            "Instantaneous expression: resolution in one gesture. Spend the scene on approach \
             and reaction; the act itself takes a sentence. Comedy and awe both live in the \
             anticlimax."),
        chunk("op_expression_delayed", OpExpression, &["delayed"],
            "Delayed expression: power arrives after a held beat — a count of three, a drawn \
             breath. Build dread in the gap between decision and release."),
        chunk("op_expression_conditional", OpExpression, &["conditional"],
            "Conditional expression: the power has terms — time of day, a price, a permission. \
             Scenes gain structure from maneuvering the conditions into place."),
        chunk("op_expression_sealed", OpExpression, &["sealed"],
            "Sealed expression: full strength is locked behind restraint the character chose. \
             Partial releases are data points; the full unsealing is a once-an-arc event that \
             must cost something."),
        chunk("op_expression_derivative", OpExpression, &["derivative"],
            "Derivative expression: power flows through proxies — subordinates, constructs, \
             institutions. The character conducts; the orchestra acts. Command scenes replace \
             combat scenes."),
        chunk("op_expression_hidden", OpExpression, &["hidden"],
            "Hidden expression: strength stays off-screen to observers in-world. Engineer \
             situations where the audience sees what bystanders miss. Near-discovery is the \
             recurring set piece."),
        chunk("op_expression_passive", OpExpression, &["passive"],
            "Passive expression: the power simply is — an aura, an immortality, a presence. \
             It cannot be turned off, which makes ordinary moments (a handshake, a haircut) \
             quietly fraught."),

        // ── OP narrative focus ──────────────────────────────────────────
        chunk("op_focus_personal", OpFocus, &["personal"],
            "Personal focus: keep scenes on the protagonist's interiority and close bonds. \
             World events matter only as they press on those."),
        chunk("op_focus_faction", OpFocus, &["faction"],
            "Faction focus: the nation, guild, or company is a character. Give lieutenants \
             screen time, run logistics as drama, let org-chart problems be plot."),
        chunk("op_focus_ensemble", OpFocus, &["ensemble"],
            "Ensemble focus: rotate the spotlight. Side characters get arcs that complete \
             without the protagonist's intervention — that independence is the point."),
        chunk("op_focus_internal", OpFocus, &["internal"],
            "Internal focus: the battlefield is the self. Monologue, memory, and metaphor do \
             heavy lifting. External events are prompts for internal movement."),
        chunk("op_focus_mundane", OpFocus, &["mundane"],
            "Mundane focus: groceries, school festivals, part-time jobs — played completely \
             straight beside apocalyptic capability. The gap IS the genre."),
        chunk("op_focus_competition", OpFocus, &["competition"],
            "Competition focus: channel stakes into formal contests — tournaments, exams, \
             cook-offs. Rules create drama that raw power can't short-circuit."),
        chunk("op_focus_episodic", OpFocus, &["episodic"],
            "Episodic focus: arrive, become entangled, resolve, move on. Each location is a \
             complete story; the throughline is what traveling costs the traveler."),

        // ── Power tiers ─────────────────────────────────────────────────
        chunk("power_tier_t10", PowerTier, &["t10"],
            "T10 — human baseline. Stairs are a hazard, swords are lethal, planning beats \
             courage. Challenges: everything."),
        chunk("power_tier_t9", PowerTier, &["t9"],
            "T9 — peak human / awakened. Wins against squads, loses to armies. Named \
             techniques begin to matter."),
        chunk("power_tier_t8", PowerTier, &["t8"],
            "T8 — superhuman. Shrugs off small arms, levels a building with effort. Local \
             threats only; institutions can still corner them."),
        chunk("power_tier_t7", PowerTier, &["t7"],
            "T7 — city-class. A fight relocates the skyline. Collateral damage becomes a \
             narrative obligation, not a flourish."),
        chunk("power_tier_t6", PowerTier, &["t6"],
            "T6 — mountain-class. Terrain is ammunition. Mass evacuation is the realistic \
             response to their arrival."),
        chunk("power_tier_t5", PowerTier, &["t5"],
            "T5 — island/country-class. Nations plan around them like weather systems. \
             Peer fights are geological events."),
        chunk("power_tier_t4", PowerTier, &["t4"],
            "T4 — continental. Conventional stakes stop functioning; shift tension to what \
             strength cannot reach."),
        chunk("power_tier_t3", PowerTier, &["t3"],
            "T3 — planetary. The world survives them by their choice. Every scene implicitly \
             negotiates that choice."),
        chunk("power_tier_t2", PowerTier, &["t2"],
            "T2 — stellar/system-class. Physics is a suggestion. Ground stories in borrowed \
             smallness: a favorite café, one mortal friend."),
        chunk("power_tier_t1", PowerTier, &["t1"],
            "T1 — conceptual/cosmic. Conflict is only possible against peers or principles. \
             Stories become parables whether you want them to or not."),

        // ── Tier × scale compatibility ──────────────────────────────────
        chunk("compat_low_tier_personal", Compatibility, &["low_tier", "personal"],
            "Low tier at personal scale: the sweet spot. Every bruise is earned; every rescue \
             is a real risk. Lean into scarcity and recovery time."),
        chunk("compat_low_tier_wide", Compatibility, &["low_tier", "continental", "planetary"],
            "Low tier at wide scale: the underdog epic. The character matters through position, \
             knowledge, or alliances — never raw force. Show the gap honestly."),
        chunk("compat_mid_tier_local", Compatibility, &["mid_tier", "local", "personal"],
            "Mid tier at intimate scale: restraint is characterization. The strong person being \
             careful in a fragile world tells the audience who they are."),
        chunk("compat_mid_tier_wide", Compatibility, &["mid_tier", "continental"],
            "Mid tier at wide scale: war-asset drama. The character is a strategic resource \
             others scheme to own, aim, or neutralize."),
        chunk("compat_high_tier_personal", Compatibility, &["high_tier", "personal"],
            "High tier at personal scale: the god at the dinner table. Comedy or melancholy, \
             often both. The mismatch is the engine — never resolve it with a power-up for the \
             world."),
        chunk("compat_high_tier_cosmic", Compatibility, &["high_tier", "cosmic"],
            "High tier at cosmic scale: peer conflict restores ordinary dramaturgy — rivals, \
             politics, romance — just with galaxies for furniture."),

        // ── Tier ascension ceremonies ───────────────────────────────────
        chunk("ceremony_t10_t9", Ceremony, &["t10", "t9"],
            "T10→T9: the body moves before the thought finishes. Frame it as a threshold \
             crossed in motion — something impossible done unremarked, noticed only after."),
        chunk("ceremony_t9_t8", Ceremony, &["t9", "t8"],
            "T9→T8: the world goes quiet and slow for one breath. Old limits snap like thread. \
             Witnesses should look at the character differently from this scene on."),
        chunk("ceremony_t8_t7", Ceremony, &["t8", "t7"],
            "T8→T7: power stops being something used and becomes something restrained. The \
             ceremony is the first act of deliberate gentleness afterward."),
        chunk("ceremony_t7_t6", Ceremony, &["t7", "t6"],
            "T7→T6: nature acknowledges them — weather shifts, animals go still. Give the \
             moment a witness who has no words for it."),
        chunk("ceremony_t6_t5", Ceremony, &["t6", "t5"],
            "T6→T5: news of them now travels faster than they do. The ceremony is arriving \
             somewhere new and being already known."),
        chunk("ceremony_t5_t4", Ceremony, &["t5", "t4"],
            "T5→T4: maps become small. Frame the ascension from far above — and then cut to \
             the one small personal thing they refuse to let go of."),

        // ── Tension guidance for mismatched fights ──────────────────────
        chunk("tension_existential_op", Tension, &["existential", "op"],
            "Existential tension when the fight cannot be lost: make victory the problem. What does the win cost \
             bystanders, reveal to enemies, or confirm about the character's isolation?"),
        chunk("tension_social_op", Tension, &["social", "op"],
            "Social tension when combat is trivial: route stakes through witnesses. Who saw? What do they \
             want now? The fight is one paragraph; the aftermath is the scene."),
        chunk("tension_structural_op", Tension, &["structural", "op"],
            "Structural tension when one punch ends it: the system is the opponent. Warrants, councils, supply \
             lines, hostages. Strength wins moments; leverage wins arcs."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_ids_are_unique() {
        let chunks = builtin_chunks();
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before, "duplicate chunk ids in corpus");
    }

    #[test]
    fn test_corpus_covers_required_categories() {
        let chunks = builtin_chunks();
        for category in [
            RuleCategory::Scale,
            RuleCategory::Dna,
            RuleCategory::Genre,
            RuleCategory::Compatibility,
            RuleCategory::OpTension,
            RuleCategory::OpExpression,
            RuleCategory::OpFocus,
            RuleCategory::PowerTier,
            RuleCategory::Ceremony,
            RuleCategory::Tension,
        ] {
            assert!(
                chunks.iter().any(|c| c.category == category),
                "missing category {category:?}"
            );
        }
    }

    #[test]
    fn test_every_tier_has_guidance() {
        let chunks = builtin_chunks();
        for tier in 1..=10 {
            let id = format!("power_tier_t{tier}");
            assert!(chunks.iter().any(|c| c.id == id), "missing {id}");
        }
    }
}
