//! Property-based tests for confidence calibration caps.

use precedent_rank::{calibrate, CalibrationWeights, GateConfig, GateDecision, SignalReport};
use proptest::prelude::*;

fn arbitrary_report(
    detail_checked: bool,
    coverages: [f64; 5],
    flags: [bool; 10],
) -> SignalReport {
    SignalReport {
        detail_checked,
        contradiction: flags[0],
        hook_group_coverage: coverages[0],
        relation_satisfied: flags[1],
        outcome_polarity_satisfied: flags[2],
        actor_role_satisfied: flags[3],
        proceeding_role_satisfied: flags[4],
        chain_coverage: coverages[1],
        chain_satisfied: flags[5],
        mandatory_step_coverage: coverages[2],
        core_coverage: coverages[3],
        peripheral_coverage: coverages[4],
        required_coverage: coverages[3],
        required_components: 4,
        has_relation_sentence: flags[6],
        has_polarity_sentence: flags[7],
        has_hook_intersection_sentence: flags[8],
        has_role_sentence: flags[9],
        has_chain_sentence: flags[6],
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn confidence_never_exceeds_tier_caps(
        ranking in 0.0f64..=1.0,
        detail_checked in any::<bool>(),
        coverages in prop::array::uniform5(0.0f64..=1.0),
        flags in prop::array::uniform10(any::<bool>()),
    ) {
        let report = arbitrary_report(detail_checked, coverages, flags);
        let config = GateConfig::default();
        let weights = CalibrationWeights::default();
        for decision in [
            GateDecision::ExactStrict,
            GateDecision::ExactProvisional,
            GateDecision::NearMiss,
            GateDecision::Reject,
        ] {
            let calibration = calibrate(ranking, &report, decision, &config, &weights);
            prop_assert!((0.0..=1.0).contains(&calibration.confidence));
            match decision {
                GateDecision::ExactStrict => prop_assert!(calibration.confidence <= 0.95),
                GateDecision::ExactProvisional => prop_assert!(calibration.confidence <= 0.70),
                GateDecision::NearMiss => prop_assert!(calibration.confidence <= 0.45),
                GateDecision::Reject => prop_assert!(calibration.confidence <= 0.50),
            }
            if !report.detail_checked {
                prop_assert!(calibration.confidence <= 0.55);
            }
        }
    }
}
