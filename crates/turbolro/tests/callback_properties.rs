//! Property tests for completion-callback ordering and removal

mod common;

use common::{FiringLog, value_of};
use proptest::prelude::*;
use serde_json::json;
use turbolro::testing::{Gate, ScriptedStrategy};
use turbolro::{DoneCallback, LroPoller, done_callback};

type Poller = LroPoller<ScriptedStrategy<i64>>;

fn gated_poller(gate: &Gate) -> Poller {
    LroPoller::new(
        (),
        json!({"value": 5}),
        value_of(),
        ScriptedStrategy::new(1).with_gate(gate.clone()),
    )
    .unwrap()
}

fn recording(log: &FiringLog, id: usize) -> DoneCallback<ScriptedStrategy<i64>> {
    let log = log.clone();
    done_callback(move |_| log.record(id))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn callbacks_fire_in_registration_order_across_completion(
        (total, before) in (0usize..24).prop_flat_map(|total| (Just(total), 0..=total)),
    ) {
        let gate = Gate::closed();
        let poller = gated_poller(&gate);
        let log = FiringLog::default();

        for id in 0..before {
            poller.add_done_callback(recording(&log, id));
        }
        gate.open();
        poller.wait(None).unwrap();
        for id in before..total {
            poller.add_done_callback(recording(&log, id));
        }

        prop_assert_eq!(log.entries(), (0..total).collect::<Vec<_>>());
        prop_assert_eq!(poller.callback_count(), total);
    }

    #[test]
    fn removed_callbacks_never_fire(removed in proptest::collection::vec(any::<bool>(), 0..24)) {
        let gate = Gate::closed();
        let poller = gated_poller(&gate);
        let log = FiringLog::default();

        let callbacks: Vec<_> = (0..removed.len())
            .map(|id| {
                let callback = recording(&log, id);
                poller.add_done_callback(callback.clone());
                callback
            })
            .collect();
        for (callback, _) in callbacks.iter().zip(&removed).filter(|(_, gone)| **gone) {
            poller.remove_done_callback(callback).unwrap();
        }

        gate.open();
        poller.wait(None).unwrap();

        let kept: Vec<_> = (0..removed.len()).filter(|id| !removed[*id]).collect();
        prop_assert_eq!(log.entries(), kept);
    }
}
