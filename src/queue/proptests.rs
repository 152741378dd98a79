//! Property-based tests for the sharded queue using proptest
//!
//! These tests check that placement never loses or invents payloads, that a
//! single shard keeps FIFO order, and that selectors stay inside the shard
//! range for any configuration and caller identity.

use super::*;
use crate::{Error, MultiQueueConfig, SelectionPolicy};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn policy_strategy() -> impl Strategy<Value = SelectionPolicy> {
    prop_oneof![Just(SelectionPolicy::Affinity), Just(SelectionPolicy::Uniform)]
}

/// (shard_count, shards_per_caller) pairs valid under either policy
fn layout_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..8, 1usize..5).prop_map(|(groups, per_caller)| (groups * per_caller, per_caller))
}

#[cfg(test)]
mod multiset_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_enqueued_equals_drained(
            (shards, per_caller) in layout_strategy(),
            policy in policy_strategy(),
            seed in any::<u64>(),
            values in prop::collection::vec(any::<i32>(), 0..200)
        ) {
            let config = MultiQueueConfig::new(shards).shards_per_caller(per_caller).policy(policy);
            let queue: MultiQueue<i32> = MultiQueue::new(config).unwrap();
            let mut caller = Caller::with_seed(CallerId::from_raw(seed as usize), seed);

            for &value in &values {
                prop_assert!(queue.enqueue_as(&mut caller, value).is_ok());
            }
            prop_assert_eq!(queue.len(), values.len());

            let mut drained = queue.drain();
            let mut expected = values.clone();
            drained.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(drained, expected);
            prop_assert!(queue.is_empty());
        }

        #[test]
        fn test_interleaved_operations_conserve_payloads(
            (shards, per_caller) in layout_strategy(),
            policy in policy_strategy(),
            seed in any::<u64>(),
            operations in prop::collection::vec(prop::bool::weighted(0.6), 1..300)
        ) {
            let config = MultiQueueConfig::new(shards).shards_per_caller(per_caller).policy(policy);
            let queue: MultiQueue<usize> = MultiQueue::new(config).unwrap();
            let mut caller = Caller::with_seed(CallerId::from_raw(seed as usize % 16), seed);

            let mut pushed = 0usize;
            let mut popped = Vec::new();
            for &should_push in &operations {
                if should_push {
                    queue.enqueue_as(&mut caller, pushed).unwrap();
                    pushed += 1;
                } else if let Some(v) = queue.dequeue_as(&mut caller) {
                    popped.push(v);
                }
                prop_assert_eq!(queue.len(), pushed - popped.len());
            }

            popped.extend(queue.drain());
            popped.sort_unstable();
            prop_assert_eq!(popped, (0..pushed).collect::<Vec<_>>());
        }
    }
}

#[cfg(test)]
mod ordering_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_single_shard_preserves_order(
            policy in policy_strategy(),
            values in prop::collection::vec(any::<u16>(), 1..100)
        ) {
            let queue: MultiQueue<u16> = MultiQueue::new(MultiQueueConfig::new(1).policy(policy)).unwrap();
            for &value in &values {
                queue.enqueue(value).unwrap();
            }
            for &expected in &values {
                prop_assert_eq!(queue.dequeue(), Some(expected));
            }
            prop_assert_eq!(queue.dequeue(), None);
        }
    }
}

#[cfg(test)]
mod capacity_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_bounded_shards_never_overflow(
            shards in 1usize..6,
            capacity in 1usize..10,
            seed in any::<u64>(),
            attempts in 1usize..200
        ) {
            let config = MultiQueueConfig::new(shards).policy(SelectionPolicy::Uniform);
            let queue = MultiQueue::bounded(config, capacity).unwrap();
            let mut caller = Caller::with_seed(CallerId::from_raw(0), seed);

            let mut accepted = 0usize;
            for i in 0..attempts {
                match queue.enqueue_as(&mut caller, i) {
                    Ok(()) => accepted += 1,
                    Err(err) => {
                        prop_assert_eq!(err.kind(), Error::Capacity);
                        prop_assert_eq!(err.into_inner(), i);
                    }
                }
            }

            prop_assert!(accepted <= shards * capacity);
            prop_assert_eq!(queue.len(), accepted);
            for shard in 0..shards {
                prop_assert!(queue.shard_len(shard).unwrap() <= capacity);
            }
        }
    }
}

#[cfg(test)]
mod selector_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_selectors_stay_in_range(
            (shards, per_caller) in layout_strategy(),
            home_probes in 0usize..6,
            caller in any::<usize>(),
            attempt in 0usize..16,
            seed in any::<u64>()
        ) {
            let config = MultiQueueConfig::new(shards).shards_per_caller(per_caller).home_probes(home_probes);
            let affinity = AffinitySelector::new(&config);
            let uniform = UniformSelector::new(shards);
            let mut rng = SmallRng::seed_from_u64(seed);

            for op in [Operation::Enqueue, Operation::Dequeue] {
                let mut probe = Probe::new(CallerId::from_raw(caller), attempt, &mut rng);
                prop_assert!(affinity.select(op, &mut probe) < shards);
                let mut probe = Probe::new(CallerId::from_raw(caller), attempt, &mut rng);
                prop_assert!(uniform.select(op, &mut probe) < shards);
            }
        }

        #[test]
        fn test_home_shards_belong_to_one_group(
            (shards, per_caller) in layout_strategy(),
            caller in any::<usize>(),
            seed in any::<u64>()
        ) {
            let config = MultiQueueConfig::new(shards).shards_per_caller(per_caller);
            let selector = AffinitySelector::new(&config);
            let mut rng = SmallRng::seed_from_u64(seed);
            let base = selector.home_base(CallerId::from_raw(caller));

            prop_assert_eq!(base % per_caller, 0);
            for attempt in 0..config.effective_home_probes() {
                let mut probe = Probe::new(CallerId::from_raw(caller), attempt, &mut rng);
                let index = selector.select(Operation::Dequeue, &mut probe);
                prop_assert_eq!(index / per_caller, base / per_caller);
            }
        }
    }
}
