mod common;

use bagunpack::container::{Arena, HEADER_LEN, decode, decode_to_vec};
use bagunpack::extract::{DDS_SIGNATURE, find_signature};
use common::{BlockBuilder, container, decoded};
use proptest::prelude::*;

const CAPACITY: usize = 1 << 20;

/// Straightforward byte-at-a-time reference for one token.
fn apply(model: &mut Vec<u8>, literals: &[u8], offset: usize, len: usize) {
    model.extend_from_slice(literals);
    let start = model.len() - offset;
    for i in 0..len {
        let b = model[start + i];
        model.push(b);
    }
}

proptest! {
    #[test]
    fn prop_literal_blocks_concatenate(
        bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..600), 0..6),
        legacy in any::<bool>()
    ) {
        let blocks: Vec<Vec<u8>> = bodies.iter().map(|b| BlockBuilder::new().last(b)).collect();
        let tag = if legacy { 0x07 } else { 0x04 };
        let out = decode_to_vec(&container(tag, &blocks), CAPACITY).unwrap();
        prop_assert_eq!(out, decoded(&bodies.concat()));
    }

    #[test]
    fn prop_matches_agree_with_reference_model(
        ops in proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..40), any::<u16>(), 4usize..300),
            1..24
        ),
        tail in proptest::collection::vec(any::<u8>(), 0..20)
    ) {
        let mut model = decoded(b"");
        let mut builder = BlockBuilder::new();
        for (literals, seed, len) in &ops {
            let available = model.len() + literals.len();
            let offset = 1 + usize::from(*seed) % available.min(u16::MAX as usize);
            builder = builder.token(literals, offset as u16, *len);
            apply(&mut model, literals, offset, *len);
        }
        model.extend_from_slice(&tail);
        let input = container(0x04, &[builder.last(&tail)]);

        let out = decode_to_vec(&input, CAPACITY).unwrap();
        prop_assert_eq!(out, model);
    }

    #[test]
    fn prop_arbitrary_input_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        capacity in HEADER_LEN..4096usize
    ) {
        let mut arena = Arena::new(capacity);
        let _ = decode(&data, &mut arena);
        prop_assert!(arena.len() <= capacity);
    }

    #[test]
    fn prop_signature_is_first_occurrence(
        prefix in proptest::collection::vec(0u8..0x44, 0..200),
        suffix in proptest::collection::vec(any::<u8>(), 0..200)
    ) {
        let mut haystack = prefix.clone();
        haystack.extend_from_slice(&DDS_SIGNATURE);
        haystack.extend_from_slice(&suffix);
        prop_assert_eq!(find_signature(&haystack, &DDS_SIGNATURE), Some(prefix.len()));
    }
}
