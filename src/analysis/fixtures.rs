//! Small nets shared by the analysis tests.
use crate::net::{Net, Place, Transition, Weight};

/// `places`: `(name, tokens)`; `transitions`: `(name, inputs, outputs)` with arcs
/// given as `(place index, weight)`.
pub(crate) fn build_net(
    places: &[(&str, Weight)],
    transitions: &[(&str, &[(usize, Weight)], &[(usize, Weight)])],
) -> Net {
    let mut net = Net::empty();
    let place_ids: Vec<_> = places
        .iter()
        .map(|(name, tokens)| net.add_place(Place::new(*name, *tokens)))
        .collect();
    for (name, inputs, outputs) in transitions {
        let transition = net.add_transition(Transition::new(*name));
        for (place, weight) in inputs.iter() {
            net.add_input_arc(place_ids[*place], transition, *weight)
                .unwrap();
        }
        for (place, weight) in outputs.iter() {
            net.add_output_arc(place_ids[*place], transition, *weight)
                .unwrap();
        }
    }
    net
}

/// `p → 2p`.
pub(crate) fn doubling_net() -> Net {
    build_net(&[("p", 1)], &[("t", &[(0, 1)], &[(0, 2)])])
}

/// `p1 → p2`, one token.
pub(crate) fn transfer_net() -> Net {
    build_net(&[("p1", 1), ("p2", 0)], &[("t1", &[(0, 1)], &[(1, 1)])])
}

/// Two tokens moving around a three place ring.
pub(crate) fn ring_net() -> Net {
    build_net(
        &[("a", 2), ("b", 0), ("c", 0)],
        &[
            ("ab", &[(0, 1)], &[(1, 1)]),
            ("bc", &[(1, 1)], &[(2, 1)]),
            ("ca", &[(2, 1)], &[(0, 1)]),
        ],
    )
}

/// A generator feeding an unbounded buffer that a consumer drains into a sink.
pub(crate) fn producer_consumer_net() -> Net {
    build_net(
        &[("ready", 1), ("buffer", 0), ("done", 0)],
        &[
            ("produce", &[(0, 1)], &[(0, 1), (1, 1)]),
            ("consume", &[(1, 1)], &[(2, 1)]),
        ],
    )
}
