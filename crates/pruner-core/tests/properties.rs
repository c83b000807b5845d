//! Property-based tests over random operation sequences.
//!
//! These tests verify the invariants that must hold whatever the user and
//! the host do:
//!  - Ordering: store ++ window ++ live equals the full transcript
//!    (while the store never overflowed)
//!  - Capacity: the store never exceeds its cap
//!  - Overflow: any pass that discarded snapshots leaves the window empty

use proptest::prelude::*;
use pruner_core::regions;
use pruner_core::{
    find_message_blocks, HostDocument, MemoryDocument, NodeId, PrunerConfig, PrunerSession,
};

#[derive(Clone, Debug)]
enum Op {
    NewTurns(usize),
    Prune,
    ExpandChunk,
    Collapse,
    ExpandAll,
    ToggleCanvas,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..8).prop_map(Op::NewTurns),
        3 => Just(Op::Prune),
        2 => Just(Op::ExpandChunk),
        1 => Just(Op::Collapse),
        1 => Just(Op::ExpandAll),
        1 => Just(Op::ToggleCanvas),
    ]
}

struct Harness {
    session: PrunerSession<MemoryDocument>,
    thread: NodeId,
    canvas: Option<NodeId>,
    expected: Vec<String>,
    turns: usize,
    clock: u64,
}

impl Harness {
    fn new(initial: usize, config: PrunerConfig) -> Self {
        let (doc, thread) = MemoryDocument::with_transcript(initial);
        let expected = find_message_blocks(&doc)
            .iter()
            .map(|n| doc.outer_html(n).unwrap())
            .collect();
        Harness {
            session: PrunerSession::detached(doc, config).unwrap(),
            thread,
            canvas: None,
            expected,
            turns: initial,
            clock: 0,
        }
    }

    /// Apply one operation; returns how many snapshots were discarded.
    fn apply(&mut self, op: &Op) -> usize {
        match op {
            Op::NewTurns(n) => {
                for _ in 0..*n {
                    self.turns += 1;
                    let text = format!("message {}", self.turns);
                    let doc = self.session.document_mut();
                    let turn = doc.push_turn(&self.thread, &text);
                    self.expected.push(doc.outer_html(&turn).unwrap());
                }
                0
            }
            Op::Prune => {
                self.clock += 1_000;
                self.session
                    .prune_now(self.clock)
                    .report()
                    .map(|r| r.discarded)
                    .unwrap_or(0)
            }
            Op::ExpandChunk => self
                .session
                .expand_chunk()
                .report()
                .map(|r| r.discarded)
                .unwrap_or(0),
            Op::Collapse => self
                .session
                .collapse()
                .report()
                .map(|r| r.discarded)
                .unwrap_or(0),
            Op::ExpandAll => self
                .session
                .expand_all()
                .report()
                .map(|r| r.discarded)
                .unwrap_or(0),
            Op::ToggleCanvas => {
                let doc = self.session.document_mut();
                match self.canvas.take() {
                    Some(canvas) => {
                        doc.detach(&canvas).unwrap();
                    }
                    None => {
                        let body = doc.body();
                        self.canvas = Some(doc.append_element(&body, "aside", &[]));
                    }
                }
                0
            }
        }
    }

    fn sequence(&self) -> Vec<String> {
        let doc = self.session.document();
        let mut out: Vec<String> = self
            .session
            .store()
            .iter()
            .map(|s| s.markup().to_string())
            .collect();
        out.extend(
            regions::window_contents(doc)
                .iter()
                .map(|n| doc.outer_html(n).unwrap()),
        );
        out.extend(
            find_message_blocks(doc)
                .iter()
                .map(|n| doc.outer_html(n).unwrap()),
        );
        out
    }
}

proptest! {
    #[test]
    fn ordering_is_preserved(
        initial in 0usize..40,
        keep in 1usize..20,
        canvas_keep in 1usize..20,
        chunk in 1usize..25,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let config = PrunerConfig {
            keep,
            canvas_keep,
            chunk_size: chunk,
            throttle_ms: 0,
            ..Default::default()
        };
        let mut harness = Harness::new(initial, config);

        for op in &ops {
            harness.apply(op);
            prop_assert_eq!(harness.sequence(), harness.expected.clone());
        }
    }

    #[test]
    fn store_respects_capacity(
        cap in 1usize..15,
        keep in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let config = PrunerConfig {
            keep,
            canvas_keep: keep,
            chunk_size: 3,
            max_stored: cap,
            throttle_ms: 0,
            ..Default::default()
        };
        let mut harness = Harness::new(10, config);

        for op in &ops {
            let discarded = harness.apply(op);
            prop_assert!(harness.session.store().len() <= cap);
            if discarded > 0 {
                prop_assert_eq!(harness.session.status().expanded, 0);
            }
        }
    }

    #[test]
    fn live_region_never_exceeds_threshold_after_prune(
        initial in 0usize..60,
        keep in 1usize..25,
    ) {
        let config = PrunerConfig { keep, throttle_ms: 0, ..Default::default() };
        let mut harness = Harness::new(initial, config);
        harness.apply(&Op::Prune);

        let live = find_message_blocks(harness.session.document()).len();
        prop_assert_eq!(live, initial.min(keep));
        prop_assert_eq!(harness.session.store().len(), initial.saturating_sub(keep));
    }
}
