//! Recursive backtracking evaluator.
//!
//! `eval` walks a node chain against the input and returns the end offset
//! of a match, or `None`. Matching is straightforward NFA backtracking:
//! each node either consumes input and recurses into its `next` link, or
//! tries its alternatives and keeps the longest successful continuation.
//! Only reaching a `True` terminator produces a match.
//!
//! At end of input, only `True`, `$`, and quantifiers with `min == 0` may
//! still succeed; everything else needs at least one byte.

use crate::node::{NodeArena, NodeId, NodeKind, Repeat};

pub(crate) fn eval(
    arena: &NodeArena,
    id: NodeId,
    text: &[u8],
    offset: usize,
) -> Option<usize> {
    let node = arena.get(id);
    let length = text.len();

    if offset >= length {
        let exempt = match node.kind {
            NodeKind::True | NodeKind::AnchorEnd => true,
            NodeKind::Quantifier { repeat, .. } => repeat.min == 0,
            _ => false,
        };
        if !exempt {
            return None;
        }
    }

    let next = node.next;
    match node.kind {
        NodeKind::True => Some(offset),
        NodeKind::Root => eval(arena, next?, text, offset),
        NodeKind::AnchorBegin => {
            if offset == 0 {
                eval(arena, next?, text, offset)
            } else {
                None
            }
        }
        NodeKind::AnchorEnd => {
            if offset == length {
                eval(arena, next?, text, offset)
            } else {
                None
            }
        }
        NodeKind::DotAll => eval(arena, next?, text, offset + 1),
        NodeKind::DotNoNewline => {
            let b = text[offset];
            if b == b'\n' || b == b'\r' {
                None
            } else {
                eval(arena, next?, text, offset + 1)
            }
        }
        NodeKind::Literal(lit) => {
            let bytes = lit.as_bytes();
            if length - offset < bytes.len() || &text[offset..offset + bytes.len()] != bytes {
                return None;
            }
            eval(arena, next?, text, offset + bytes.len())
        }
        NodeKind::Class(class) => {
            if class.contains(text[offset]) {
                eval(arena, next?, text, offset + 1)
            } else {
                None
            }
        }
        NodeKind::Alternation { child } => match eval(arena, child, text, offset) {
            Some(left) => match eval(arena, next?, text, offset) {
                Some(right) => Some(left.max(right)),
                None => Some(left),
            },
            None => eval(arena, next?, text, offset),
        },
        NodeKind::Group { child, kind } => match eval(arena, child, text, offset) {
            Some(end) => {
                if kind.inverted {
                    return None;
                }
                let resume = if kind.lookahead { offset } else { end };
                eval(arena, next?, text, resume)
            }
            None => {
                if kind.inverted {
                    eval(arena, next?, text, offset)
                } else {
                    None
                }
            }
        },
        NodeKind::Quantifier { child, repeat } => {
            eval_quantifier(arena, child, repeat, next?, text, offset)
        }
        // Parse-time only; a compiled chain never contains one.
        NodeKind::GroupStart { .. } => None,
    }
}

fn eval_quantifier(
    arena: &NodeArena,
    child: NodeId,
    repeat: Repeat,
    next: NodeId,
    text: &[u8],
    offset: usize,
) -> Option<usize> {
    // Mandatory repetitions first.
    let mut pos = offset;
    for _ in 0..repeat.min {
        pos = eval(arena, child, text, pos)?;
    }

    // Probe the continuation: a lazy quantifier stops at the first point
    // where the rest of the chain matches.
    let mut longest = eval(arena, next, text, pos);
    if repeat.lazy && longest.is_some() {
        return longest;
    }

    // Extend up to the maximum, keeping the longest continuation end seen.
    let mut count = repeat.min;
    while count < repeat.max {
        let Some(advanced) = eval(arena, child, text, pos) else {
            break;
        };
        if advanced == pos {
            // Zero-width child repetition can never make progress.
            break;
        }
        count += 1;
        if let Some(end) = eval(arena, next, text, advanced) {
            longest = Some(longest.map_or(end, |l| l.max(end)));
            if repeat.lazy {
                return longest;
            }
        }
        pos = advanced;
    }

    longest
}
