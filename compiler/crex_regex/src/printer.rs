//! Render compiled chains back into pattern syntax.
//!
//! The printed form is parseable and accepts the same language as the
//! original pattern (macro references come back expanded, classes come
//! back in their compact form). Regex metacharacters and non-printable
//! bytes in literals are escaped so the output survives a round trip.

use std::fmt::Write;

use crate::node::{NodeArena, NodeId, NodeKind, Repeat};

/// Characters that must be escaped when they appear in a literal.
const METACHARS: &[u8] = b".^$*+?()[{}\\|";

/// Append the rendering of the chain starting at `id` to `out`.
pub(crate) fn print_chain(arena: &NodeArena, id: NodeId, out: &mut String) {
    let mut cursor = Some(id);
    while let Some(node_id) = cursor {
        let node = arena.get(node_id);
        match node.kind {
            NodeKind::True => return,
            NodeKind::Root => {}
            NodeKind::DotAll | NodeKind::DotNoNewline => out.push('.'),
            NodeKind::AnchorBegin => out.push('^'),
            NodeKind::AnchorEnd => out.push('$'),
            NodeKind::Literal(lit) => print_literal(lit.as_bytes(), out),
            NodeKind::Class(class) => {
                let _ = write!(out, "{class}");
            }
            NodeKind::Quantifier { child, repeat } => {
                print_chain(arena, child, out);
                print_repeat(repeat, out);
            }
            NodeKind::Alternation { child } => {
                print_chain(arena, child, out);
                out.push('|');
            }
            NodeKind::Group { child, kind } => {
                out.push('(');
                if kind.lookahead {
                    out.push_str(if kind.inverted { "?!" } else { "?=" });
                } else if kind.noncapturing {
                    out.push_str("?:");
                }
                print_chain(arena, child, out);
                out.push(')');
            }
            // Partial chains only show up while debugging the parser.
            NodeKind::GroupStart { .. } => out.push('('),
        }
        cursor = node.next;
    }
}

fn print_literal(bytes: &[u8], out: &mut String) {
    for &b in bytes {
        if METACHARS.contains(&b) {
            out.push('\\');
            out.push(b as char);
            continue;
        }
        match b {
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            b'\t' => out.push_str("\\t"),
            0x0c => out.push_str("\\f"),
            0x0b => out.push_str("\\v"),
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
}

fn print_repeat(repeat: Repeat, out: &mut String) {
    let lazy = if repeat.lazy { "?" } else { "" };
    match (repeat.min, repeat.max) {
        (0, 1) => {
            out.push('?');
            out.push_str(lazy);
        }
        (0, usize::MAX) => {
            out.push('*');
            out.push_str(lazy);
        }
        (1, usize::MAX) => {
            out.push('+');
            out.push_str(lazy);
        }
        (1, 1) => {}
        (0, 0) => {}
        (min, max) if min == max => {
            let _ = write!(out, "{{{min}}}{lazy}");
        }
        (0, max) => {
            let _ = write!(out, "{{,{max}}}{lazy}");
        }
        (min, usize::MAX) => {
            let _ = write!(out, "{{{min},}}{lazy}");
        }
        (min, max) => {
            let _ = write!(out, "{{{min},{max}}}{lazy}");
        }
    }
}
