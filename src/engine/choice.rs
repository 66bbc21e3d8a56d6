//! Weighted text selection for a respond payload.
//!
//! ```text
//! choose: [(3, "a"), (0, "b"), (1, "c")]      weights ≤ 0 count as 1
//!          ├──────┤├──┤├──┤                    total = 5
//! draw ∈ [0, 5):  0,1,2 → "a"   3 → "b"   4 → "c"
//! ```
//!
//! Without a `choose` list the payload's `text` wins, then `message.text`.

use super::random::RandomSource;
use crate::config::Respond;

pub(crate) fn pick<'a>(respond: &'a Respond, random: &dyn RandomSource) -> &'a str {
    let Some(first) = respond.choose.first() else {
        if !respond.text.is_empty() {
            return &respond.text;
        }
        return &respond.message.text;
    };

    // Saturates: huge weights only flatten the tail of the draw range.
    let total = respond.choose.iter().fold(0u64, |sum, c| sum.saturating_add(effective_weight(c.weight)));
    let draw = random.below(total);

    let mut upper = 0u64;
    for candidate in &respond.choose {
        upper = upper.saturating_add(effective_weight(candidate.weight));
        if draw < upper {
            return &candidate.text;
        }
    }

    &first.text
}

fn effective_weight(weight: i64) -> u64 {
    u64::try_from(weight).ok().filter(|w| *w > 0).unwrap_or(1)
}
