//! Content Selector — picks exemplar pieces from a user's posted content.
//!
//! Same-format pieces come first, in random order; remaining capacity is
//! backfilled from the other formats, also shuffled. No LLM calls.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::content::{ContentPiece, PostedContentPiece};

/// Upper bound on exemplars embedded in one generation prompt.
pub const MAX_EXEMPLARS: usize = 10;

/// Selects up to `MAX_EXEMPLARS` exemplars for `format` using the thread RNG.
pub fn select_exemplars(posted: Vec<PostedContentPiece>, format: &str) -> Vec<ContentPiece> {
    select_exemplars_with_rng(posted, format, &mut rand::thread_rng())
}

pub fn select_exemplars_with_rng<R: Rng + ?Sized>(
    posted: Vec<PostedContentPiece>,
    format: &str,
    rng: &mut R,
) -> Vec<ContentPiece> {
    let (mut same_format, mut other_format): (Vec<ContentPiece>, Vec<ContentPiece>) = posted
        .into_iter()
        .map(ContentPiece::from)
        .partition(|piece| piece.format == format);

    same_format.shuffle(rng);
    other_format.shuffle(rng);

    same_format
        .into_iter()
        .chain(other_format)
        .take(MAX_EXEMPLARS)
        .collect()
}
