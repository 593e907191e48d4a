//! Reviewer assignment policy.
//!
//! Pure selection over a candidate pool: filter deterministically, shuffle
//! uniformly, take the head. No I/O; randomness is injected so callers and
//! tests control the source.

use rand::seq::SliceRandom;
use rand::Rng;

use prm_state::{User, UserId};

/// Upper bound on reviewers assigned at creation time.
pub const MAX_REVIEWERS: usize = 2;

/// Pick up to [`MAX_REVIEWERS`] distinct active reviewers, never the author.
///
/// The result length is `min(MAX_REVIEWERS, eligible)`. Order within the
/// result is the shuffle order and is what gets persisted.
pub fn select_reviewers<R: Rng + ?Sized>(
    candidates: &[User],
    author: UserId,
    rng: &mut R,
) -> Vec<User> {
    let mut eligible: Vec<&User> = candidates
        .iter()
        .filter(|u| u.is_active && u.user_id != author)
        .collect();
    eligible.shuffle(rng);
    eligible.into_iter().take(MAX_REVIEWERS).cloned().collect()
}

/// Pick one active replacement outside `exclude`, or `None` when nobody is left.
pub fn select_replacement<R: Rng + ?Sized>(
    candidates: &[User],
    exclude: &[UserId],
    rng: &mut R,
) -> Option<User> {
    let eligible: Vec<&User> = candidates
        .iter()
        .filter(|u| u.is_active && !exclude.contains(&u.user_id))
        .collect();
    eligible.choose(rng).map(|u| (*u).clone())
}

/// Ids a replacement must avoid: the author and every current reviewer
/// (which includes the one being replaced).
pub fn replacement_exclusions(author: UserId, reviewers: &[UserId]) -> Vec<UserId> {
    let mut exclude = Vec::with_capacity(reviewers.len() + 1);
    exclude.push(author);
    exclude.extend(reviewers.iter().copied());
    exclude
}
