/* Copyright (c) 2018 University of Utah
 *
 * Permission to use, copy, modify, and distribute this software for any
 * purpose with or without fee is hereby granted, provided that the above
 * copyright notice and this permission notice appear in all copies.
 *
 * THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR(S) DISCLAIM ALL WARRANTIES
 * WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
 * MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL AUTHORS BE LIABLE FOR
 * ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
 * WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
 * ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
 * OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
 */

//! A priority-weighted lottery task selector. Each task's chance of being
//! picked is proportional to its priority; over many draws the empirical
//! selection frequency converges to `priority / sum_of_priorities`.

use std::sync::Arc;

use crate::random::RandomSource;

/// Picks one index from a list of task priorities. Takes priorities rather
/// than the tasks themselves so the scheduler can select without holding a
/// borrow across the later mutable `run()` call.
pub trait TaskSelector: Send + Sync {
    /// Returns the index of the selected priority, or `None` if `priorities`
    /// is empty. No randomness is consumed in the empty case.
    fn select(&self, priorities: &[i32]) -> Option<usize>;
}

/// Draws `n` uniformly from `[0, sum_of_priorities)` and returns the index of
/// the first priority whose cumulative sum exceeds `n`.
pub struct LotteryTaskSelector {
    rand: Arc<dyn RandomSource>,
}

impl LotteryTaskSelector {
    pub fn new(rand: Arc<dyn RandomSource>) -> LotteryTaskSelector {
        LotteryTaskSelector { rand }
    }
}

impl TaskSelector for LotteryTaskSelector {
    fn select(&self, priorities: &[i32]) -> Option<usize> {
        if priorities.is_empty() {
            return None;
        }

        let sum: u64 = priorities.iter().map(|&p| p as u64).sum();
        let n = self.rand.random(sum);

        let mut cumulative: u64 = 0;
        for (i, &p) in priorities.iter().enumerate() {
            cumulative += p as u64;
            if cumulative > n {
                return Some(i);
            }
        }

        // Unreachable: n < sum and the cumulative sum reaches sum on the
        // last entry, so the loop above always returns before falling
        // through.
        None
    }
}
