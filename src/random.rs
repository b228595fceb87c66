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

//! A uniform random integer source, used by the lottery task selector.
//!
//! Two implementations are provided: one seeded from the OS entropy source,
//! and one seeded from wall-clock time. Failure to produce a value is
//! treated as fatal, since a broken entropy source makes the scheduler's
//! fairness guarantees meaningless.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

/// Produces a uniformly distributed integer in `[0, max)`.
pub trait RandomSource: Send + Sync {
    /// Returns a value drawn uniformly from `[0, max)`.
    ///
    /// # Panics
    ///
    /// Panics if `max` is zero, or if the underlying source cannot produce a
    /// value. Both are unrecoverable: the lottery selector never calls this
    /// with an empty task list, and a dead entropy source means the process
    /// cannot make scheduling decisions at all.
    fn random(&self, max: u64) -> u64;
}

/// Draws from the operating system's cryptographic entropy source.
pub struct CryptoRandomSource {
    rng: Mutex<OsRng>,
}

impl CryptoRandomSource {
    pub fn new() -> CryptoRandomSource {
        CryptoRandomSource {
            rng: Mutex::new(OsRng),
        }
    }
}

impl Default for CryptoRandomSource {
    fn default() -> CryptoRandomSource {
        CryptoRandomSource::new()
    }
}

impl RandomSource for CryptoRandomSource {
    fn random(&self, max: u64) -> u64 {
        assert!(max > 0, "random() called with an empty range");

        let mut rng = self.rng.lock().expect("entropy source lock poisoned");
        rng.gen_range(0..max)
    }
}

/// Draws from a PRNG seeded once from wall-clock time at construction.
pub struct PrngRandomSource {
    rng: Mutex<StdRng>,
}

impl PrngRandomSource {
    pub fn new() -> PrngRandomSource {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the epoch")
            .as_nanos() as u64;

        PrngRandomSource {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for PrngRandomSource {
    fn default() -> PrngRandomSource {
        PrngRandomSource::new()
    }
}

impl RandomSource for PrngRandomSource {
    fn random(&self, max: u64) -> u64 {
        assert!(max > 0, "random() called with an empty range");

        let mut rng = self.rng.lock().expect("PRNG lock poisoned");
        rng.gen_range(0..max)
    }
}
