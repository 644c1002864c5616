//! Utilities shared by the fan-in combinators.

use core::pin::Pin;
use std::cell::Cell;
use std::num::Wrapping;

mod wakers;

pub(crate) use wakers::SourceWakers;

/// Returns a pinned mutable reference to the element at `index`.
pub(crate) fn get_pin_mut_from_vec<T>(vec: Pin<&mut Vec<T>>, index: usize) -> Option<Pin<&mut T>> {
    // SAFETY: the elements of a pinned `Vec` are never moved out of it; we
    // only hand out a pinned reference to one of them, which is the same
    // guarantee a field projection gives.
    unsafe {
        vec.get_unchecked_mut()
            .get_mut(index)
            .map(|t| Pin::new_unchecked(t))
    }
}

/// Generates a pseudo-random number in `0..n` (xorshift32), used to pick the
/// first source to poll so no source is systematically favoured.
pub(crate) fn random(n: u32) -> u32 {
    thread_local! {
        static RNG: Cell<Wrapping<u32>> = {
            // Seed from the address of a stack local; never zero.
            let local = 0u8;
            let seed = &local as *const u8 as usize as u32;
            Cell::new(Wrapping(seed | 1))
        }
    }

    RNG.with(|rng| {
        let mut x = rng.get();
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        rng.set(x);

        // Multiply-shift reduction into `0..n`.
        ((u64::from(x.0)).wrapping_mul(u64::from(n)) >> 32) as u32
    })
}
