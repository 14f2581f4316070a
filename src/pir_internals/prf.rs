use super::{params::PRF_KEY_BYTE_LEN, serialization};
use rand::RngCore;
use std::fmt::Debug;
use turboshake::TurboShake128;

/// Keyed pseudorandom function mapping a chunk identifier to a 64 -bit word.
///
/// For a uniform random key, evaluations at distinct chunk identifiers must be indistinguishable from
/// independent uniform draws. Hints reduce the output modulo chunk size to pick one offset per chunk.
pub trait Prf: Clone + Debug + Send + Sync + 'static {
    type Key: Clone + Debug + PartialEq + Send + Sync;

    /// Samples a fresh key, independent of every previously sampled one.
    fn sample_key<R: RngCore + ?Sized>(rng: &mut R) -> Self::Key;

    fn eval(key: &Self::Key, chunk_id: u64) -> u64;
}

/// PRF instantiated with TurboSHAKE128 xof, keyed by absorbing a 16 -bytes key before the little-endian chunk identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurboShakePrf;

impl Prf for TurboShakePrf {
    type Key = [u8; PRF_KEY_BYTE_LEN];

    fn sample_key<R: RngCore + ?Sized>(rng: &mut R) -> Self::Key {
        let mut key = [0u8; PRF_KEY_BYTE_LEN];
        rng.fill_bytes(&mut key);
        key
    }

    #[inline]
    fn eval(key: &Self::Key, chunk_id: u64) -> u64 {
        let mut hasher = TurboShake128::default();
        hasher.absorb(key);
        hasher.absorb(&chunk_id.to_le_bytes());
        hasher.finalize::<{ TurboShake128::DEFAULT_DOMAIN_SEPARATOR }>();

        let mut word = [0u8; std::mem::size_of::<u64>()];
        hasher.squeeze(&mut word);

        serialization::u64_from_le_bytes(&word)
    }
}
