use super::prf::Prf;

/// Compact description of a pseudorandom trace through the database, one element per chunk, along with the
/// XOR parity of database words on that trace.
///
/// A programmed hint is pinned to a known index inside one chunk. It behaves exactly like its unprogrammed
/// counterpart in every other chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Hint<P: Prf> {
    key: P::Key,
    parity: u64,
    programmed_point: Option<u64>,
}

impl<P: Prf> Hint<P> {
    /// Fresh, unprogrammed hint with zero parity.
    pub fn new(key: P::Key) -> Self {
        Hint {
            key,
            parity: 0,
            programmed_point: None,
        }
    }

    #[inline(always)]
    pub fn parity(&self) -> u64 {
        self.parity
    }

    #[inline(always)]
    pub fn programmed_point(&self) -> Option<u64> {
        self.programmed_point
    }

    #[inline(always)]
    pub fn is_programmed(&self) -> bool {
        self.programmed_point.is_some()
    }

    #[inline(always)]
    pub fn xor_into_parity(&mut self, word: u64) {
        self.parity ^= word;
    }

    /// Pins this hint's element in the chunk holding `index` to `index` itself.
    pub fn program(&mut self, index: u64) {
        self.programmed_point = Some(index);
    }

    /// Index of the element this hint picks from chunk `chunk_id`. Returns the programmed point when it
    /// lies in that chunk, otherwise `PRF(key, chunk_id) mod chunk_size + chunk_id * chunk_size`.
    ///
    /// The result may land in the zero padding past the end of the database, when `chunk_id` is the last,
    /// partial chunk.
    #[inline]
    pub fn element_at(&self, chunk_id: u64, chunk_size: u64) -> u64 {
        match self.programmed_point {
            Some(point) if point / chunk_size == chunk_id => point,
            _ => self.offset_at(chunk_id, chunk_size) + chunk_id * chunk_size,
        }
    }

    /// Same as [`Hint::element_at`], but relative to the start of chunk `chunk_id`.
    #[inline]
    pub fn offset_at(&self, chunk_id: u64, chunk_size: u64) -> u64 {
        match self.programmed_point {
            Some(point) if point / chunk_size == chunk_id => point % chunk_size,
            _ => P::eval(&self.key, chunk_id) % chunk_size,
        }
    }

    /// Per-chunk offset trace of this hint, across all `chunk_num` chunks.
    pub fn offsets(&self, chunk_num: u64, chunk_size: u64) -> Vec<u64> {
        (0..chunk_num).map(|chunk_id| self.offset_at(chunk_id, chunk_size)).collect()
    }
}

#[cfg(test)]
pub mod test {
    use crate::pir_internals::{hint::Hint, prf::Prf};
    use rand::RngCore;

    /// PRF whose key is the literal offset trace, so tests can pin hints to known positions.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FixedOffsetPrf;

    impl Prf for FixedOffsetPrf {
        type Key = Vec<u64>;

        fn sample_key<R: RngCore + ?Sized>(rng: &mut R) -> Self::Key {
            (0..64).map(|_| rng.next_u64()).collect()
        }

        fn eval(key: &Self::Key, chunk_id: u64) -> u64 {
            key[chunk_id as usize]
        }
    }

    #[test]
    fn unprogrammed_hint_follows_prf_trace() {
        const CHUNK_SIZE: u64 = 4;
        let hint = Hint::<FixedOffsetPrf>::new(vec![1, 2, 0, 3]);

        let elements = (0..4).map(|chunk_id| hint.element_at(chunk_id, CHUNK_SIZE)).collect::<Vec<_>>();
        assert_eq!(elements, vec![1, 6, 8, 15]);
        assert_eq!(hint.offsets(4, CHUNK_SIZE), vec![1, 2, 0, 3]);
        assert!(!hint.is_programmed());
    }

    #[test]
    fn prf_output_is_reduced_modulo_chunk_size() {
        let hint = Hint::<FixedOffsetPrf>::new(vec![9, 13]);

        assert_eq!(hint.element_at(0, 4), 1);
        assert_eq!(hint.element_at(1, 4), 5);
    }

    #[test]
    fn programmed_hint_overrides_only_its_chunk() {
        const CHUNK_SIZE: u64 = 4;
        let mut hint = Hint::<FixedOffsetPrf>::new(vec![1, 2, 0, 3]);
        hint.program(10);

        assert!(hint.is_programmed());
        assert_eq!(hint.programmed_point(), Some(10));
        assert_eq!(hint.element_at(0, CHUNK_SIZE), 1);
        assert_eq!(hint.element_at(1, CHUNK_SIZE), 6);
        assert_eq!(hint.element_at(2, CHUNK_SIZE), 10);
        assert_eq!(hint.element_at(3, CHUNK_SIZE), 15);
        assert_eq!(hint.offsets(4, CHUNK_SIZE), vec![1, 2, 2, 3]);
    }

    #[test]
    fn parity_accumulates_by_xor() {
        let mut hint = Hint::<FixedOffsetPrf>::new(vec![0]);
        hint.xor_into_parity(0b1010);
        hint.xor_into_parity(0b0110);

        assert_eq!(hint.parity(), 0b1100);
    }
}
