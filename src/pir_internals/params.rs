use super::{branch_opt_util, error::PianoPIRError};

pub const BIT_SECURITY_LEVEL: usize = 128;
pub const SEED_BYTE_LEN: usize = (2 * BIT_SECURITY_LEVEL) / 8;
pub const PRF_KEY_BYTE_LEN: usize = BIT_SECURITY_LEVEL / 8;

/// Each primary hint covers a fixed index with probability 1/chunk_size, so `M1 = HINT_OVERSAMPLING_FACTOR * Q`
/// makes a miss happen with probability about N^-HINT_OVERSAMPLING_FACTOR.
pub const HINT_OVERSAMPLING_FACTOR: u64 = 4;
pub const BACKUP_OVERSAMPLING_FACTOR: u64 = 4;

/// Chunking parameters and hint budget of one PIR instance, shared by server and client.
///
/// Every field is a pure function of the database size (see [`Params::new`]), so both parties can
/// reproduce the same parameters given nothing but `db_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    /// Number of words in the database, N.
    pub db_size: u64,
    /// Number of consecutive indices per chunk, `floor(sqrt(N))`.
    pub chunk_size: u64,
    /// Number of chunks, `ceil(N / chunk_size)`. The last one may be partial.
    pub chunk_num: u64,
    /// Number of online queries the hint budget is dimensioned for, Q.
    pub max_queries: u64,
    /// Number of primary hints, M1.
    pub num_primary_hints: u64,
    /// Number of backup hints reserved for each chunk, M2.
    pub num_backup_hints_per_chunk: u64,
}

impl Params {
    /// Derives chunking parameters and hint capacities from the database size.
    ///
    /// * `chunk_size = floor(sqrt(N))`, `chunk_num = ceil(N / chunk_size)`
    /// * `Q = ceil(sqrt(N) * ln N)`, `M1 = 4 * Q`, `M2 = 4 * ceil(ln N)`, each at least 1
    ///
    /// Returns an error if N is zero.
    pub fn new(db_size: u64) -> Result<Params, PianoPIRError> {
        if branch_opt_util::unlikely(db_size == 0) {
            return Err(PianoPIRError::InvalidDatabaseSize);
        }

        let ln_n = (db_size as f64).ln();
        let max_queries = ((db_size as f64).sqrt() * ln_n).ceil().max(1.0) as u64;
        let num_primary_hints = HINT_OVERSAMPLING_FACTOR * max_queries;
        let num_backup_hints_per_chunk = BACKUP_OVERSAMPLING_FACTOR * (ln_n.ceil().max(1.0) as u64);

        Self::with_capacities(db_size, max_queries, num_primary_hints, num_backup_hints_per_chunk)
    }

    /// Same chunking as [`Params::new`], but with explicitly chosen hint capacities.
    pub fn with_capacities(db_size: u64, max_queries: u64, num_primary_hints: u64, num_backup_hints_per_chunk: u64) -> Result<Params, PianoPIRError> {
        if branch_opt_util::unlikely(db_size == 0) {
            return Err(PianoPIRError::InvalidDatabaseSize);
        }
        if branch_opt_util::unlikely(num_primary_hints == 0 || num_backup_hints_per_chunk == 0) {
            return Err(PianoPIRError::InvalidHintCapacity);
        }

        let chunk_size = db_size.isqrt();
        let chunk_num = db_size.div_ceil(chunk_size);

        Ok(Params {
            db_size,
            chunk_size,
            chunk_num,
            max_queries,
            num_primary_hints,
            num_backup_hints_per_chunk,
        })
    }

    #[inline(always)]
    pub const fn chunk_of(&self, index: u64) -> u64 {
        index / self.chunk_size
    }

    #[inline(always)]
    pub const fn offset_in_chunk(&self, index: u64) -> u64 {
        index % self.chunk_size
    }

    /// Size of the zero-padded database, `chunk_size * chunk_num >= N`.
    #[inline(always)]
    pub const fn padded_db_size(&self) -> u64 {
        self.chunk_size * self.chunk_num
    }

    #[inline(always)]
    pub const fn num_backup_hints(&self) -> u64 {
        self.num_backup_hints_per_chunk * self.chunk_num
    }

    /// Length of the punctured offset vector a client sends per query.
    #[inline(always)]
    pub const fn punctured_vector_len(&self) -> u64 {
        self.chunk_num - 1
    }
}

#[cfg(test)]
mod test {
    use crate::{PianoPIRError, pir_internals::params::Params};
    use test_case::test_case;

    #[test_case(1; "single word")]
    #[test_case(2; "two words")]
    #[test_case(16; "perfect square")]
    #[test_case(17; "one past perfect square")]
    #[test_case(10_000; "tutorial size")]
    #[test_case(1u64 << 20; "one mebi words")]
    fn chunking_covers_whole_database(db_size: u64) {
        let params = Params::new(db_size).expect("Must be able to derive parameters");

        assert_eq!(params.chunk_size, (db_size as f64).sqrt().floor() as u64);
        assert!(params.padded_db_size() >= db_size);
        assert!(params.padded_db_size() - db_size < params.chunk_size);
        assert!(params.chunk_of(db_size - 1) < params.chunk_num);
        assert!(params.max_queries >= 1);
        assert!(params.num_primary_hints >= params.max_queries);
        assert!(params.num_backup_hints_per_chunk >= 1);
    }

    #[test]
    fn tutorial_parameters_match_known_constants() {
        let params = Params::new(10_000).unwrap();

        assert_eq!(params.chunk_size, 100);
        assert_eq!(params.chunk_num, 100);
        assert_eq!(params.max_queries, 922);
        assert_eq!(params.num_primary_hints, 4 * 922);
        assert_eq!(params.num_backup_hints_per_chunk, 40);
        assert_eq!(params.punctured_vector_len(), 99);
    }

    #[test]
    fn parameters_are_reproducible_from_db_size() {
        assert_eq!(Params::new(12345), Params::new(12345));
    }

    #[test]
    fn degenerate_configurations_are_rejected() {
        assert_eq!(Params::new(0), Err(PianoPIRError::InvalidDatabaseSize));
        assert_eq!(Params::with_capacities(16, 4, 0, 4), Err(PianoPIRError::InvalidHintCapacity));
        assert_eq!(Params::with_capacities(16, 4, 4, 0), Err(PianoPIRError::InvalidHintCapacity));
    }
}
