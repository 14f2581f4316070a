use crate::{
    PianoPIRError,
    pir_internals::{
        branch_opt_util,
        database::Database,
        params::{Params, SEED_BYTE_LEN},
        serialization,
    },
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Represents the server in the single-server, client-preprocessing **P**rivate **I**nformation **R**etrieval scheme.
///
/// The server owns an immutable database of N words, virtually padded with zero words up to `chunk_size * chunk_num`,
/// so that the last, possibly partial, chunk can be addressed like any other. It holds no per-client state: answering
/// a query is a pure function of the query and the database, hence a single `Server` can be shared among any number of
/// concurrently querying clients.
#[derive(Clone, Debug)]
pub struct Server<D: Database = Vec<u64>> {
    db: D,
    params: Params,
}

impl Server<Vec<u64>> {
    /// Sets up a server holding a database of `db_size` pseudorandom words, sampled using ChaCha8 seeded with `seed`.
    ///
    /// Returns an error if `db_size` is zero.
    pub fn setup(db_size: u64, seed: &[u8; SEED_BYTE_LEN]) -> Result<Server, PianoPIRError> {
        let params = Params::new(db_size)?;

        let mut rng = ChaCha8Rng::from_seed(*seed);
        let db = (0..db_size).map(|_| rng.next_u64()).collect::<Vec<u64>>();

        Ok(Server { db, params })
    }
}

impl<D: Database> Server<D> {
    /// Sets up a server on top of caller-supplied content. The scheme is agnostic to what the words mean.
    ///
    /// Returns an error if the database is empty.
    pub fn from_database(db: D) -> Result<Server<D>, PianoPIRError> {
        let params = Params::new(db.size())?;
        Ok(Server { db, params })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Word at `index` of the zero-padded database.
    #[inline(always)]
    fn word_at(&self, index: u64) -> u64 {
        if branch_opt_util::likely(index < self.params.db_size) { self.db.read(index) } else { 0 }
    }

    /// Returns `chunk_size` words of chunk `chunk_id`, zero-padded past the end of the database.
    ///
    /// Streaming every chunk to a client, in order, is the offline phase of the protocol. It reveals nothing about
    /// future queries because the client receives the database in its entirety.
    pub fn chunk(&self, chunk_id: u64) -> Result<Vec<u64>, PianoPIRError> {
        if branch_opt_util::unlikely(chunk_id >= self.params.chunk_num) {
            return Err(PianoPIRError::IndexOutOfRange {
                index: chunk_id,
                db_size: self.params.chunk_num,
            });
        }

        Ok(self.padded_chunk(chunk_id))
    }

    /// Iterates over all chunks of the database, in order. See [`Server::chunk`].
    pub fn chunks(&self) -> impl Iterator<Item = Vec<u64>> + '_ {
        (0..self.params.chunk_num).map(|chunk_id| self.padded_chunk(chunk_id))
    }

    fn padded_chunk(&self, chunk_id: u64) -> Vec<u64> {
        let chunk_begin = chunk_id * self.params.chunk_size;
        (chunk_begin..chunk_begin + self.params.chunk_size).map(|index| self.word_at(index)).collect()
    }

    /// Same as [`Server::chunk`], serialized for transmission.
    pub fn chunk_bytes(&self, chunk_id: u64) -> Result<Vec<u8>, PianoPIRError> {
        self.chunk(chunk_id).map(|words| serialization::words_to_bytes(&words))
    }

    /// Reads a database word in the clear. Using it for a query defeats privacy, it exists for correctness drivers only.
    #[cfg(any(test, feature = "direct_read"))]
    pub fn read_direct(&self, index: u64) -> Result<u64, PianoPIRError> {
        if branch_opt_util::unlikely(index >= self.params.db_size) {
            return Err(PianoPIRError::IndexOutOfRange {
                index,
                db_size: self.params.db_size,
            });
        }

        Ok(self.db.read(index))
    }

    /// Answers a punctured query, without learning which chunk the client punctured.
    ///
    /// The offset vector holds `chunk_num - 1` offsets, each in `[0, chunk_size)`. For every possible punctured position
    /// `k`, the server computes the parity of the words picked by interpreting the vector as the offsets of all chunks
    /// but `k`, in order. All `chunk_num` candidates are computed with one sliding window:
    ///
    /// 1. `parities[0]` assumes chunk 0 was punctured, so `offsets[i]` applies to chunk `i + 1`.
    /// 2. Moving the puncture from chunk `i` to chunk `i + 1` makes `offsets[i]` apply to chunk `i` instead, so
    ///    `parities[i + 1] = parities[i] ^ DB[(i + 1) * chunk_size + offsets[i]] ^ DB[i * chunk_size + offsets[i]]`.
    ///
    /// Work is O(chunk_num) word operations regardless of which position the client punctured.
    ///
    /// # Returns
    ///
    /// The `chunk_num` candidate parities, indexed by punctured chunk position. Returns an error if the offset vector
    /// has the wrong length or any offset doesn't fit in a chunk, both of which are client bugs.
    pub fn process(&self, offsets: &[u64]) -> Result<Vec<u64>, PianoPIRError> {
        let Params { chunk_size, chunk_num, .. } = self.params;

        if branch_opt_util::unlikely(offsets.len() as u64 != chunk_num - 1) {
            return Err(PianoPIRError::MalformedOffsetVector {
                expected: chunk_num - 1,
                found: offsets.len() as u64,
            });
        }
        if let Some((position, &offset)) = offsets.iter().enumerate().find(|&(_, &offset)| offset >= chunk_size) {
            branch_opt_util::cold();
            return Err(PianoPIRError::OffsetOutOfRange {
                position: position as u64,
                offset,
                chunk_size,
            });
        }

        let mut parities = vec![0u64; chunk_num as usize];

        parities[0] = offsets
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &offset)| acc ^ self.word_at((i as u64 + 1) * chunk_size + offset));

        for (i, &offset) in offsets.iter().enumerate() {
            let next_chunk_word = self.word_at((i as u64 + 1) * chunk_size + offset);
            let this_chunk_word = self.word_at(i as u64 * chunk_size + offset);

            parities[i + 1] = parities[i] ^ next_chunk_word ^ this_chunk_word;
        }

        tracing::trace!(chunk_num, "processed punctured query");
        Ok(parities)
    }

    /// Responds to a client query, received as bytes.
    ///
    /// Deserializes the punctured offset vector, computes candidate parities using [`Server::process`] and serializes
    /// them for the client.
    pub fn respond(&self, query: &[u8]) -> Result<Vec<u8>, PianoPIRError> {
        let offsets = serialization::words_from_bytes(query)?;
        let parities = self.process(&offsets)?;

        Ok(serialization::words_to_bytes(&parities))
    }
}

#[cfg(test)]
mod test {
    use crate::{PianoPIRError, pir_internals::serialization, server::Server};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use rayon::prelude::*;
    use std::sync::Arc;

    fn toy_server() -> Server {
        Server::from_database((0..16).collect::<Vec<u64>>()).expect("Server setup failed")
    }

    /// Parity of all chunks but `punctured`, where the offsets of the remaining chunks are read from `offsets` in order.
    fn naive_parity(db: &[u64], chunk_size: u64, chunk_num: u64, offsets: &[u64], punctured: u64) -> u64 {
        (0..chunk_num)
            .filter(|&chunk_id| chunk_id != punctured)
            .zip(offsets)
            .map(|(chunk_id, &offset)| db.get((chunk_id * chunk_size + offset) as usize).copied().unwrap_or(0))
            .fold(0, |acc, word| acc ^ word)
    }

    #[test]
    fn setup_rejects_empty_database() {
        assert_eq!(Server::setup(0, &[0u8; 32]).err(), Some(PianoPIRError::InvalidDatabaseSize));
        assert_eq!(Server::from_database(Vec::<u64>::new()).err(), Some(PianoPIRError::InvalidDatabaseSize));
    }

    #[test]
    fn setup_is_deterministic_in_seed() {
        let server_a = Server::setup(100, &[7u8; 32]).unwrap();
        let server_b = Server::setup(100, &[7u8; 32]).unwrap();
        let server_c = Server::setup(100, &[8u8; 32]).unwrap();

        assert_eq!(server_a.read_direct(42), server_b.read_direct(42));
        assert_ne!(server_a.chunk(3), server_c.chunk(3));
    }

    #[test]
    fn concrete_punctured_query() {
        let server = toy_server();
        let parities = server.process(&[1, 2, 3]).expect("Server can't process");

        assert_eq!(parities.len(), 4);
        assert_eq!(parities[2], 1 ^ 6 ^ 15);
        for punctured in 0..4 {
            assert_eq!(parities[punctured as usize], naive_parity(&(0..16).collect::<Vec<_>>(), 4, 4, &[1, 2, 3], punctured));
        }
    }

    #[test]
    fn sliding_window_matches_naive_parity() {
        let mut rng = ChaCha8Rng::from_os_rng();

        for db_size in [1u64, 2, 3, 10, 17, 99, 1000, 1025] {
            let db = (0..db_size).map(|_| rng.random::<u64>()).collect::<Vec<_>>();
            let server = Server::from_database(db.clone()).unwrap();
            let params = *server.params();

            let offsets = (0..params.chunk_num - 1).map(|_| rng.random_range(0..params.chunk_size)).collect::<Vec<_>>();
            let parities = server.process(&offsets).unwrap();

            assert_eq!(parities.len() as u64, params.chunk_num);
            for punctured in 0..params.chunk_num {
                assert_eq!(
                    parities[punctured as usize],
                    naive_parity(&db, params.chunk_size, params.chunk_num, &offsets, punctured),
                    "db_size = {}, punctured = {}",
                    db_size,
                    punctured
                );
            }
        }
    }

    #[test]
    fn malformed_offset_vectors_are_rejected() {
        let server = toy_server();

        assert_eq!(server.process(&[1, 2]), Err(PianoPIRError::MalformedOffsetVector { expected: 3, found: 2 }));
        assert_eq!(server.process(&[1, 2, 3, 0]), Err(PianoPIRError::MalformedOffsetVector { expected: 3, found: 4 }));
        assert_eq!(
            server.process(&[1, 4, 3]),
            Err(PianoPIRError::OffsetOutOfRange {
                position: 1,
                offset: 4,
                chunk_size: 4
            })
        );
        assert!(server.respond(&[0u8; 3]).is_err());
    }

    #[test]
    fn respond_is_process_over_the_wire() {
        let server = toy_server();

        let response = server.respond(&serialization::words_to_bytes(&[1, 2, 3])).unwrap();
        assert_eq!(serialization::words_from_bytes(&response).unwrap(), server.process(&[1, 2, 3]).unwrap());
    }

    #[test]
    fn partial_last_chunk_is_zero_padded() {
        let server = Server::from_database((1..=10).collect::<Vec<u64>>()).unwrap();
        let params = *server.params();

        assert_eq!((params.chunk_size, params.chunk_num), (3, 4));
        assert_eq!(server.chunk(3).unwrap(), vec![10, 0, 0]);
        assert_eq!(server.chunks().count() as u64, params.chunk_num);
        assert!(server.chunk(4).is_err());
        assert!(server.read_direct(10).is_err());

        // Puncturing chunk 0, offset 2 lands past the end of the database, in the last chunk.
        let parities = server.process(&[0, 0, 2]).unwrap();
        assert_eq!(parities[0], 4 ^ 7);
    }

    #[test]
    fn concurrent_processing_matches_sequential() {
        let server = Arc::new(Server::setup(4096, &[1u8; 32]).unwrap());
        let params = *server.params();

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let queries = (0..64)
            .map(|_| (0..params.chunk_num - 1).map(|_| rng.random_range(0..params.chunk_size)).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let sequential = queries.iter().map(|q| server.process(q).unwrap()).collect::<Vec<_>>();
        let parallel = queries.par_iter().map(|q| server.process(q).unwrap()).collect::<Vec<_>>();

        assert_eq!(sequential, parallel);
    }
}
