use crate::{
    PianoPIRError,
    pir_internals::{
        branch_opt_util,
        hint::Hint,
        params::{Params, SEED_BYTE_LEN},
        prf::{Prf, TurboShakePrf},
        serialization,
    },
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashMap;

/// An in-flight query, from selection of a primary hint until recovery of the answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Query {
    index: u64,
    chunk_id: u64,
    hit_id: usize,
}

impl Query {
    /// Database index being retrieved.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Chunk holding the index, which is the position punctured from the offset vector.
    pub fn chunk_id(&self) -> u64 {
        self.chunk_id
    }
}

/// Represents a client session of the single-server, client-preprocessing **P**rivate **I**nformation **R**etrieval scheme.
///
/// A session owns its random number generator, `M1` primary hints, `M2` backup hints per chunk and a cache of already
/// retrieved indices. It is mutated by each query, so queries must be issued one after another: select, prepare, let the
/// server process, then recover, which also refreshes the consumed hint.
#[derive(Clone, Debug)]
pub struct Client<P: Prf = TurboShakePrf> {
    params: Params,
    rng: ChaCha8Rng,
    /// `None` marks a retired slot, which can never serve a query again.
    primary_hints: Vec<Option<Hint<P>>>,
    /// Group `g` is `backup_hints[g * M2..(g + 1) * M2]`, each backup is taken out exactly once.
    backup_hints: Vec<Option<Hint<P>>>,
    local_cache: HashMap<u64, u64>,
    consumed_hint_num: Vec<u64>,
    pending_query: Option<Query>,
}

impl<P: Prf> Client<P> {
    /// Sets up a PIR client session, by running the offline phase over a stream of database chunks.
    ///
    /// The session's random number generator is ChaCha8, seeded with `seed`, so two sessions set up with the same seed
    /// over the same database end up in identical states. See [`Client::rebuild_hints`] for how hints are built.
    ///
    /// # Arguments
    ///
    /// * `params`: PIR parameters, derived from the database size.
    /// * `seed`: Seed of the session's random number generator.
    /// * `chunks`: All `chunk_num` chunks of the zero-padded database, in order, each `chunk_size` words long.
    ///
    /// # Returns
    ///
    /// A ready-to-query client session. Returns an error if the chunk stream doesn't match parameters.
    pub fn setup<I>(params: Params, seed: &[u8; SEED_BYTE_LEN], chunks: I) -> Result<Client<P>, PianoPIRError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u64]>,
    {
        let mut client = Client {
            params,
            rng: ChaCha8Rng::from_seed(*seed),
            primary_hints: Vec::new(),
            backup_hints: Vec::new(),
            local_cache: HashMap::new(),
            consumed_hint_num: vec![0; params.chunk_num as usize],
            pending_query: None,
        };

        client.rebuild_hints(chunks)?;
        Ok(client)
    }

    /// Samples fresh keys for all primary and backup hints and computes their parities, reading every chunk exactly once.
    ///
    /// Once this returns, each primary hint's parity is the XOR of the words it picks from all chunks, while each backup
    /// hint of group `g` misses the contribution of chunk `g`. Consumed-backup counters are reset and any pending query is
    /// dropped, but the local cache is kept, since database words never change. Call this to recover from
    /// [`PianoPIRError::HintMiss`] or [`PianoPIRError::BackupHintsExhausted`].
    ///
    /// On error, the session is left untouched.
    pub fn rebuild_hints<I>(&mut self, chunks: I) -> Result<(), PianoPIRError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u64]>,
    {
        let Params {
            chunk_size,
            chunk_num,
            num_primary_hints,
            num_backup_hints_per_chunk,
            ..
        } = self.params;

        let mut primary_hints = (0..num_primary_hints)
            .map(|_| Some(Hint::new(P::sample_key(&mut self.rng))))
            .collect::<Vec<_>>();
        let mut backup_hints = (0..self.params.num_backup_hints())
            .map(|_| Some(Hint::new(P::sample_key(&mut self.rng))))
            .collect::<Vec<_>>();

        let mut num_chunks = 0u64;
        for chunk in chunks {
            let chunk_id = num_chunks;
            let chunk = chunk.as_ref();

            if branch_opt_util::unlikely(chunk_id >= chunk_num) {
                return Err(PianoPIRError::UnexpectedChunkCount {
                    expected: chunk_num,
                    found: chunk_id + 1,
                });
            }
            if branch_opt_util::unlikely(chunk.len() as u64 != chunk_size) {
                return Err(PianoPIRError::InvalidChunkLength {
                    chunk_id,
                    expected: chunk_size,
                    found: chunk.len() as u64,
                });
            }

            primary_hints.par_iter_mut().flatten().for_each(|hint| {
                hint.xor_into_parity(chunk[hint.offset_at(chunk_id, chunk_size) as usize]);
            });
            backup_hints
                .par_chunks_mut(num_backup_hints_per_chunk as usize)
                .enumerate()
                .filter(|&(group, _)| group as u64 != chunk_id)
                .for_each(|(_, group)| {
                    group.iter_mut().flatten().for_each(|hint| {
                        hint.xor_into_parity(chunk[hint.offset_at(chunk_id, chunk_size) as usize]);
                    });
                });

            num_chunks += 1;
        }

        if branch_opt_util::unlikely(num_chunks != chunk_num) {
            return Err(PianoPIRError::UnexpectedChunkCount {
                expected: chunk_num,
                found: num_chunks,
            });
        }

        self.primary_hints = primary_hints;
        self.backup_hints = backup_hints;
        self.consumed_hint_num = vec![0; chunk_num as usize];
        self.pending_query = None;

        tracing::debug!(
            num_primary_hints,
            num_backup_hints = self.params.num_backup_hints(),
            chunk_num,
            "built hints from database snapshot"
        );
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of `index`, if it was already retrieved by this session.
    pub fn cached(&self, index: u64) -> Option<u64> {
        self.local_cache.get(&index).copied()
    }

    pub fn num_cached(&self) -> usize {
        self.local_cache.len()
    }

    pub fn pending_query(&self) -> Option<&Query> {
        self.pending_query.as_ref()
    }

    /// Number of backup hints of chunk `chunk_id` not yet promoted to primary.
    pub fn remaining_backup_hints(&self, chunk_id: u64) -> u64 {
        self.consumed_hint_num
            .get(chunk_id as usize)
            .map_or(0, |&consumed| self.params.num_backup_hints_per_chunk - consumed)
    }

    /// Number of primary hints which were not retired.
    pub fn num_live_primary_hints(&self) -> usize {
        self.primary_hints.iter().flatten().count()
    }

    /// Selects a primary hint, whose trace passes through `index`, for retrieving it.
    ///
    /// Fails if `index` is out of range, if it is already cached (read it using [`Client::cached`] instead, re-querying
    /// would link two queries), if another query is still pending or if no live primary hint covers `index`.
    pub fn select(&mut self, index: u64) -> Result<Query, PianoPIRError> {
        if branch_opt_util::unlikely(self.pending_query.is_some()) {
            return Err(PianoPIRError::PendingQueryExists);
        }
        if branch_opt_util::unlikely(index >= self.params.db_size) {
            return Err(PianoPIRError::IndexOutOfRange {
                index,
                db_size: self.params.db_size,
            });
        }
        if branch_opt_util::unlikely(self.local_cache.contains_key(&index)) {
            return Err(PianoPIRError::IndexAlreadyCached(index));
        }

        let chunk_size = self.params.chunk_size;
        let chunk_id = self.params.chunk_of(index);

        let hit_id = self
            .primary_hints
            .par_iter()
            .position_first(|slot| slot.as_ref().is_some_and(|hint| hint.element_at(chunk_id, chunk_size) == index));

        match hit_id {
            Some(hit_id) => {
                let query = Query { index, chunk_id, hit_id };
                self.pending_query = Some(query);
                Ok(query)
            }
            None => {
                tracing::warn!(index, chunk_id, "no live primary hint covers index");
                Err(PianoPIRError::HintMiss { index })
            }
        }
    }

    /// Selects a uniformly random index which isn't cached yet, and a primary hint covering it.
    pub fn random_query(&mut self) -> Result<Query, PianoPIRError> {
        if branch_opt_util::unlikely(self.pending_query.is_some()) {
            return Err(PianoPIRError::PendingQueryExists);
        }
        if branch_opt_util::unlikely(self.local_cache.len() as u64 >= self.params.db_size) {
            return Err(PianoPIRError::AllIndicesCached);
        }

        let index = loop {
            let index = self.rng.random_range(0..self.params.db_size);
            if !self.local_cache.contains_key(&index) {
                break index;
            }
        };

        self.select(index)
    }

    /// Punctured offset vector of a pending query: the selected hint's offset in each chunk, with the entry of the queried
    /// chunk removed by position. It always holds `chunk_num - 1` offsets, whichever chunk was punctured.
    pub fn prepare(&self, query: &Query) -> Result<Vec<u64>, PianoPIRError> {
        let hint = self.pending_hint(query)?;

        let mut offsets = hint.offsets(self.params.chunk_num, self.params.chunk_size);
        offsets.remove(query.chunk_id as usize);

        Ok(offsets)
    }

    /// Recovers the answer of a pending query from the server's candidate parities, caches it and refreshes the consumed
    /// primary hint.
    ///
    /// The candidate parity at the punctured position misses exactly the queried chunk's word from the hint's trace, so
    /// XORing it with the hint's parity leaves `DB[index]`. The consumed hint is then replaced by the next backup hint
    /// of the same chunk, programmed at `index`, whose parity gets the answer as its missing term.
    ///
    /// If the chunk has no backup hint left, the answer is still cached and the consumed slot is retired, but the call
    /// returns [`PianoPIRError::BackupHintsExhausted`], after which hints should be rebuilt. If the parity vector has the
    /// wrong length, the query stays pending, so it can be discarded.
    pub fn recover(&mut self, query: &Query, parities: &[u64]) -> Result<u64, PianoPIRError> {
        let hint_parity = self.pending_hint(query)?.parity();

        if branch_opt_util::unlikely(parities.len() as u64 != self.params.chunk_num) {
            return Err(PianoPIRError::InvalidResponseVector {
                expected: self.params.chunk_num,
                found: parities.len() as u64,
            });
        }

        let answer = parities[query.chunk_id as usize] ^ hint_parity;

        self.pending_query = None;
        self.local_cache.insert(query.index, answer);
        self.refresh(query, answer)?;

        Ok(answer)
    }

    fn refresh(&mut self, query: &Query, answer: u64) -> Result<(), PianoPIRError> {
        let group = query.chunk_id as usize;
        let num_backup_hints_per_chunk = self.params.num_backup_hints_per_chunk;
        let consumed = self.consumed_hint_num[group];

        let backup = if branch_opt_util::likely(consumed < num_backup_hints_per_chunk) {
            self.backup_hints[group * num_backup_hints_per_chunk as usize + consumed as usize].take()
        } else {
            None
        };

        match backup {
            Some(mut hint) => {
                hint.program(query.index);
                hint.xor_into_parity(answer);

                self.primary_hints[query.hit_id] = Some(hint);
                self.consumed_hint_num[group] += 1;

                Ok(())
            }
            None => {
                self.primary_hints[query.hit_id] = None;

                tracing::warn!(chunk_id = query.chunk_id, index = query.index, "backup hints exhausted, retired primary hint");
                Err(PianoPIRError::BackupHintsExhausted {
                    chunk_id: query.chunk_id,
                    index: query.index,
                })
            }
        }
    }

    /// Drops the pending query, if any, without recovering its answer.
    ///
    /// The hint it selected is retired, since the server may already have seen its punctured trace and a hint can't be
    /// rewound. Retry by selecting again, which picks a different hint.
    pub fn discard_query(&mut self) -> Option<Query> {
        let query = self.pending_query.take()?;
        self.primary_hints[query.hit_id] = None;

        tracing::warn!(index = query.index, "discarded pending query, retired its primary hint");
        Some(query)
    }

    fn pending_hint(&self, query: &Query) -> Result<&Hint<P>, PianoPIRError> {
        if branch_opt_util::unlikely(self.pending_query.as_ref() != Some(query)) {
            return Err(PianoPIRError::PendingQueryDoesNotExist);
        }

        self.primary_hints[query.hit_id].as_ref().ok_or(PianoPIRError::PendingQueryDoesNotExist)
    }

    /// Generates a PIR query for `index`, serialized for transmission to the server. See [`Client::select`] and
    /// [`Client::prepare`].
    pub fn query(&mut self, index: u64) -> Result<Vec<u8>, PianoPIRError> {
        let query = self.select(index)?;
        let offsets = self.prepare(&query)?;

        Ok(serialization::words_to_bytes(&offsets))
    }

    /// Generates a PIR query for a random, not yet cached index. Returns the index along with the serialized query.
    pub fn random_query_bytes(&mut self) -> Result<(u64, Vec<u8>), PianoPIRError> {
        let query = self.random_query()?;
        let offsets = self.prepare(&query)?;

        Ok((query.index, serialization::words_to_bytes(&offsets)))
    }

    /// Processes the server's serialized response to the pending query. See [`Client::recover`].
    pub fn process_response(&mut self, response: &[u8]) -> Result<u64, PianoPIRError> {
        let query = self.pending_query.ok_or(PianoPIRError::PendingQueryDoesNotExist)?;
        let parities = serialization::words_from_bytes(response)?;

        self.recover(&query, &parities)
    }

    /// Retrieves `DB[index]`, serving it from local cache when possible, which consumes no hint.
    ///
    /// Otherwise the serialized query is handed to `respond`, which is expected to carry it to the server and return the
    /// server's serialized response. If anything fails while the query is pending, the query is discarded.
    pub fn retrieve<F>(&mut self, index: u64, respond: F) -> Result<u64, PianoPIRError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, PianoPIRError>,
    {
        if let Some(value) = self.cached(index) {
            return Ok(value);
        }

        let query = self.query(index)?;
        let result = respond(query.as_slice()).and_then(|response| self.process_response(&response));

        if result.is_err() && self.pending_query.is_some() {
            self.discard_query();
        }
        result
    }
}
