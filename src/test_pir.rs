#![cfg(test)]

use crate::{PianoPIRError, client::Client, server::Server, words_from_bytes, words_to_bytes};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;
use test_case::test_case;

fn random_seed(rng: &mut ChaCha8Rng) -> [u8; 32] {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    seed
}

#[test_case(1; "single word database")]
#[test_case(16; "perfect square database")]
#[test_case(101; "database with partial last chunk")]
#[test_case(1024; "kibi word database")]
#[test_case(10_000; "tutorial sized database")]
fn test_pir_retrieves_correct_words_for_whole_query_budget(db_size: u64) {
    let mut rng = ChaCha8Rng::from_os_rng();

    let server = Server::setup(db_size, &random_seed(&mut rng)).expect("Server setup failed");
    let mut client: Client = Client::setup(*server.params(), &random_seed(&mut rng), server.chunks()).expect("Client setup failed");

    let num_queries = client.params().max_queries.min(db_size);
    for _ in 0..num_queries {
        let (index, query_bytes) = client.random_query_bytes().expect("Client can't generate query");
        assert_eq!(words_from_bytes(&query_bytes).unwrap().len() as u64, server.params().punctured_vector_len());

        let response_bytes = server.respond(&query_bytes).expect("Server can't respond");
        let received_word = client.process_response(&response_bytes).expect("Client can't recover word from response");

        assert_eq!(received_word, server.read_direct(index).unwrap(), "db_size = {}, index = {}", db_size, index);
    }

    assert_eq!(client.num_cached() as u64, num_queries);
}

#[test]
fn test_pir_with_caller_supplied_database() {
    const NUM_QUERIES: usize = 64;

    let mut rng = ChaCha8Rng::from_os_rng();
    let db = (0..5000u64).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect::<Vec<_>>();

    let server = Server::from_database(db.as_slice()).expect("Server setup failed");
    let mut client: Client = Client::setup(*server.params(), &random_seed(&mut rng), server.chunks()).expect("Client setup failed");

    let indices = (0..db.len() as u64).choose_multiple(&mut rng, NUM_QUERIES);
    for &index in &indices {
        let word = client.retrieve(index, |query| server.respond(query)).expect("Retrieval failed");
        assert_eq!(word, db[index as usize]);
    }

    // Second round is served from local cache.
    for &index in &indices {
        assert_eq!(client.retrieve(index, |_| Err(PianoPIRError::PendingQueryDoesNotExist)), Ok(db[index as usize]));
    }
}

#[test]
fn test_pir_keeps_going_by_rebuilding_hints() {
    let mut rng = ChaCha8Rng::from_os_rng();

    let server = Server::setup(400, &random_seed(&mut rng)).expect("Server setup failed");
    let params = crate::Params::with_capacities(400, 400, 256, 1).unwrap();
    let mut client: Client = Client::setup(params, &random_seed(&mut rng), server.chunks()).expect("Client setup failed");

    let mut num_rebuilds = 0;
    for index in 0..params.db_size {
        let word = match client.retrieve(index, |query| server.respond(query)) {
            Ok(word) => word,
            Err(PianoPIRError::BackupHintsExhausted { index: exhausted_at, .. }) => {
                assert_eq!(exhausted_at, index);
                num_rebuilds += 1;
                client.rebuild_hints(server.chunks()).expect("Hint rebuild failed");

                client.cached(index).expect("Answer is cached even when refresh fails")
            }
            Err(e) if e.is_recoverable_by_rebuilding_hints() => {
                num_rebuilds += 1;
                client.rebuild_hints(server.chunks()).expect("Hint rebuild failed");

                client.retrieve(index, |query| server.respond(query)).expect("Retrieval failed after rebuild")
            }
            Err(e) => panic!("Unexpected error: {}", e),
        };

        assert_eq!(word, server.read_direct(index).unwrap());
    }

    // One backup hint per chunk can't serve 20 sequential indices of the same chunk.
    assert!(num_rebuilds > 0);
    assert_eq!(client.num_cached() as u64, params.db_size);
}

#[test]
fn test_pir_server_is_shared_among_concurrent_clients() {
    const NUM_CLIENTS: usize = 8;
    const NUM_QUERIES: usize = 32;

    let mut rng = ChaCha8Rng::from_os_rng();
    let server = Arc::new(Server::setup(4096, &random_seed(&mut rng)).expect("Server setup failed"));

    let seeds = (0..NUM_CLIENTS).map(|_| random_seed(&mut rng)).collect::<Vec<_>>();

    seeds.par_iter().for_each(|seed| {
        let server = Arc::clone(&server);
        let mut client: Client = Client::setup(*server.params(), seed, server.chunks()).expect("Client setup failed");

        for _ in 0..NUM_QUERIES {
            let query = client.random_query().expect("Client can't select query");
            let offsets = client.prepare(&query).unwrap();
            let parities = server.process(&offsets).expect("Server can't process");

            assert_eq!(client.recover(&query, &parities), server.read_direct(query.index()));
        }
    });
}

#[test]
fn test_pir_rejects_tampered_messages() {
    let mut rng = ChaCha8Rng::from_os_rng();

    let server = Server::setup(256, &random_seed(&mut rng)).expect("Server setup failed");
    let mut client: Client = Client::setup(*server.params(), &random_seed(&mut rng), server.chunks()).expect("Client setup failed");

    let query_bytes = client.query(128).unwrap();
    let mut offsets = words_from_bytes(&query_bytes).unwrap();

    offsets.pop();
    assert!(matches!(server.respond(&words_to_bytes(&offsets)), Err(PianoPIRError::MalformedOffsetVector { .. })));

    let response_bytes = server.respond(&query_bytes).unwrap();
    assert!(client.process_response(&response_bytes[..response_bytes.len() - 8]).is_err());
    assert!(client.pending_query().is_some());

    assert_eq!(client.process_response(&response_bytes), server.read_direct(128));
}
