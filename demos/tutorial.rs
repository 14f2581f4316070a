use piano_pir::{PianoPIRError, SEED_BYTE_LEN, client::Client, server::Server};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DB_SIZE: u64 = 10_000;

fn main() -> Result<(), PianoPIRError> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut rng = ChaCha8Rng::from_os_rng();

    let mut server_seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut server_seed);
    let server = Server::setup(DB_SIZE, &server_seed)?;
    let params = *server.params();

    println!(
        "DB of {} words, in {} chunks of {} words. Budget of {} queries, with {} primary and {} backup hints per chunk.",
        params.db_size, params.chunk_num, params.chunk_size, params.max_queries, params.num_primary_hints, params.num_backup_hints_per_chunk
    );

    let mut client_seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut client_seed);

    let offline_begin = Instant::now();
    let mut client: Client = Client::setup(params, &client_seed, server.chunks())?;
    println!("Offline phase took {:?}", offline_begin.elapsed());

    let num_queries = params.max_queries.min(params.db_size);
    let mut num_rebuilds = 0;

    let online_begin = Instant::now();
    for _ in 0..num_queries {
        let (index, query) = match client.random_query_bytes() {
            Ok(query) => query,
            Err(e) if e.is_recoverable_by_rebuilding_hints() => {
                num_rebuilds += 1;
                client.rebuild_hints(server.chunks())?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let response = server.respond(&query)?;
        let word = match client.process_response(&response) {
            Ok(word) => word,
            Err(PianoPIRError::BackupHintsExhausted { index, .. }) => {
                num_rebuilds += 1;
                client.rebuild_hints(server.chunks())?;
                client.cached(index).ok_or(PianoPIRError::PendingQueryDoesNotExist)?
            }
            Err(e) => return Err(e),
        };

        let expected = server.read_direct(index)?;
        if word != expected {
            eprintln!("Mismatch at index {}: expected {:#018x}, found {:#018x}", index, expected, word);
            std::process::exit(1);
        }
    }
    let online_time = online_begin.elapsed();

    println!(
        "Finished {} queries in {:?}, {:?} per query, with {} hint rebuild(s). All answers match the database.",
        num_queries,
        online_time,
        online_time / num_queries as u32,
        num_rebuilds
    );

    Ok(())
}
