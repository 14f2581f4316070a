use divan;
use piano_pir::{SEED_BYTE_LEN, client::Client, server::Server};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

fn main() {
    divan::main();
}

#[derive(Debug)]
struct DBConfig {
    db_size: u64,
}

const ARGS: &[DBConfig] = &[DBConfig { db_size: 1u64 << 16 }, DBConfig { db_size: 1u64 << 20 }];

fn random_seed(rng: &mut ChaCha8Rng) -> [u8; SEED_BYTE_LEN] {
    let mut seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut seed);
    seed
}

#[divan::bench(args = ARGS, max_time = Duration::from_secs(300), skip_ext_time = true)]
fn server_setup(bencher: divan::Bencher, db_config: &DBConfig) {
    let mut rng = ChaCha8Rng::from_os_rng();
    let seed = random_seed(&mut rng);

    bencher.bench(|| Server::setup(divan::black_box(db_config.db_size), divan::black_box(&seed)));
}

#[divan::bench(args = ARGS, max_time = Duration::from_secs(300), skip_ext_time = true)]
fn client_setup(bencher: divan::Bencher, db_config: &DBConfig) {
    let mut rng = ChaCha8Rng::from_os_rng();

    let server = Server::setup(db_config.db_size, &random_seed(&mut rng)).unwrap();
    let chunks = server.chunks().collect::<Vec<_>>();
    let seed = random_seed(&mut rng);

    bencher.bench(|| Client::<piano_pir::TurboShakePrf>::setup(*server.params(), divan::black_box(&seed), divan::black_box(&chunks)));
}
