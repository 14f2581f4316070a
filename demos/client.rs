use std::error::Error;

use piano_pir::{SEED_BYTE_LEN, client::Client, params_from_bytes, words_from_bytes};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

const SERVER_IP: &str = "127.0.0.1";
const SERVER_PORT: u16 = 8080;
const INDICES: [u64; 4] = [0, 4242, 31337, 65535];

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;

    let mut frame = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    stream.read_exact(&mut frame).await?;

    Ok(frame)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let server_address = format!("{}:{}", SERVER_IP, SERVER_PORT);
    let mut stream = TcpStream::connect(&server_address).await?;
    tracing::info!(address = %server_address, "connected to PIR server");

    // Receive parameters, then whole database, chunk by chunk
    let mut params_buf = [0u8; 8];
    stream.read_exact(&mut params_buf).await?;
    let params = params_from_bytes(&params_buf)?;

    let mut chunks = Vec::with_capacity(params.chunk_num as usize);
    for _ in 0..params.chunk_num {
        chunks.push(words_from_bytes(&read_frame(&mut stream).await?)?);
    }

    let mut rng = ChaCha8Rng::from_os_rng();
    let mut seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut seed);

    let mut client: Client = Client::setup(params, &seed, &chunks)?;
    tracing::info!(db_size = params.db_size, num_primary_hints = params.num_primary_hints, "PIR client ready");

    for index in INDICES.into_iter().filter(|&index| index < params.db_size) {
        let query = match client.query(index) {
            Ok(query) => query,
            Err(e) if e.is_recoverable_by_rebuilding_hints() => {
                tracing::warn!(index, error = %e, "rebuilding hints");
                client.rebuild_hints(&chunks)?;
                client.query(index)?
            }
            Err(e) => return Err(e.into()),
        };

        stream.write_all(&(query.len() as u32).to_le_bytes()).await?;
        stream.write_all(&query).await?;

        let response = read_frame(&mut stream).await?;
        match client.process_response(&response) {
            Ok(word) => println!("DB[{}] = {:#018x}", index, word),
            Err(e) if e.is_recoverable_by_rebuilding_hints() => {
                // Answer is cached even when no backup hint was left for refreshing.
                println!("DB[{}] = {:#018x}", index, client.cached(index).unwrap_or_default());
                client.rebuild_hints(&chunks)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
