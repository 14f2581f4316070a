use std::error::Error;
use std::sync::Arc;

use piano_pir::{SEED_BYTE_LEN, params_to_bytes, server::Server};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

const DB_SIZE: u64 = 1u64 << 16;
const HOST_IP: &str = "127.0.0.1";
const HOST_PORT: u16 = 8080;

async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> std::io::Result<()> {
    stream.write_all(&(frame.len() as u32).to_le_bytes()).await?;
    stream.write_all(frame).await
}

async fn serve(server: Arc<Server>, mut stream: TcpStream) -> Result<(), Box<dyn Error + Send + Sync>> {
    let params = *server.params();

    // Offline phase: parameters, then whole database, chunk by chunk
    stream.write_all(&params_to_bytes(&params)).await?;
    for chunk_id in 0..params.chunk_num {
        write_frame(&mut stream, &server.chunk_bytes(chunk_id)?).await?;
    }
    tracing::info!(chunk_num = params.chunk_num, "streamed database to PIR client");

    // Online phase: answer queries until client hangs up
    loop {
        let mut query_len_buf = [0u8; 4];
        if stream.read_exact(&mut query_len_buf).await.is_err() {
            break;
        }

        let mut query = vec![0u8; u32::from_le_bytes(query_len_buf) as usize];
        stream.read_exact(&mut query).await?;

        let response = server.respond(&query)?;
        write_frame(&mut stream, &response).await?;

        tracing::debug!(query_len = query.len(), response_len = response.len(), "answered query");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let server_address = format!("{}:{}", HOST_IP, HOST_PORT);
    let listener = TcpListener::bind(&server_address).await?;

    let mut rng = ChaCha8Rng::from_os_rng();
    let mut seed = [0u8; SEED_BYTE_LEN];
    rng.fill_bytes(&mut seed);

    let server = Arc::new(Server::setup(DB_SIZE, &seed)?);
    tracing::info!(db_size = DB_SIZE, address = %server_address, "PIR server listening");

    loop {
        let (stream, peer_address) = listener.accept().await?;
        tracing::info!(%peer_address, "new connection from PIR client");

        // Cheap cloning, because it's Arced !
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = serve(server, stream).await {
                tracing::error!(%peer_address, error = %e, "connection failed");
            }
        });
    }
}
