//! PianoPIR: A Rust library implementation of the single-server **P**rivate **I**nformation **R**etrieval (PIR) scheme with client-side preprocessing, described in <https://ia.cr/2023/452>.
//!
//! This crate provides a Rust library implementation of a PIR scheme where a client retrieves any word of a database of N words held by a single server,
//! without revealing which index it asked for. After a one-time offline phase, in which the client streams the whole database once and keeps only
//! O(sqrt(N) log N) pseudorandom "hints", each online query costs O(sqrt(N)) in both communication and server computation.
//!
//! ## Features
//!
//! * **Secure Private Information Retrieval:** The server only ever sees a punctured offset vector, of length `chunk_num - 1`, whatever the queried index is. It learns neither the index nor the retrieved word.
//! * **Sublinear Online Phase:** Server computes candidate parities for every possible punctured position with a single sliding window, in O(sqrt(N)).
//! * **Hint Refresh:** Every consumed hint is replaced by a backup hint, programmed at the just-retrieved index, so that a session can issue many queries sequentially.
//! * **Error Handling:** Hint misses and backup hint exhaustion, both of which happen with small probability, are reported as recoverable errors. Client can rebuild its hints and carry on.
//!
//! ## Usage
//!
//! Transport is left to the caller: every message is a plain byte vector, see `demos/` for a TCP client and server built on tokio.
//! Servers stream database chunks and answer queries, while clients build hints from those chunks, then query and recover words.
//!
//! Add PianoPIR as dependency to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! piano_pir = "=0.1.0"
//! rand = "=0.9.0"
//! rand_chacha = "=0.9.0"
//! ```
//!
//! Then, you can use it in your code:
//!
//! ```rust
//! use piano_pir::{client::Client, server::Server, SEED_BYTE_LEN};
//! use rand::prelude::*;
//! use rand_chacha::ChaCha8Rng;
//!
//! fn main() {
//!     let mut rng = ChaCha8Rng::from_os_rng();
//!
//!     // Server setup, with a database of 10,000 random 64 -bit words
//!     let mut server_seed = [0u8; SEED_BYTE_LEN];
//!     rng.fill_bytes(&mut server_seed);
//!     let server = Server::setup(10_000, &server_seed).expect("Server setup failed");
//!
//!     // Client setup (offline phase), streaming all database chunks once
//!     let mut client_seed = [0u8; SEED_BYTE_LEN];
//!     rng.fill_bytes(&mut client_seed);
//!     let mut client: Client = Client::setup(*server.params(), &client_seed, server.chunks()).expect("Client setup failed");
//!
//!     // Client query (online phase)
//!     let index = 4242;
//!     if let Ok(query) = client.query(index) {
//!         // Send `query` to the server
//!
//!         // Server response (online phase)
//!         let response = server.respond(&query).expect("Server failed to respond");
//!
//!         // Client processes the response (online phase)
//!         match client.process_response(&response) {
//!             Ok(word) => println!("DB[{}] = {:#018x}", index, word),
//!             Err(e) => println!("Failed to retrieve word: {}", e),
//!         }
//!     } else {
//!         println!("Failed to generate query.");
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! * `server`: Contains the `Server` struct and associated methods for holding a database, streaming it chunk by chunk and responding to client queries.
//! * `client`: Contains the `Client` struct and associated methods for building hints, generating PIR queries and recovering answers from server responses.

pub use pir_internals::database::Database;
pub use pir_internals::error::PianoPIRError;
pub use pir_internals::hint::Hint;
pub use pir_internals::params::{Params, SEED_BYTE_LEN};
pub use pir_internals::prf::{Prf, TurboShakePrf};
pub use pir_internals::serialization::{params_from_bytes, params_to_bytes, words_from_bytes, words_to_bytes};
pub mod client;
pub mod server;

mod pir_internals;

mod test_pir;
