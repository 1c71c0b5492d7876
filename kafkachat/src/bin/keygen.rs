//! `kafkachat-keygen`: print a fresh symmetric key.
//!
//! ```bash
//! cargo run --bin kafkachat-keygen
//! ```

use clap::Parser;

use kafkachat::crypto::keys::SymmetricKey;

/// Generate a key for encrypting chat message bodies.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Generate a symmetric key for KafkaChat",
    after_help = "Share the printed key with every participant and set it as \
                  `symmetric_key` in their config file or pass it with --key. \
                  Participants without the key see encrypted messages as \
                  \"[Error decoding message]\"."
)]
struct KeygenArgs {}

fn main() {
    let _ = KeygenArgs::parse();
    println!("{}", SymmetricKey::generate().encode());
}
