#[cfg(test)]
#[path = "ids_test.rs"]
mod tests;

use rand::rngs::OsRng;
use rand::RngCore;

// 64 symbols, so every random byte maps onto the alphabet without bias.
const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz-";

pub const ID_LENGTH: usize = 12;

/// Creates a message id from the operating system's secure random source.
pub fn generate() -> String {
    return generate_with_size(ID_LENGTH);
}

pub fn generate_with_size(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    OsRng.fill_bytes(&mut bytes);

    return bytes
        .iter()
        .map(|byte| {
            return ALPHABET[*byte as usize % ALPHABET.len()] as char;
        })
        .collect();
}
