use super::{branch_opt_util, error::PianoPIRError, params::Params};
use std::cmp::min;

const LEN_PREFIX_BYTE_LEN: usize = std::mem::size_of::<u32>();
const WORD_BYTE_LEN: usize = std::mem::size_of::<u64>();

/// Encodes a vector of 64 -bit words, for transmission over the wire.
///
/// Layout is a little-endian `u32` element count, followed by each word in little-endian byte order.
/// Punctured offset vectors, candidate parity vectors and database chunks all travel in this form.
///
/// # Arguments
///
/// * `words` - The words to encode. At most `u32::MAX` of them.
///
/// # Returns
///
/// A byte vector of length `4 + 8 * words.len()`.
pub fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    let mut bytes = vec![0u8; LEN_PREFIX_BYTE_LEN + words.len() * WORD_BYTE_LEN];

    bytes[..LEN_PREFIX_BYTE_LEN].copy_from_slice(&(words.len() as u32).to_le_bytes());
    bytes[LEN_PREFIX_BYTE_LEN..]
        .chunks_exact_mut(WORD_BYTE_LEN)
        .zip(words)
        .for_each(|(buf, &word)| u64_to_le_bytes(word, buf));

    bytes
}

/// Decodes a vector of 64 -bit words, encoded using [`words_to_bytes`].
///
/// Returns an error if the byte slice is too short to hold the length prefix or if its length doesn't match
/// the element count it declares.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u64>, PianoPIRError> {
    if branch_opt_util::unlikely(bytes.len() < LEN_PREFIX_BYTE_LEN) {
        return Err(PianoPIRError::FailedToDeserialize(format!(
            "need at least {} bytes for length prefix, found {}",
            LEN_PREFIX_BYTE_LEN,
            bytes.len()
        )));
    }

    let (prefix, body) = bytes.split_at(LEN_PREFIX_BYTE_LEN);
    let num_words = u64_from_le_bytes(prefix) as usize;

    if branch_opt_util::unlikely(body.len() != num_words * WORD_BYTE_LEN) {
        return Err(PianoPIRError::FailedToDeserialize(format!(
            "declared {} words, which need {} bytes, found {}",
            num_words,
            num_words * WORD_BYTE_LEN,
            body.len()
        )));
    }

    Ok(body.chunks_exact(WORD_BYTE_LEN).map(u64_from_le_bytes).collect())
}

/// Encodes PIR parameters for the setup handshake. Only the database size travels, everything else is derived.
pub fn params_to_bytes(params: &Params) -> [u8; WORD_BYTE_LEN] {
    params.db_size.to_le_bytes()
}

/// Decodes and re-derives PIR parameters from bytes produced by [`params_to_bytes`].
pub fn params_from_bytes(bytes: &[u8]) -> Result<Params, PianoPIRError> {
    if branch_opt_util::unlikely(bytes.len() != WORD_BYTE_LEN) {
        return Err(PianoPIRError::FailedToDeserialize(format!(
            "parameters must be {} bytes, found {}",
            WORD_BYTE_LEN,
            bytes.len()
        )));
    }

    Params::new(u64_from_le_bytes(bytes))
}

/// Little-endian u64 from the first (at most) 8 bytes of `bytes`. Missing high bytes are taken as zero, which is
/// how the 4 -bytes length prefix gets read.
#[inline(always)]
pub fn u64_from_le_bytes(bytes: &[u8]) -> u64 {
    let num_bytes = min(bytes.len(), WORD_BYTE_LEN);

    let mut word = [0u8; WORD_BYTE_LEN];
    word[..num_bytes].copy_from_slice(&bytes[..num_bytes]);

    u64::from_le_bytes(word)
}

/// Writes the low `min(bytes.len(), 8)` bytes of `word` into `bytes`, in little-endian order.
#[inline(always)]
pub fn u64_to_le_bytes(word: u64, bytes: &mut [u8]) {
    let num_bytes = min(bytes.len(), WORD_BYTE_LEN);
    bytes[..num_bytes].copy_from_slice(&word.to_le_bytes()[..num_bytes]);
}

#[cfg(test)]
mod test {
    use crate::pir_internals::{
        params::Params,
        serialization::{params_from_bytes, params_to_bytes, words_from_bytes, words_to_bytes},
    };
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn encode_words_and_recover() {
        let mut rng = ChaCha8Rng::from_os_rng();
        let words = (0..rng.random_range(0..1024)).map(|_| rng.random::<u64>()).collect::<Vec<_>>();

        let bytes = words_to_bytes(&words);
        assert_eq!(bytes.len(), 4 + 8 * words.len());
        assert_eq!(words_from_bytes(&bytes).expect("Must be able to decode successfully !"), words);
    }

    #[test]
    fn words_are_little_endian_on_the_wire() {
        let bytes = words_to_bytes(&[0x0807060504030201]);
        assert_eq!(bytes, vec![1, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn truncated_or_padded_encodings_are_rejected() {
        let bytes = words_to_bytes(&[1, 2, 3]);

        assert!(words_from_bytes(&bytes[..3]).is_err());
        assert!(words_from_bytes(&bytes[..bytes.len() - 1]).is_err());

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(words_from_bytes(&padded).is_err());
    }

    #[test]
    fn params_handshake_rederives_everything_from_db_size() {
        let params = Params::new(10_007).unwrap();
        assert_eq!(params_from_bytes(&params_to_bytes(&params)), Ok(params));

        assert!(params_from_bytes(&[0u8; 8]).is_err());
        assert!(params_from_bytes(&[1u8; 7]).is_err());
    }
}
