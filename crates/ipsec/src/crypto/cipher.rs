//! Cipher primitives for ESP
//!
//! AES-GCM (RFC 4106), AES-CBC (RFC 3602) and AES-CTR (RFC 3686) over
//! 128, 192 and 256-bit keys. The key length selects the AES variant.

use crate::{Error, Result};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::{
    aead::{consts::U12, generic_array::typenum::Unsigned, Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use cbc::{Decryptor, Encryptor};
use cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use ctr::Ctr32BE;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// AES block length
pub const AES_BLOCK_LEN: usize = 16;
/// AES-GCM nonce length (4-byte salt + 8-byte IV)
pub const GCM_NONCE_LEN: usize = 12;
/// AES-GCM tag length
pub const GCM_TAG_LEN: usize = 16;
/// RFC 3686 nonce (salt) length
pub const CTR_NONCE_LEN: usize = 4;
/// RFC 3686 per-packet IV length
pub const CTR_IV_LEN: usize = 8;

fn bad_key(algo: &str, len: usize) -> Error {
    Error::Crypto(format!("invalid {} key length {}", algo, len))
}

/// Encrypt with AES-GCM, returning ciphertext with the tag appended
///
/// # Arguments
///
/// * `key` - 16, 24 or 32 byte key
/// * `nonce` - 12 byte nonce (salt | IV)
/// * `aad` - Additional authenticated data (ESP header)
/// * `plaintext` - Data to encrypt
pub fn aes_gcm_encrypt(key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    match key.len() {
        16 => gcm_encrypt_with::<Aes128Gcm>(key, nonce, payload),
        24 => gcm_encrypt_with::<Aes192Gcm>(key, nonce, payload),
        32 => gcm_encrypt_with::<Aes256Gcm>(key, nonce, payload),
        len => Err(bad_key("AES-GCM", len)),
    }
}

/// Decrypt with AES-GCM, verifying the trailing tag
///
/// # Errors
///
/// Returns `Crypto` if the tag does not verify
pub fn aes_gcm_decrypt(key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < GCM_TAG_LEN {
        return Err(Error::BufferTooShort {
            required: GCM_TAG_LEN,
            available: ciphertext.len(),
        });
    }
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    match key.len() {
        16 => gcm_decrypt_with::<Aes128Gcm>(key, nonce, payload),
        24 => gcm_decrypt_with::<Aes192Gcm>(key, nonce, payload),
        32 => gcm_decrypt_with::<Aes256Gcm>(key, nonce, payload),
        len => Err(bad_key("AES-GCM", len)),
    }
}

fn gcm_encrypt_with<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>> {
    check_nonce::<C>(nonce)?;
    let cipher = C::new_from_slice(key).map_err(|_| bad_key("AES-GCM", key.len()))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), payload)
        .map_err(|_| Error::Crypto("AES-GCM encryption failed".into()))
}

fn gcm_decrypt_with<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>> {
    check_nonce::<C>(nonce)?;
    let cipher = C::new_from_slice(key).map_err(|_| bad_key("AES-GCM", key.len()))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), payload)
        .map_err(|_| Error::Crypto("AES-GCM decryption failed".into()))
}

fn check_nonce<C: Aead>(nonce: &[u8]) -> Result<()> {
    if nonce.len() != C::NonceSize::USIZE {
        return Err(Error::Crypto(format!(
            "invalid AES-GCM nonce length {}",
            nonce.len()
        )));
    }
    Ok(())
}

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % AES_BLOCK_LEN != 0 {
        return Err(Error::Crypto(format!(
            "AES-CBC input length {} not a multiple of the block size",
            data.len()
        )));
    }
    Ok(())
}

/// Encrypt block-aligned `data` in place with AES-CBC
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let bad = |_| bad_key("AES-CBC", key.len());
    match key.len() {
        16 => cbc_encrypt_blocks(Encryptor::<Aes128>::new_from_slices(key, iv).map_err(bad)?, data),
        24 => cbc_encrypt_blocks(Encryptor::<Aes192>::new_from_slices(key, iv).map_err(bad)?, data),
        32 => cbc_encrypt_blocks(Encryptor::<Aes256>::new_from_slices(key, iv).map_err(bad)?, data),
        len => return Err(bad_key("AES-CBC", len)),
    }
    Ok(())
}

/// Decrypt block-aligned `data` in place with AES-CBC
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let bad = |_| bad_key("AES-CBC", key.len());
    match key.len() {
        16 => cbc_decrypt_blocks(Decryptor::<Aes128>::new_from_slices(key, iv).map_err(bad)?, data),
        24 => cbc_decrypt_blocks(Decryptor::<Aes192>::new_from_slices(key, iv).map_err(bad)?, data),
        32 => cbc_decrypt_blocks(Decryptor::<Aes256>::new_from_slices(key, iv).map_err(bad)?, data),
        len => return Err(bad_key("AES-CBC", len)),
    }
    Ok(())
}

fn cbc_encrypt_blocks<E: BlockEncryptMut>(mut enc: E, data: &mut [u8]) {
    for block in data.chunks_exact_mut(AES_BLOCK_LEN) {
        enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

fn cbc_decrypt_blocks<D: BlockDecryptMut>(mut dec: D, data: &mut [u8]) {
    for block in data.chunks_exact_mut(AES_BLOCK_LEN) {
        dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

/// RFC 3686 counter block: nonce | IV | 1
pub fn ctr_block(nonce: &[u8], iv: &[u8]) -> Result<[u8; AES_BLOCK_LEN]> {
    if nonce.len() != CTR_NONCE_LEN || iv.len() != CTR_IV_LEN {
        return Err(Error::Crypto(format!(
            "invalid AES-CTR nonce/IV length {}/{}",
            nonce.len(),
            iv.len()
        )));
    }
    let mut block = [0u8; AES_BLOCK_LEN];
    block[..4].copy_from_slice(nonce);
    block[4..12].copy_from_slice(iv);
    block[12..].copy_from_slice(&1u32.to_be_bytes());
    Ok(block)
}

/// Apply the AES-CTR keystream starting at `counter_block` (encrypt and decrypt)
pub fn aes_ctr_apply(key: &[u8], counter_block: &[u8; AES_BLOCK_LEN], data: &mut [u8]) -> Result<()> {
    let bad = |_| bad_key("AES-CTR", key.len());
    match key.len() {
        16 => Ctr32BE::<Aes128>::new_from_slices(key, counter_block)
            .map_err(bad)?
            .apply_keystream(data),
        24 => Ctr32BE::<Aes192>::new_from_slices(key, counter_block)
            .map_err(bad)?
            .apply_keystream(data),
        32 => Ctr32BE::<Aes256>::new_from_slices(key, counter_block)
            .map_err(bad)?
            .apply_keystream(data),
        len => return Err(bad_key("AES-CTR", len)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_gcm_empty_known_answer() {
        // McGrew-Viega GCM test case 1
        let tag = aes_gcm_encrypt(&[0u8; 16], &[0u8; 12], &[], &[]).unwrap();
        assert_eq!(hex::encode(tag), "58e2fccefa7e3061367f1d57a4e7455a");
    }

    #[test]
    fn test_aes_gcm_block_known_answer() {
        // McGrew-Viega GCM test case 2
        let out = aes_gcm_encrypt(&[0u8; 16], &[0u8; 12], &[], &[0u8; 16]).unwrap();
        assert_eq!(hex::encode(&out[..16]), "0388dace60b6a392f328c2b971b2fe78");
        assert_eq!(hex::encode(&out[16..]), "ab6e47d42cec13bdf53a67b21257bddf");
    }

    #[test]
    fn test_aes_gcm_roundtrip_all_key_sizes() {
        for key_len in [16, 24, 32] {
            let key = vec![0x42; key_len];
            let nonce = [0x01; 12];
            let aad = b"esp header";
            let ct = aes_gcm_encrypt(&key, &nonce, aad, b"Hello, ESP!").unwrap();
            assert_eq!(ct.len(), 11 + GCM_TAG_LEN);
            let pt = aes_gcm_decrypt(&key, &nonce, aad, &ct).unwrap();
            assert_eq!(pt, b"Hello, ESP!");
        }
    }

    #[test]
    fn test_aes_gcm_tamper_detected() {
        let key = [0x42; 32];
        let nonce = [0x01; 12];
        let mut ct = aes_gcm_encrypt(&key, &nonce, b"aad", b"test").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(
            aes_gcm_decrypt(&key, &nonce, b"aad", &ct),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_aes_gcm_invalid_lengths() {
        assert!(aes_gcm_encrypt(&[0u8; 20], &[0u8; 12], &[], b"x").is_err());
        assert!(aes_gcm_encrypt(&[0u8; 16], &[0u8; 8], &[], b"x").is_err());
        assert!(matches!(
            aes_gcm_decrypt(&[0u8; 16], &[0u8; 12], &[], &[0u8; 4]),
            Err(Error::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_aes_cbc_known_answer() {
        // SP 800-38A F.2.1
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let mut data = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        aes_cbc_encrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(hex::encode(&data), "7649abac8119b246cee98e9b12e9197d");

        aes_cbc_decrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(hex::encode(&data), "6bc1bee22e409f96e93d7e117393172a");
    }

    #[test]
    fn test_aes_cbc_rejects_unaligned() {
        let mut data = [0u8; 15];
        assert!(aes_cbc_encrypt(&[0u8; 16], &[0u8; 16], &mut data).is_err());
    }

    #[test]
    fn test_aes_ctr_known_answer() {
        // RFC 3686 test vector #1
        let key = hex::decode("ae6852f8121067cc4bf7a5765577f39e").unwrap();
        let block = ctr_block(&[0x00, 0x00, 0x00, 0x30], &[0u8; 8]).unwrap();
        let mut data = b"Single block msg".to_vec();
        aes_ctr_apply(&key, &block, &mut data).unwrap();
        assert_eq!(hex::encode(&data), "e4095d4fb7a7b3792d6175a3261311b8");
    }

    #[test]
    fn test_ctr_block_layout() {
        let block = ctr_block(&[1, 2, 3, 4], &[5, 6, 7, 8, 9, 10, 11, 12]).unwrap();
        assert_eq!(block, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 0, 0, 0, 1]);
        assert!(ctr_block(&[1, 2, 3], &[0; 8]).is_err());
    }
}
