//! ESP cryptographic primitives
//!
//! This module provides the primitives the reference ESP transform runs on:
//! - AES-GCM, AES-CBC and AES-CTR ciphers
//! - HMAC-SHA2 integrity check values

pub mod auth;
pub mod cipher;

pub use auth::{compute_icv, icv_matches, mac_len};
pub use cipher::{
    aes_cbc_decrypt, aes_cbc_encrypt, aes_ctr_apply, aes_gcm_decrypt, aes_gcm_encrypt, ctr_block,
    AES_BLOCK_LEN, CTR_IV_LEN, CTR_NONCE_LEN, GCM_NONCE_LEN, GCM_TAG_LEN,
};
