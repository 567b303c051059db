//! Security Processor Liaison (SPL) Service Implementation.
//!
//! This crate provides clients for the `spl` service family and for `csrng`:
//! - **spl:**: general commands (configuration, random bytes, exp-mod)
//! - **spl:mig**: AES keys, AES-CTR, CMAC and the engine lock
//! - **spl:ssl**, **spl:es**, **spl:fs**, **spl:manu**: per-role RSA and
//!   titlekey commands
//! - **csrng**: cryptographically secure random bytes
//!
//! [`SplClient`] owns one session per role and sends every command on the
//! session [`routing`] picks for it. Below 4.0.0 the roles do not exist and
//! all of them share the `spl:` session.

#![cfg_attr(not(test), no_std)]

mod client;
mod cmif;
mod config;
mod csrng;
mod error;
mod proto;
pub mod routing;

pub use self::{
    client::SplClient,
    config::SplConfig,
    csrng::CsrngClient,
    error::CommandError,
    proto::{
        AES_BLOCK_SIZE, ALL_RECORDS, CRYPTO_SERVICE_NAME, CSRNG_SERVICE_NAME, ConfigItem,
        ES_SERVICE_NAME, FS_SERVICE_NAME, GENERAL_SERVICE_NAME, MANU_SERVICE_NAME,
        MAX_STATIC_OUTPUT, PACKAGE2_HASH_SIZE, RSA_BUFFER_SIZE, SSL_SERVICE_NAME,
    },
    routing::{Facade, OpenSet, Route, Slot},
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_well_formed() {
        for record in ALL_RECORDS {
            assert_eq!(record.validate(), Ok(()), "{}", record.name);
        }
    }

    #[test]
    fn test_key_records_match_block_size() {
        assert_eq!(proto::KEY_OUT.size, AES_BLOCK_SIZE);
        assert_eq!(proto::KEY_GENERATION_IN.size, 0x18);
        assert_eq!(proto::SET_CONFIG_IN.size, 0x10);
        assert_eq!(proto::ENCRYPT_RSA_KEY_FOR_IMPORT_IN.size, 0x44);
    }
}
