//! SPL protocol constants and wire records.

use nx_sf::{
    ServiceName,
    wire::{self, Field, Record},
};

/// Size of an AES block, and of every wrapped or sealed key.
pub const AES_BLOCK_SIZE: usize = 0x10;

/// Size of RSA inputs, moduli and outputs.
pub const RSA_BUFFER_SIZE: usize = 0x100;

/// Size of the package2 hash.
pub const PACKAGE2_HASH_SIZE: usize = 0x20;

/// Largest output the client accepts through a receive static.
///
/// Such outputs are received into a staging buffer of this size and only
/// copied to the caller once the service has reported success.
pub const MAX_STATIC_OUTPUT: usize = 0x400;

pub const GENERAL_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:");
pub const CRYPTO_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:mig");
pub const SSL_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:ssl");
pub const ES_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:es");
pub const FS_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:fs");
pub const MANU_SERVICE_NAME: ServiceName = ServiceName::from_static("spl:manu");
pub const CSRNG_SERVICE_NAME: ServiceName = ServiceName::from_static("csrng");

pub const CMD_GET_CONFIG: u32 = 0;
pub const CMD_USER_EXP_MOD: u32 = 1;
pub const CMD_GENERATE_AES_KEK: u32 = 2;
pub const CMD_LOAD_AES_KEY: u32 = 3;
pub const CMD_GENERATE_AES_KEY: u32 = 4;
pub const CMD_SET_CONFIG: u32 = 5;
pub const CMD_GET_RANDOM_BYTES: u32 = 7;
pub const CMD_FS_LOAD_SECURE_EXP_MOD_KEY: u32 = 9;
pub const CMD_FS_SECURE_EXP_MOD: u32 = 10;
pub const CMD_IS_DEVELOPMENT: u32 = 11;
pub const CMD_FS_GENERATE_SPECIFIC_AES_KEY: u32 = 12;
pub const CMD_DECRYPT_RSA_PRIVATE_KEY: u32 = 13;
pub const CMD_DECRYPT_AES_KEY: u32 = 14;
pub const CMD_CRYPT_AES_CTR: u32 = 15;
pub const CMD_COMPUTE_CMAC: u32 = 16;
pub const CMD_ES_LOAD_RSA_OAEP_KEY: u32 = 17;
pub const CMD_ES_UNWRAP_RSA_OAEP_WRAPPED_TITLEKEY: u32 = 18;
pub const CMD_FS_LOAD_TITLEKEY: u32 = 19;
pub const CMD_ES_UNWRAP_AES_WRAPPED_TITLEKEY: u32 = 20;
pub const CMD_LOCK_AES_ENGINE: u32 = 21;
pub const CMD_UNLOCK_AES_ENGINE: u32 = 22;
pub const CMD_GET_SECURITY_ENGINE_EVENT: u32 = 23;
pub const CMD_SET_SHARED_DATA: u32 = 24;
pub const CMD_GET_SHARED_DATA: u32 = 25;
pub const CMD_SSL_IMPORT_RSA_KEY: u32 = 26;
pub const CMD_SSL_SECURE_EXP_MOD: u32 = 27;
pub const CMD_ES_IMPORT_RSA_KEY: u32 = 28;
pub const CMD_ES_SECURE_EXP_MOD: u32 = 29;
pub const CMD_MANU_ENCRYPT_RSA_KEY_FOR_IMPORT: u32 = 30;
pub const CMD_FS_GET_PACKAGE2_HASH: u32 = 31;

/// csrng command: GetRandomBytes.
pub const CMD_CSRNG_GET_RANDOM_BYTES: u32 = 0;

pub const CONFIG_ITEM_IN: Record = Record::new("ConfigItemIn", 4, &[Field::u32("item", 0)]);

pub const CONFIG_VALUE_OUT: Record = Record::new("ConfigValueOut", 8, &[Field::u64("value", 0)]);

/// `value` is naturally aligned at offset 8, which is where the service reads
/// it, not packed against `item`.
pub const SET_CONFIG_IN: Record = Record::new(
    "SetConfigIn",
    0x10,
    &[Field::u32("item", 0), Field::u64("value", 8)],
);

pub const IS_DEVELOPMENT_OUT: Record =
    Record::new("IsDevelopmentOut", 1, &[Field::u8("is_development", 0)]);

pub const SHARED_DATA: Record = Record::new("SharedData", 4, &[Field::u32("value", 0)]);

/// One key-sized output: a sealed key, sealed titlekey or CMAC.
pub const KEY_OUT: Record = Record::new("KeyOut", 0x10, &[Field::bytes("key", 0, AES_BLOCK_SIZE)]);

/// A wrapped key with the key generation and option it was wrapped for.
pub const KEY_GENERATION_IN: Record = Record::new(
    "KeyGenerationIn",
    0x18,
    &[
        Field::bytes("wrapped_key", 0, AES_BLOCK_SIZE),
        Field::u32("key_generation", 0x10),
        Field::u32("option", 0x14),
    ],
);

/// A sealed KEK with a key wrapped under it.
pub const KEY_PAIR_IN: Record = Record::new(
    "KeyPairIn",
    0x20,
    &[
        Field::bytes("sealed_kek", 0, AES_BLOCK_SIZE),
        Field::bytes("wrapped_key", 0x10, AES_BLOCK_SIZE),
    ],
);

pub const LOAD_AES_KEY_IN: Record = Record::new(
    "LoadAesKeyIn",
    0x24,
    &[
        Field::bytes("sealed_kek", 0, AES_BLOCK_SIZE),
        Field::bytes("wrapped_key", 0x10, AES_BLOCK_SIZE),
        Field::u32("keyslot", 0x20),
    ],
);

pub const CRYPT_AES_CTR_IN: Record =
    Record::new("CryptAesCtrIn", 0x10, &[Field::bytes("ctr", 0, AES_BLOCK_SIZE)]);

pub const KEYSLOT: Record = Record::new("Keyslot", 4, &[Field::u32("keyslot", 0)]);

pub const DECRYPT_RSA_PRIVATE_KEY_IN: Record = Record::new(
    "DecryptRsaPrivateKeyIn",
    0x24,
    &[
        Field::bytes("sealed_kek", 0, AES_BLOCK_SIZE),
        Field::bytes("wrapped_key", 0x10, AES_BLOCK_SIZE),
        Field::u32("version", 0x20),
    ],
);

pub const KEY_GENERATION_ONLY_IN: Record =
    Record::new("KeyGenerationOnlyIn", 4, &[Field::u32("key_generation", 0)]);

pub const UNWRAP_AES_WRAPPED_TITLEKEY_IN: Record = Record::new(
    "UnwrapAesWrappedTitlekeyIn",
    0x14,
    &[
        Field::bytes("aes_wrapped_titlekey", 0, AES_BLOCK_SIZE),
        Field::u32("key_generation", 0x10),
    ],
);

pub const LOAD_TITLEKEY_IN: Record = Record::new(
    "LoadTitlekeyIn",
    0x14,
    &[
        Field::bytes("sealed_titlekey", 0, AES_BLOCK_SIZE),
        Field::u32("keyslot", 0x10),
    ],
);

pub const ENCRYPT_RSA_KEY_FOR_IMPORT_IN: Record = Record::new(
    "EncryptRsaKeyForImportIn",
    0x44,
    &[
        Field::bytes("sealed_kek_pre", 0, AES_BLOCK_SIZE),
        Field::bytes("wrapped_key_pre", 0x10, AES_BLOCK_SIZE),
        Field::bytes("sealed_kek_post", 0x20, AES_BLOCK_SIZE),
        Field::bytes("wrapped_kek_post", 0x30, AES_BLOCK_SIZE),
        Field::u32("option", 0x40),
    ],
);

/// Every record this crate puts on the wire.
pub const ALL_RECORDS: &[Record] = &[
    wire::EMPTY,
    CONFIG_ITEM_IN,
    CONFIG_VALUE_OUT,
    SET_CONFIG_IN,
    IS_DEVELOPMENT_OUT,
    SHARED_DATA,
    KEY_OUT,
    KEY_GENERATION_IN,
    KEY_PAIR_IN,
    LOAD_AES_KEY_IN,
    CRYPT_AES_CTR_IN,
    KEYSLOT,
    DECRYPT_RSA_PRIVATE_KEY_IN,
    KEY_GENERATION_ONLY_IN,
    UNWRAP_AES_WRAPPED_TITLEKEY_IN,
    LOAD_TITLEKEY_IN,
    ENCRYPT_RSA_KEY_FOR_IMPORT_IN,
];

/// System configuration items readable through `GetConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConfigItem {
    DisableProgramVerification = 1,
    DramId = 2,
    SecurityEngineIrqNumber = 3,
    Version = 4,
    HardwareType = 5,
    IsRetail = 6,
    IsRecoveryBoot = 7,
    DeviceId = 8,
    BootReason = 9,
    MemoryArrange = 10,
    IsDebugMode = 11,
    KernelMemoryConfiguration = 12,
    IsChargerHiZModeEnabled = 13,
    IsKiosk = 14,
    NewHardwareType = 15,
    NewKeyGeneration = 16,
    Package2Hash = 17,
}

impl ConfigItem {
    /// Converts a raw item id, returning `None` for ids the system does not
    /// define.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        let item = match raw {
            1 => Self::DisableProgramVerification,
            2 => Self::DramId,
            3 => Self::SecurityEngineIrqNumber,
            4 => Self::Version,
            5 => Self::HardwareType,
            6 => Self::IsRetail,
            7 => Self::IsRecoveryBoot,
            8 => Self::DeviceId,
            9 => Self::BootReason,
            10 => Self::MemoryArrange,
            11 => Self::IsDebugMode,
            12 => Self::KernelMemoryConfiguration,
            13 => Self::IsChargerHiZModeEnabled,
            14 => Self::IsKiosk,
            15 => Self::NewHardwareType,
            16 => Self::NewKeyGeneration,
            17 => Self::Package2Hash,
            _ => return None,
        };
        Some(item)
    }

    pub const fn to_raw(self) -> u32 {
        self as u32
    }
}
