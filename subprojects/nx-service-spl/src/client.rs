//! The `spl` family client.

use nx_sf::{
    GetServiceError, ServiceConnector, ServiceSlot, SessionHandle, Transport, hipc::BufferMode,
    wire::Value,
};
use nx_svc::ipc::EventHandle;

use crate::{
    cmif::{self, Command, Reply},
    config::SplConfig,
    error::{CommandError, check_size},
    proto::{self, AES_BLOCK_SIZE, ConfigItem, PACKAGE2_HASH_SIZE, RSA_BUFFER_SIZE},
    routing::{self, Facade, OpenSet, Route, Slot},
};

type Key = [u8; AES_BLOCK_SIZE];
type RsaBuffer = [u8; RSA_BUFFER_SIZE];

/// Client for the `spl:` service family.
///
/// Holds one reference-counted session per [`Slot`]. Facades are opened with
/// [`initialize`](Self::initialize) and closed with [`exit`](Self::exit);
/// each command is then sent on the session [`routing::resolve`] picks from
/// the currently open set.
#[derive(Debug)]
pub struct SplClient<T, C> {
    config: SplConfig,
    slots: [ServiceSlot; 6],
    transport: T,
    connector: C,
}

impl<T: Transport, C: ServiceConnector> SplClient<T, C> {
    /// Creates a client with every session closed.
    pub fn new(config: SplConfig, transport: T, connector: C) -> Self {
        Self {
            config,
            slots: Slot::ALL.map(|slot| ServiceSlot::new(slot.service_name())),
            transport,
            connector,
        }
    }

    pub fn config(&self) -> SplConfig {
        self.config
    }

    pub fn slot(&self, slot: Slot) -> &ServiceSlot {
        &self.slots[slot.index()]
    }

    /// The slots that currently have an open session.
    pub fn open_set(&self) -> OpenSet {
        Slot::ALL
            .into_iter()
            .filter(|slot| self.slot(*slot).is_active())
            .fold(OpenSet::empty(), |open, slot| open | slot.flag())
    }

    /// Opens the session backing `facade`, or adds a reference to it.
    pub fn initialize(&self, facade: Facade) -> Result<(), GetServiceError> {
        let slot = facade.slot(self.config.split_services());
        self.slot(slot).acquire(&self.connector, &self.transport)
    }

    /// Drops a reference to the session backing `facade`.
    pub fn exit(&self, facade: Facade) {
        let slot = facade.slot(self.config.split_services());
        self.slot(slot).release(&self.transport)
    }

    pub fn spl_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::General)
    }

    pub fn spl_exit(&self) {
        self.exit(Facade::General)
    }

    pub fn crypto_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::Crypto)
    }

    pub fn crypto_exit(&self) {
        self.exit(Facade::Crypto)
    }

    pub fn ssl_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::Ssl)
    }

    pub fn ssl_exit(&self) {
        self.exit(Facade::Ssl)
    }

    pub fn es_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::Es)
    }

    pub fn es_exit(&self) {
        self.exit(Facade::Es)
    }

    pub fn fs_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::Fs)
    }

    pub fn fs_exit(&self) {
        self.exit(Facade::Fs)
    }

    pub fn manu_initialize(&self) -> Result<(), GetServiceError> {
        self.initialize(Facade::Manu)
    }

    pub fn manu_exit(&self) {
        self.exit(Facade::Manu)
    }

    /// The slot and session a command on `route` goes to.
    pub fn session_for(&self, route: Route) -> Result<(Slot, SessionHandle), CommandError> {
        let slot = routing::resolve(route, self.open_set(), self.config.split_services());
        let session = self
            .slot(slot)
            .session()
            .ok_or(CommandError::NotInitialized(slot.service_name()))?;
        Ok((slot, session))
    }

    fn send<R>(
        &self,
        route: Route,
        cmd: Command<'_>,
        parse: impl FnOnce(Reply<'_>) -> Result<R, CommandError>,
    ) -> Result<R, CommandError> {
        let (slot, session) = self.session_for(route)?;
        cmif::dispatch(&self.transport, slot.service_name(), session, cmd, parse)
    }

    // General commands.

    /// Reads a system configuration item.
    pub fn get_config(&self, item: ConfigItem) -> Result<u64, CommandError> {
        let values = [Value::U32(item.to_raw())];
        let cmd = Command::new(proto::CMD_GET_CONFIG)
            .input(proto::CONFIG_ITEM_IN, &values)
            .output(proto::CONFIG_VALUE_OUT);
        self.send(Route::General, cmd, |reply| reply.u64("value"))
    }

    /// Computes `input ^ exp mod modulus` with a user-supplied exponent.
    pub fn user_exp_mod(
        &self,
        input: &RsaBuffer,
        modulus: &RsaBuffer,
        exp: &[u8],
        dst: &mut RsaBuffer,
    ) -> Result<(), CommandError> {
        let cmd = Command::new(proto::CMD_USER_EXP_MOD)
            .in_pointer(input)
            .in_pointer(exp)
            .in_pointer(modulus)
            .out_pointer(dst);
        self.send(Route::General, cmd, cmif::no_output)
    }

    /// Writes a system configuration item.
    pub fn set_config(&self, item: ConfigItem, value: u64) -> Result<(), CommandError> {
        let values = [Value::U32(item.to_raw()), Value::U64(value)];
        let cmd = Command::new(proto::CMD_SET_CONFIG).input(proto::SET_CONFIG_IN, &values);
        self.send(Route::General, cmd, cmif::no_output)
    }

    /// Fills `out` with random bytes from the security engine.
    ///
    /// At most [`MAX_STATIC_OUTPUT`](crate::MAX_STATIC_OUTPUT) bytes per call;
    /// larger buffers fail with [`CommandError::BufferTooLarge`] and should be
    /// filled in chunks.
    pub fn get_random_bytes(&self, out: &mut [u8]) -> Result<(), CommandError> {
        let cmd = Command::new(proto::CMD_GET_RANDOM_BYTES).out_pointer(out);
        self.send(Route::General, cmd, cmif::no_output)
    }

    /// Whether the unit is a development unit.
    pub fn is_development(&self) -> Result<bool, CommandError> {
        let cmd = Command::new(proto::CMD_IS_DEVELOPMENT).output(proto::IS_DEVELOPMENT_OUT);
        self.send(Route::General, cmd, |reply| reply.u8("is_development").map(|v| v != 0))
    }

    pub fn set_shared_data(&self, value: u32) -> Result<(), CommandError> {
        let values = [Value::U32(value)];
        let cmd = Command::new(proto::CMD_SET_SHARED_DATA).input(proto::SHARED_DATA, &values);
        self.send(Route::General, cmd, cmif::no_output)
    }

    pub fn get_shared_data(&self) -> Result<u32, CommandError> {
        let cmd = Command::new(proto::CMD_GET_SHARED_DATA).output(proto::SHARED_DATA);
        self.send(Route::General, cmd, |reply| reply.u32("value"))
    }

    // Crypto commands.

    pub fn crypto_generate_aes_kek(
        &self,
        wrapped_kek: &Key,
        key_generation: u32,
        option: u32,
    ) -> Result<Key, CommandError> {
        self.key_generation_command(
            Route::Crypto,
            proto::CMD_GENERATE_AES_KEK,
            wrapped_kek,
            key_generation,
            option,
        )
    }

    pub fn crypto_load_aes_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        keyslot: u32,
    ) -> Result<(), CommandError> {
        let values = [
            Value::Bytes(sealed_kek),
            Value::Bytes(wrapped_key),
            Value::U32(keyslot),
        ];
        let cmd = Command::new(proto::CMD_LOAD_AES_KEY).input(proto::LOAD_AES_KEY_IN, &values);
        self.send(Route::Crypto, cmd, cmif::no_output)
    }

    pub fn crypto_generate_aes_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
    ) -> Result<Key, CommandError> {
        let values = [Value::Bytes(sealed_kek), Value::Bytes(wrapped_key)];
        let cmd = Command::new(proto::CMD_GENERATE_AES_KEY)
            .input(proto::KEY_PAIR_IN, &values)
            .output(proto::KEY_OUT);
        self.send(Route::Crypto, cmd, |reply| reply.array("key"))
    }

    pub fn crypto_decrypt_aes_key(
        &self,
        wrapped_key: &Key,
        key_generation: u32,
        option: u32,
    ) -> Result<Key, CommandError> {
        self.key_generation_command(
            Route::Crypto,
            proto::CMD_DECRYPT_AES_KEY,
            wrapped_key,
            key_generation,
            option,
        )
    }

    /// Runs AES-CTR over `input` into `output`, which must be the same size.
    ///
    /// Both buffers are mapped into the service, which writes `output` in
    /// place; its contents are unspecified if the command fails.
    pub fn crypto_crypt_aes_ctr(
        &self,
        ctr: &Key,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), CommandError> {
        check_size(output.len(), input.len())?;
        let values = [Value::Bytes(ctr)];
        let cmd = Command::new(proto::CMD_CRYPT_AES_CTR)
            .input(proto::CRYPT_AES_CTR_IN, &values)
            .in_buffer(input, BufferMode::NonSecure)
            .out_buffer(output, BufferMode::NonSecure);
        self.send(Route::Crypto, cmd, cmif::no_output)
    }

    pub fn crypto_compute_cmac(&self, input: &[u8], keyslot: u32) -> Result<Key, CommandError> {
        let values = [Value::U32(keyslot)];
        let cmd = Command::new(proto::CMD_COMPUTE_CMAC)
            .input(proto::KEYSLOT, &values)
            .in_pointer(input)
            .output(proto::KEY_OUT);
        self.send(Route::Crypto, cmd, |reply| reply.array("key"))
    }

    /// Reserves an AES keyslot and returns its number.
    pub fn crypto_lock_aes_engine(&self) -> Result<u32, CommandError> {
        let cmd = Command::new(proto::CMD_LOCK_AES_ENGINE).output(proto::KEYSLOT);
        self.send(Route::Crypto, cmd, |reply| reply.u32("keyslot"))
    }

    pub fn crypto_unlock_aes_engine(&self, keyslot: u32) -> Result<(), CommandError> {
        let values = [Value::U32(keyslot)];
        let cmd = Command::new(proto::CMD_UNLOCK_AES_ENGINE).input(proto::KEYSLOT, &values);
        self.send(Route::Crypto, cmd, cmif::no_output)
    }

    pub fn crypto_get_security_engine_event(&self) -> Result<EventHandle, CommandError> {
        let cmd = Command::new(proto::CMD_GET_SECURITY_ENGINE_EVENT);
        self.send(Route::Crypto, cmd, |reply| {
            let raw = reply.copy_handle.ok_or(CommandError::MissingHandle)?;
            // SAFETY: The kernel copied a valid event handle into our table.
            Ok(unsafe { EventHandle::from_raw(raw) })
        })
    }

    // RSA commands.

    pub fn rsa_decrypt_private_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
        version: u32,
        dst: &mut [u8],
    ) -> Result<(), CommandError> {
        let values = [
            Value::Bytes(sealed_kek),
            Value::Bytes(wrapped_key),
            Value::U32(version),
        ];
        let cmd = Command::new(proto::CMD_DECRYPT_RSA_PRIVATE_KEY)
            .input(proto::DECRYPT_RSA_PRIVATE_KEY_IN, &values)
            .in_pointer(wrapped_rsa_key)
            .out_pointer(dst);
        self.send(Route::Rsa, cmd, cmif::no_output)
    }

    // ES commands.

    pub fn es_load_rsa_oaep_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
    ) -> Result<(), CommandError> {
        self.import_key_command(
            Route::Es,
            proto::CMD_ES_LOAD_RSA_OAEP_KEY,
            sealed_kek,
            wrapped_key,
            wrapped_rsa_key,
        )
    }

    pub fn es_unwrap_rsa_oaep_wrapped_titlekey(
        &self,
        rsa_wrapped_titlekey: &RsaBuffer,
        modulus: &RsaBuffer,
        label_hash: &[u8],
        key_generation: u32,
    ) -> Result<Key, CommandError> {
        let values = [Value::U32(key_generation)];
        let cmd = Command::new(proto::CMD_ES_UNWRAP_RSA_OAEP_WRAPPED_TITLEKEY)
            .input(proto::KEY_GENERATION_ONLY_IN, &values)
            .in_pointer(rsa_wrapped_titlekey)
            .in_pointer(modulus)
            .in_pointer(label_hash)
            .output(proto::KEY_OUT);
        self.send(Route::Es, cmd, |reply| reply.array("key"))
    }

    pub fn es_unwrap_aes_wrapped_titlekey(
        &self,
        aes_wrapped_titlekey: &Key,
        key_generation: u32,
    ) -> Result<Key, CommandError> {
        let values = [Value::Bytes(aes_wrapped_titlekey), Value::U32(key_generation)];
        let cmd = Command::new(proto::CMD_ES_UNWRAP_AES_WRAPPED_TITLEKEY)
            .input(proto::UNWRAP_AES_WRAPPED_TITLEKEY_IN, &values)
            .output(proto::KEY_OUT);
        self.send(Route::Es, cmd, |reply| reply.array("key"))
    }

    pub fn es_import_rsa_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
    ) -> Result<(), CommandError> {
        self.import_key_command(
            Route::Es,
            proto::CMD_ES_IMPORT_RSA_KEY,
            sealed_kek,
            wrapped_key,
            wrapped_rsa_key,
        )
    }

    pub fn es_secure_exp_mod(
        &self,
        input: &RsaBuffer,
        modulus: &RsaBuffer,
        dst: &mut RsaBuffer,
    ) -> Result<(), CommandError> {
        self.secure_exp_mod(Route::Es, proto::CMD_ES_SECURE_EXP_MOD, input, modulus, dst)
    }

    // SSL commands.

    pub fn ssl_import_rsa_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
    ) -> Result<(), CommandError> {
        self.import_key_command(
            Route::Ssl,
            proto::CMD_SSL_IMPORT_RSA_KEY,
            sealed_kek,
            wrapped_key,
            wrapped_rsa_key,
        )
    }

    pub fn ssl_secure_exp_mod(
        &self,
        input: &RsaBuffer,
        modulus: &RsaBuffer,
        dst: &mut RsaBuffer,
    ) -> Result<(), CommandError> {
        self.secure_exp_mod(Route::Ssl, proto::CMD_SSL_SECURE_EXP_MOD, input, modulus, dst)
    }

    // FS commands.

    pub fn fs_load_secure_exp_mod_key(
        &self,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
    ) -> Result<(), CommandError> {
        self.import_key_command(
            Route::Fs,
            proto::CMD_FS_LOAD_SECURE_EXP_MOD_KEY,
            sealed_kek,
            wrapped_key,
            wrapped_rsa_key,
        )
    }

    pub fn fs_secure_exp_mod(
        &self,
        input: &RsaBuffer,
        modulus: &RsaBuffer,
        dst: &mut RsaBuffer,
    ) -> Result<(), CommandError> {
        self.secure_exp_mod(Route::Fs, proto::CMD_FS_SECURE_EXP_MOD, input, modulus, dst)
    }

    pub fn fs_generate_specific_aes_key(
        &self,
        wrapped_key: &Key,
        key_generation: u32,
        option: u32,
    ) -> Result<Key, CommandError> {
        self.key_generation_command(
            Route::Fs,
            proto::CMD_FS_GENERATE_SPECIFIC_AES_KEY,
            wrapped_key,
            key_generation,
            option,
        )
    }

    pub fn fs_load_titlekey(
        &self,
        sealed_titlekey: &Key,
        keyslot: u32,
    ) -> Result<(), CommandError> {
        let values = [Value::Bytes(sealed_titlekey), Value::U32(keyslot)];
        let cmd = Command::new(proto::CMD_FS_LOAD_TITLEKEY).input(proto::LOAD_TITLEKEY_IN, &values);
        self.send(Route::Fs, cmd, cmif::no_output)
    }

    pub fn fs_get_package2_hash(&self) -> Result<[u8; PACKAGE2_HASH_SIZE], CommandError> {
        let mut hash = [0u8; PACKAGE2_HASH_SIZE];
        let cmd = Command::new(proto::CMD_FS_GET_PACKAGE2_HASH).out_pointer(&mut hash);
        self.send(Route::Fs, cmd, cmif::no_output)?;
        Ok(hash)
    }

    // Manu commands.

    /// Re-wraps an RSA key for import under a new KEK.
    ///
    /// `out` must be the same size as `wrapped_rsa_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn manu_encrypt_rsa_key_for_import(
        &self,
        sealed_kek_pre: &Key,
        wrapped_key_pre: &Key,
        sealed_kek_post: &Key,
        wrapped_kek_post: &Key,
        option: u32,
        wrapped_rsa_key: &[u8],
        out: &mut [u8],
    ) -> Result<(), CommandError> {
        check_size(out.len(), wrapped_rsa_key.len())?;
        let values = [
            Value::Bytes(sealed_kek_pre),
            Value::Bytes(wrapped_key_pre),
            Value::Bytes(sealed_kek_post),
            Value::Bytes(wrapped_kek_post),
            Value::U32(option),
        ];
        let cmd = Command::new(proto::CMD_MANU_ENCRYPT_RSA_KEY_FOR_IMPORT)
            .input(proto::ENCRYPT_RSA_KEY_FOR_IMPORT_IN, &values)
            .in_pointer(wrapped_rsa_key)
            .out_pointer(out);
        self.send(Route::Manu, cmd, cmif::no_output)
    }

    // Shapes shared by several commands.

    fn key_generation_command(
        &self,
        route: Route,
        id: u32,
        wrapped_key: &Key,
        key_generation: u32,
        option: u32,
    ) -> Result<Key, CommandError> {
        let values = [
            Value::Bytes(wrapped_key),
            Value::U32(key_generation),
            Value::U32(option),
        ];
        let cmd = Command::new(id)
            .input(proto::KEY_GENERATION_IN, &values)
            .output(proto::KEY_OUT);
        self.send(route, cmd, |reply| reply.array("key"))
    }

    fn import_key_command(
        &self,
        route: Route,
        id: u32,
        sealed_kek: &Key,
        wrapped_key: &Key,
        wrapped_rsa_key: &[u8],
    ) -> Result<(), CommandError> {
        let values = [Value::Bytes(sealed_kek), Value::Bytes(wrapped_key)];
        let cmd = Command::new(id)
            .input(proto::KEY_PAIR_IN, &values)
            .in_pointer(wrapped_rsa_key);
        self.send(route, cmd, cmif::no_output)
    }

    fn secure_exp_mod(
        &self,
        route: Route,
        id: u32,
        input: &RsaBuffer,
        modulus: &RsaBuffer,
        dst: &mut RsaBuffer,
    ) -> Result<(), CommandError> {
        let cmd = Command::new(id)
            .in_pointer(input)
            .in_pointer(modulus)
            .out_pointer(dst);
        self.send(route, cmd, cmif::no_output)
    }
}

#[cfg(test)]
mod tests {
    use nx_sf::{
        HosVersion,
        mock::{MockConnector, MockTransport, Reply},
    };
    use nx_svc::{
        error::{KernelError, ToRawResultCode},
        ipc::SendSyncError,
    };

    use super::*;
    use crate::proto::{FS_SERVICE_NAME, GENERAL_SERVICE_NAME, MAX_STATIC_OUTPUT};

    type TestClient<'a> = SplClient<&'a MockTransport, &'a MockConnector>;

    fn client<'a>(
        version: HosVersion,
        transport: &'a MockTransport,
        connector: &'a MockConnector,
    ) -> TestClient<'a> {
        SplClient::new(SplConfig::new(version), transport, connector)
    }

    fn split<'a>(transport: &'a MockTransport, connector: &'a MockConnector) -> TestClient<'a> {
        client(HosVersion::new(6, 0, 0), transport, connector)
    }

    #[test]
    fn test_below_threshold_every_facade_shares_general() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = client(HosVersion::new(3, 0, 2), &transport, &connector);

        for facade in Facade::ALL {
            spl.initialize(facade).expect("opens");
        }
        assert_eq!(connector.opened(), std::vec![GENERAL_SERVICE_NAME]);
        assert_eq!(spl.slot(Slot::General).refcount(), 6);
        assert_eq!(spl.open_set(), OpenSet::GENERAL);

        for facade in Facade::ALL {
            spl.exit(facade);
        }
        assert_eq!(transport.closed().len(), 1);
        assert!(spl.open_set().is_empty());
    }

    #[test]
    fn test_crypto_init_twice_opens_and_closes_once() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);

        spl.crypto_initialize().expect("opens");
        spl.crypto_initialize().expect("shares");
        spl.crypto_exit();
        assert!(transport.closed().is_empty());
        spl.crypto_exit();

        assert_eq!(connector.opened().len(), 1);
        assert_eq!(transport.closed().len(), 1);
    }

    #[test]
    fn test_facade_refcounts_are_independent() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);

        spl.crypto_initialize().expect("opens");
        spl.fs_initialize().expect("opens");
        let fs_session = spl.slot(Slot::Fs).session().expect("fs open");

        spl.crypto_exit();
        assert_eq!(spl.open_set(), OpenSet::FS);
        assert!(!transport.closed().contains(&fs_session));

        spl.fs_exit();
        assert_eq!(transport.closed().len(), 2);
    }

    #[test]
    fn test_failed_initialize_leaves_slot_closed() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        connector.fail(FS_SERVICE_NAME, 0xE15);
        let spl = split(&transport, &connector);

        assert_eq!(spl.fs_initialize(), Err(GetServiceError::Service(0xE15)));
        assert_eq!(spl.slot(Slot::Fs).refcount(), 0);
        assert!(spl.open_set().is_empty());
    }

    #[test]
    fn test_commands_require_an_open_route() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);

        assert_eq!(
            spl.get_shared_data(),
            Err(CommandError::NotInitialized(proto::CRYPTO_SERVICE_NAME))
        );
        spl.es_initialize().expect("opens");
        assert_eq!(
            spl.fs_get_package2_hash(),
            Err(CommandError::NotInitialized(FS_SERVICE_NAME))
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_commands_follow_open_sessions() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);

        spl.es_initialize().expect("opens");
        spl.fs_initialize().expect("opens");
        let fs = connector.handle_of(FS_SERVICE_NAME).expect("fs opened");

        transport.push_reply(Reply::ok().with_u32(3));
        assert_eq!(spl.crypto_lock_aes_engine(), Ok(3));
        assert_eq!(transport.last_request().expect("sent").session, fs);

        spl.spl_initialize().expect("opens");
        let general = connector.handle_of(GENERAL_SERVICE_NAME).expect("spl: opened");
        transport.push_reply(Reply::ok().with_u64(1));
        spl.get_config(ConfigItem::IsRetail).expect("config");
        assert_eq!(transport.last_request().expect("sent").session, general);

        spl.fs_exit();
        let es = connector.handle_of(proto::ES_SERVICE_NAME).expect("es opened");
        transport.push_reply(Reply::ok());
        spl.rsa_decrypt_private_key(&[0; 16], &[0; 16], &[1; 0x240], 1, &mut [0; 0x240])
            .expect("decrypted");
        assert_eq!(transport.last_request().expect("sent").session, es);
    }

    #[test]
    fn test_shared_data_round_trip() {
        let mut stored = 0u32;
        let transport = MockTransport::with_handler(move |req| match req.command_id {
            24 => {
                stored = req.u32_at(0);
                Ok(Reply::ok())
            }
            25 => Ok(Reply::ok().with_u32(stored)),
            id => panic!("unexpected command {id}"),
        });
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        spl.set_shared_data(0xDEAD_BEEF).expect("stored");
        assert_eq!(spl.get_shared_data(), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn test_failure_leaves_outputs_untouched() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        transport.push_reply(Reply::error(0x1A).with_static(0, &[0xAA; 16]));
        let mut out = [0u8; 16];
        let err = spl.get_random_bytes(&mut out).expect_err("engine busy");
        assert_eq!(err, CommandError::Service(0x1A));
        assert_eq!(err.to_rc(), 0x1A);
        assert_eq!(out, [0; 16]);

        transport.push_reply(Reply::ok().with_static(0, &[0xAA; 16]));
        spl.get_random_bytes(&mut out).expect("random");
        assert_eq!(out, [0xAA; 16]);
    }

    #[test]
    fn test_header_only_error_keeps_service_code() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.crypto_initialize().expect("opens");

        transport.push_reply(Reply::error(0xD21A));
        let err = spl
            .crypto_generate_aes_key(&[1; 16], &[2; 16])
            .expect_err("key rejected");
        assert_eq!(err, CommandError::Service(0xD21A));
        assert_eq!(err.to_rc(), 0xD21A);

        transport.push_reply(Reply::error(0x6A1A));
        assert_eq!(
            spl.crypto_compute_cmac(&[0; 0x20], 2),
            Err(CommandError::Service(0x6A1A))
        );
    }

    #[test]
    fn test_transport_failure_leaves_outputs_untouched() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        transport.push_error(SendSyncError::SessionClosed);
        let mut out = [0x11u8; 0x20];
        let err = spl.get_random_bytes(&mut out).expect_err("session closed");
        assert_eq!(err, CommandError::SendRequest(SendSyncError::SessionClosed));
        assert_eq!(err.to_rc(), KernelError::SessionClosed.to_rc());
        assert_eq!(out, [0x11; 0x20]);

        transport.push_error(SendSyncError::TerminationRequested);
        let mut dst = [0x22u8; RSA_BUFFER_SIZE];
        let err = spl
            .user_exp_mod(&[1; RSA_BUFFER_SIZE], &[2; RSA_BUFFER_SIZE], &[3], &mut dst)
            .expect_err("terminating");
        assert_eq!(err.to_rc(), KernelError::TerminationRequested.to_rc());
        assert_eq!(dst, [0x22; RSA_BUFFER_SIZE]);
    }

    #[test]
    fn test_oversized_static_output_is_rejected_before_ipc() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        let mut out = [0u8; MAX_STATIC_OUTPUT + 1];
        assert_eq!(
            spl.get_random_bytes(&mut out),
            Err(CommandError::BufferTooLarge {
                size: MAX_STATIC_OUTPUT + 1,
                max: MAX_STATIC_OUTPUT
            })
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_set_config_layout() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        transport.push_reply(Reply::ok());
        spl.set_config(ConfigItem::IsChargerHiZModeEnabled, 0x0102_0304_0506_0708)
            .expect("set");

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 5);
        assert_eq!(req.u32_at(0), 13);
        assert_eq!(req.u32_at(4), 0);
        assert_eq!(req.u64_at(8), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_user_exp_mod_descriptors() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.spl_initialize().expect("opens");

        transport.push_reply(Reply::ok().with_static(0, &[0x5A; RSA_BUFFER_SIZE]));
        let mut dst = [0u8; RSA_BUFFER_SIZE];
        spl.user_exp_mod(&[1; RSA_BUFFER_SIZE], &[2; RSA_BUFFER_SIZE], &[1, 0, 1], &mut dst)
            .expect("computed");
        assert_eq!(dst, [0x5A; RSA_BUFFER_SIZE]);

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 1);
        let statics: std::vec::Vec<_> = req
            .send_statics
            .iter()
            .map(|s| (s.index(), s.size()))
            .collect();
        assert_eq!(statics, std::vec![(0, 0x100), (1, 3), (2, 0x100)]);
        assert_eq!(req.recv_list.len(), 1);
        assert_eq!(req.recv_list[0].size(), 0x100);
    }

    #[test]
    fn test_crypt_aes_ctr_maps_both_buffers() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.crypto_initialize().expect("opens");

        let mut output = [0u8; 0x20];
        assert_eq!(
            spl.crypto_crypt_aes_ctr(&[0; 16], &[1; 0x10], &mut output),
            Err(CommandError::InvalidSize {
                expected: 0x10,
                got: 0x20
            })
        );
        assert!(transport.requests().is_empty());

        transport.push_reply(Reply::ok().with_buffer(0, &[0x77; 0x20]));
        spl.crypto_crypt_aes_ctr(&[9; 16], &[1; 0x20], &mut output)
            .expect("crypted");
        assert_eq!(output, [0x77; 0x20]);

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 15);
        assert_eq!(&req.data[..16], &[9; 16]);
        assert_eq!(req.send_buffers.len(), 1);
        assert_eq!(req.recv_buffers.len(), 1);
        assert_eq!(req.send_buffers[0].mode(), BufferMode::NonSecure);
        assert_eq!(req.recv_buffers[0].size(), 0x20);
    }

    #[test]
    fn test_key_outputs_and_event() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.crypto_initialize().expect("opens");

        transport.push_reply(Reply::ok().with_data(&[0x42; 16]));
        let sealed = spl
            .crypto_generate_aes_kek(&[1; 16], 5, 2)
            .expect("generated");
        assert_eq!(sealed, [0x42; 16]);
        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 2);
        assert_eq!(req.u32_at(0x10), 5);
        assert_eq!(req.u32_at(0x14), 2);

        transport.push_reply(Reply::ok().with_copy_handle(0x99));
        assert_eq!(
            spl.crypto_get_security_engine_event().expect("event"),
            0x99
        );

        transport.push_reply(Reply::ok());
        assert_eq!(
            spl.crypto_get_security_engine_event(),
            Err(CommandError::MissingHandle)
        );
    }

    #[test]
    fn test_manu_requires_matching_sizes() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let spl = split(&transport, &connector);
        spl.manu_initialize().expect("opens");

        let mut out = [0u8; 8];
        let key = [0u8; 16];
        assert_eq!(
            spl.manu_encrypt_rsa_key_for_import(&key, &key, &key, &key, 0, &[1; 4], &mut out),
            Err(CommandError::InvalidSize { expected: 4, got: 8 })
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_config_items_from_raw() {
        for raw in 1..=17 {
            let item = ConfigItem::from_raw(raw).expect("defined");
            assert_eq!(item.to_raw(), raw);
        }
        assert_eq!(ConfigItem::from_raw(0), None);
        assert_eq!(ConfigItem::from_raw(18), None);
    }
}
