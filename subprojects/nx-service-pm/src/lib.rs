//! Process Manager (PM) Service Implementation.
//!
//! This crate provides clients for two of the process manager's interfaces:
//! - **pm:dmnt**: debug monitor queries (process ids, launch debugging)
//! - **pm:shell**: launching titles
//!
//! Both sessions live in a [`PmClient`], which opens each one on its first
//! `*_initialize` and closes it on the matching last `*_exit`. The `pm:dmnt`
//! command numbering changed in 5.0.0; the client picks the right table from
//! its [`PmConfig`].

#![cfg_attr(not(test), no_std)]

use nx_sf::{GetServiceError, ServiceConnector, ServiceSlot, SessionHandle, Transport};
use nx_svc::ipc::EventHandle;

mod cmif;
mod config;
mod proto;

pub use self::{
    cmif::CommandError,
    config::PmConfig,
    proto::{
        ALL_RECORDS, DMNT_SERVICE_NAME, DmntCommand, LaunchFlags, SHELL_SERVICE_NAME, StorageId,
    },
};

/// Process manager client holding the `pm:dmnt` and `pm:shell` sessions.
#[derive(Debug)]
pub struct PmClient<T, C> {
    config: PmConfig,
    dmnt: ServiceSlot,
    shell: ServiceSlot,
    transport: T,
    connector: C,
}

impl<T: Transport, C: ServiceConnector> PmClient<T, C> {
    /// Creates a client with both sessions closed.
    pub fn new(config: PmConfig, transport: T, connector: C) -> Self {
        Self {
            config,
            dmnt: ServiceSlot::new(DMNT_SERVICE_NAME),
            shell: ServiceSlot::new(SHELL_SERVICE_NAME),
            transport,
            connector,
        }
    }

    pub fn config(&self) -> PmConfig {
        self.config
    }

    /// Opens `pm:dmnt`, or adds a reference to the open session.
    pub fn dmnt_initialize(&self) -> Result<(), GetServiceError> {
        self.dmnt.acquire(&self.connector, &self.transport)
    }

    /// Drops a reference to `pm:dmnt`, closing it after the last one.
    pub fn dmnt_exit(&self) {
        self.dmnt.release(&self.transport)
    }

    /// Opens `pm:shell`, or adds a reference to the open session.
    pub fn shell_initialize(&self) -> Result<(), GetServiceError> {
        self.shell.acquire(&self.connector, &self.transport)
    }

    /// Drops a reference to `pm:shell`, closing it after the last one.
    pub fn shell_exit(&self) {
        self.shell.release(&self.transport)
    }

    /// The open `pm:dmnt` session, if any.
    pub fn dmnt_session(&self) -> Option<SessionHandle> {
        self.dmnt.session()
    }

    /// The open `pm:shell` session, if any.
    pub fn shell_session(&self) -> Option<SessionHandle> {
        self.shell.session()
    }

    /// Resumes a process that was launched suspended.
    pub fn dmnt_start_process(&self, pid: u64) -> Result<(), CommandError> {
        cmif::start_process(&self.transport, self.dmnt()?, self.renumbered(), pid)
    }

    /// Returns the process id of the running title `title_id`.
    pub fn dmnt_get_title_pid(&self, title_id: u64) -> Result<u64, CommandError> {
        cmif::get_title_pid(&self.transport, self.dmnt()?, self.renumbered(), title_id)
    }

    /// Returns an event signaled when `title_id` is launched.
    pub fn dmnt_enable_debug_for_title_id(
        &self,
        title_id: u64,
    ) -> Result<EventHandle, CommandError> {
        cmif::enable_debug_for_title_id(&self.transport, self.dmnt()?, self.renumbered(), title_id)
    }

    /// Returns the process id of the running application.
    pub fn dmnt_get_application_pid(&self) -> Result<u64, CommandError> {
        cmif::get_application_pid(&self.transport, self.dmnt()?, self.renumbered())
    }

    /// Returns an event signaled when the next application is launched.
    pub fn dmnt_enable_debug_for_application(&self) -> Result<EventHandle, CommandError> {
        cmif::enable_debug_for_application(&self.transport, self.dmnt()?, self.renumbered())
    }

    /// Launches `title_id` from `storage_id` and returns its process id.
    pub fn shell_launch_process(
        &self,
        flags: LaunchFlags,
        title_id: u64,
        storage_id: StorageId,
    ) -> Result<u64, CommandError> {
        let session = self
            .shell
            .session()
            .ok_or(CommandError::NotInitialized(SHELL_SERVICE_NAME))?;
        cmif::launch_process(&self.transport, session, flags, title_id, storage_id)
    }

    fn dmnt(&self) -> Result<SessionHandle, CommandError> {
        self.dmnt
            .session()
            .ok_or(CommandError::NotInitialized(DMNT_SERVICE_NAME))
    }

    fn renumbered(&self) -> bool {
        self.config.dmnt_renumbered()
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

    type TestClient<'a> = PmClient<&'a MockTransport, &'a MockConnector>;

    fn client<'a>(
        version: HosVersion,
        transport: &'a MockTransport,
        connector: &'a MockConnector,
    ) -> TestClient<'a> {
        PmClient::new(PmConfig::new(version), transport, connector)
    }

    #[test]
    fn test_records_are_well_formed() {
        for record in ALL_RECORDS {
            assert_eq!(record.validate(), Ok(()), "{}", record.name);
        }
    }

    #[test]
    fn test_dmnt_ids_follow_version() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();

        let old = client(HosVersion::new(4, 1, 0), &transport, &connector);
        old.dmnt_initialize().expect("opens");
        transport.push_reply(Reply::ok().with_u64(0x51));
        assert_eq!(old.dmnt_get_title_pid(0x0100_0000_0000_1000), Ok(0x51));
        assert_eq!(transport.last_request().expect("sent").command_id, 3);

        let new = client(HosVersion::V5_0_0, &transport, &connector);
        new.dmnt_initialize().expect("opens");
        transport.push_reply(Reply::ok().with_u64(0x52));
        assert_eq!(new.dmnt_get_title_pid(0x0100_0000_0000_1000), Ok(0x52));
        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 2);
        assert_eq!(req.u64_at(0), 0x0100_0000_0000_1000);
    }

    #[test]
    fn test_every_dmnt_command_moves_down_in_5_0_0() {
        let commands = [
            (DmntCommand::StartProcess, 2),
            (DmntCommand::GetTitlePid, 3),
            (DmntCommand::EnableDebugForTitleId, 4),
            (DmntCommand::GetApplicationPid, 5),
            (DmntCommand::EnableDebugForApplication, 6),
        ];
        for (cmd, legacy) in commands {
            assert_eq!(cmd.id(false), legacy);
            assert_eq!(cmd.id(true), legacy - 1);
        }
    }

    #[test]
    fn test_launch_process_layout() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);
        pm.shell_initialize().expect("opens");

        transport.push_reply(Reply::ok().with_u64(0x80));
        let flags = LaunchFlags::SIGNAL_ON_EXIT | LaunchFlags::START_SUSPENDED;
        let pid = pm
            .shell_launch_process(flags, 0x0100_0000_0000_2000, StorageId::SD_CARD)
            .expect("launched");
        assert_eq!(pid, 0x80);

        let req = transport.last_request().expect("sent");
        assert_eq!(req.command_id, 0);
        assert_eq!(req.u32_at(0), 0x11);
        assert_eq!(req.u32_at(4), 0);
        assert_eq!(req.u64_at(8), 0x0100_0000_0000_2000);
        assert_eq!(req.u64_at(0x10), 5);
    }

    #[test]
    fn test_enable_debug_returns_copy_handle() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);
        pm.dmnt_initialize().expect("opens");

        transport.push_reply(Reply::ok().with_copy_handle(0xABC));
        let event = pm.dmnt_enable_debug_for_application().expect("event");
        assert_eq!(event, 0xABC);
        assert_eq!(transport.last_request().expect("sent").command_id, 5);

        transport.push_reply(Reply::ok());
        assert_eq!(
            pm.dmnt_enable_debug_for_title_id(1),
            Err(CommandError::MissingHandle)
        );
    }

    #[test]
    fn test_commands_require_initialized_session() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);

        assert_eq!(
            pm.dmnt_get_application_pid(),
            Err(CommandError::NotInitialized(DMNT_SERVICE_NAME))
        );
        assert_eq!(
            pm.shell_launch_process(LaunchFlags::empty(), 1, StorageId::NONE),
            Err(CommandError::NotInitialized(SHELL_SERVICE_NAME))
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_service_error_is_returned_verbatim() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);
        pm.dmnt_initialize().expect("opens");

        transport.push_reply(Reply::error(0x20F));
        let err = pm.dmnt_get_application_pid().expect_err("no application");
        assert_eq!(err, CommandError::Service(0x20F));
        assert_eq!(err.to_rc(), 0x20F);

        transport.push_reply(Reply::error(0x80F));
        assert_eq!(
            pm.dmnt_enable_debug_for_title_id(1),
            Err(CommandError::Service(0x80F))
        );
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);
        pm.shell_initialize().expect("opens");

        transport.push_error(SendSyncError::SessionClosed);
        let err = pm
            .shell_launch_process(LaunchFlags::empty(), 1, StorageId::NONE)
            .expect_err("session closed");
        assert_eq!(err, CommandError::SendRequest(SendSyncError::SessionClosed));
        assert_eq!(err.to_rc(), KernelError::SessionClosed.to_rc());
    }

    #[test]
    fn test_sessions_close_on_last_exit() {
        let transport = MockTransport::new();
        let connector = MockConnector::new();
        let pm = client(HosVersion::V5_0_0, &transport, &connector);

        pm.dmnt_initialize().expect("opens");
        pm.dmnt_initialize().expect("shares");
        pm.shell_initialize().expect("opens");
        assert_eq!(connector.opened(), std::vec![DMNT_SERVICE_NAME, SHELL_SERVICE_NAME]);

        pm.dmnt_exit();
        assert!(pm.dmnt_session().is_some());
        pm.dmnt_exit();
        assert!(pm.dmnt_session().is_none());
        assert!(pm.shell_session().is_some());

        pm.shell_exit();
        assert_eq!(transport.closed().len(), 2);
    }
}
