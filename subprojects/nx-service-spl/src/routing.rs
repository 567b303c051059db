//! Which `spl` session a command is sent on.
//!
//! From 4.0.0 the security processor liaison is split into per-role services
//! (`spl:mig`, `spl:ssl`, `spl:es`, `spl:fs`, `spl:manu`) next to the general
//! `spl:`. Each role service also answers the general and crypto commands,
//! so a command is sent on whichever suitable session the process has open.
//! Before 4.0.0 everything goes to `spl:`.
//!
//! The functions here are pure: they take the set of open sessions and
//! whether the system is split, and name the slot to use.

use bitflags::bitflags;
use nx_sf::ServiceName;

use crate::proto;

/// One of the six `spl` sessions a client can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    General,
    Crypto,
    Ssl,
    Es,
    Fs,
    Manu,
}

impl Slot {
    pub const ALL: [Slot; 6] = [
        Slot::General,
        Slot::Crypto,
        Slot::Ssl,
        Slot::Es,
        Slot::Fs,
        Slot::Manu,
    ];

    pub const fn service_name(self) -> ServiceName {
        match self {
            Self::General => proto::GENERAL_SERVICE_NAME,
            Self::Crypto => proto::CRYPTO_SERVICE_NAME,
            Self::Ssl => proto::SSL_SERVICE_NAME,
            Self::Es => proto::ES_SERVICE_NAME,
            Self::Fs => proto::FS_SERVICE_NAME,
            Self::Manu => proto::MANU_SERVICE_NAME,
        }
    }

    pub const fn flag(self) -> OpenSet {
        match self {
            Self::General => OpenSet::GENERAL,
            Self::Crypto => OpenSet::CRYPTO,
            Self::Ssl => OpenSet::SSL,
            Self::Es => OpenSet::ES,
            Self::Fs => OpenSet::FS,
            Self::Manu => OpenSet::MANU,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// The set of slots with an open session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct OpenSet: u8 {
        const GENERAL = 1 << 0;
        const CRYPTO = 1 << 1;
        const SSL = 1 << 2;
        const ES = 1 << 3;
        const FS = 1 << 4;
        const MANU = 1 << 5;
    }
}

/// A user-facing `spl` interface, as initialized by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facade {
    General,
    Crypto,
    Ssl,
    Es,
    Fs,
    Manu,
}

impl Facade {
    pub const ALL: [Facade; 6] = [
        Facade::General,
        Facade::Crypto,
        Facade::Ssl,
        Facade::Es,
        Facade::Fs,
        Facade::Manu,
    ];

    /// The slot holding this facade's session.
    pub const fn slot(self, split: bool) -> Slot {
        if !split {
            return Slot::General;
        }
        match self {
            Self::General => Slot::General,
            Self::Crypto => Slot::Crypto,
            Self::Ssl => Slot::Ssl,
            Self::Es => Slot::Es,
            Self::Fs => Slot::Fs,
            Self::Manu => Slot::Manu,
        }
    }
}

/// The session class a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// General commands, served by `spl:` or any crypto-capable session.
    General,
    /// AES and engine commands, served by `spl:mig` or any role service.
    Crypto,
    /// RSA private key commands.
    Rsa,
    Es,
    Ssl,
    Fs,
    Manu,
}

/// Fallback order for [`Route::Crypto`] when split.
pub const CRYPTO_PRIORITY: [Slot; 4] = [Slot::Manu, Slot::Fs, Slot::Es, Slot::Ssl];

/// Fallback order for [`Route::Rsa`] when split.
pub const RSA_PRIORITY: [Slot; 2] = [Slot::Fs, Slot::Es];

/// Picks the slot a command on `route` is sent on.
///
/// The returned slot may itself be closed; the caller then reports the
/// command as not initialized.
pub fn resolve(route: Route, open: OpenSet, split: bool) -> Slot {
    if !split {
        return Slot::General;
    }

    match route {
        Route::General if open.contains(OpenSet::GENERAL) => Slot::General,
        Route::General | Route::Crypto => {
            first_open(&CRYPTO_PRIORITY, open).unwrap_or(Slot::Crypto)
        }
        Route::Rsa => first_open(&RSA_PRIORITY, open).unwrap_or(Slot::Ssl),
        Route::Es => Slot::Es,
        Route::Ssl => Slot::Ssl,
        Route::Fs => Slot::Fs,
        Route::Manu => Slot::Manu,
    }
}

fn first_open(priority: &[Slot], open: OpenSet) -> Option<Slot> {
    priority.iter().copied().find(|slot| open.contains(slot.flag()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_open_sets() -> impl Iterator<Item = OpenSet> {
        (0u8..64).map(OpenSet::from_bits_truncate)
    }

    fn expected_crypto(open: OpenSet) -> Slot {
        if open.contains(OpenSet::MANU) {
            Slot::Manu
        } else if open.contains(OpenSet::FS) {
            Slot::Fs
        } else if open.contains(OpenSet::ES) {
            Slot::Es
        } else if open.contains(OpenSet::SSL) {
            Slot::Ssl
        } else {
            Slot::Crypto
        }
    }

    #[test]
    fn test_crypto_route_under_every_open_set() {
        for open in all_open_sets() {
            assert_eq!(resolve(Route::Crypto, open, true), expected_crypto(open), "{open:?}");
        }
    }

    #[test]
    fn test_general_route_under_every_open_set() {
        for open in all_open_sets() {
            let expected = if open.contains(OpenSet::GENERAL) {
                Slot::General
            } else {
                expected_crypto(open)
            };
            assert_eq!(resolve(Route::General, open, true), expected, "{open:?}");
        }
    }

    #[test]
    fn test_rsa_route_under_every_open_set() {
        for open in all_open_sets() {
            let expected = if open.contains(OpenSet::FS) {
                Slot::Fs
            } else if open.contains(OpenSet::ES) {
                Slot::Es
            } else {
                Slot::Ssl
            };
            assert_eq!(resolve(Route::Rsa, open, true), expected, "{open:?}");
        }
    }

    #[test]
    fn test_role_routes_ignore_open_set() {
        for open in all_open_sets() {
            assert_eq!(resolve(Route::Es, open, true), Slot::Es);
            assert_eq!(resolve(Route::Ssl, open, true), Slot::Ssl);
            assert_eq!(resolve(Route::Fs, open, true), Slot::Fs);
            assert_eq!(resolve(Route::Manu, open, true), Slot::Manu);
        }
    }

    #[test]
    fn test_unsplit_routes_all_go_to_general() {
        let routes = [
            Route::General,
            Route::Crypto,
            Route::Rsa,
            Route::Es,
            Route::Ssl,
            Route::Fs,
            Route::Manu,
        ];
        for open in all_open_sets() {
            for route in routes {
                assert_eq!(resolve(route, open, false), Slot::General);
            }
        }
        for facade in Facade::ALL {
            assert_eq!(facade.slot(false), Slot::General);
        }
    }

    #[test]
    fn test_split_facades_have_their_own_slots() {
        for (facade, slot) in Facade::ALL.into_iter().zip(Slot::ALL) {
            assert_eq!(facade.slot(true), slot);
        }
    }
}
