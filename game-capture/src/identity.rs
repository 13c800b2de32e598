use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the client-generated random value a player identity is bound to.
pub const RANDOM_VALUE_LEN: usize = 32;

/// Namespace every player identity is derived under. Changing any byte here
/// remaps every player already stored, so it must stay as is.
///
/// Built from the fields `(0x21401300, 0x2531, 0x0110, 0x42, 0x42, 0x494E4352474D)`
/// with the version nibble forced to 8 and the RFC 4122 variant bits set.
pub const PLAYER_NAMESPACE: Uuid = Uuid::from_bytes([
    0x21, 0x40, 0x13, 0x00, 0x25, 0x31, 0x81, 0x10, 0x82, 0x42, 0x49, 0x4e, 0x43, 0x52, 0x47, 0x4d,
]);

/// Pseudonymous player identifier, stored instead of the raw Steam ID.
///
/// The mapping from `(steam_id, random_value)` is a name-based (v5) UUID, so it does
/// not depend on the token signing secret: rotating the secret keeps players stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn derive(steam_id: u64, random_value: &[u8; RANDOM_VALUE_LEN]) -> Self {
        let mut name = [0u8; 8 + RANDOM_VALUE_LEN];
        name[..8].copy_from_slice(&steam_id.to_le_bytes());
        name[8..].copy_from_slice(random_value);

        PlayerId(Uuid::new_v5(&PLAYER_NAMESPACE, &name))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for PlayerId {
    fn from(uuid: Uuid) -> Self {
        PlayerId(uuid)
    }
}

impl Display for PlayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
