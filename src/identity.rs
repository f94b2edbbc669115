//! Identity resolution: precedence rules plus anonymous name/color
//! synthesis.
//!
//! DESIGN
//! ======
//! Precedence is `verified token subject > client-provided clientId >
//! freshly synthesized UUID` — behavioral and testable, never reordered.
//! Anonymous display names and avatar colors are pure functions of the
//! resolved `userId` so the same anonymous user looks the same across
//! reconnects within a process lifetime (there is no persistence of
//! identity; this is presentation-only determinism).

use uuid::Uuid;

use crate::model::UserIdentity;

const ANIMALS: &[&str] = &[
    "Otter", "Falcon", "Badger", "Heron", "Lynx", "Marmot", "Raven", "Tapir", "Gecko", "Ibex", "Puffin", "Weasel",
    "Narwhal", "Pangolin", "Quokka", "Serval",
];

const PALETTE: &[&str] =
    &["#E57373", "#64B5F6", "#81C784", "#FFD54F", "#BA68C8", "#4DB6AC", "#F06292", "#A1887F", "#90A4AE", "#FF8A65"];

fn hash_uuid(id: Uuid) -> u64 {
    let bytes = id.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deterministic "Anonymous &lt;Animal&gt;" name derived from `user_id`.
#[must_use]
pub fn anonymous_name(user_id: Uuid) -> String {
    let idx = (hash_uuid(user_id) as usize) % ANIMALS.len();
    format!("Anonymous {}", ANIMALS[idx])
}

/// Deterministic avatar color from a fixed palette, derived from `user_id`.
#[must_use]
pub fn avatar_color(user_id: Uuid) -> String {
    let idx = ((hash_uuid(user_id) >> 8) as usize) % PALETTE.len();
    PALETTE[idx].to_owned()
}

/// Resolve the connection's identity per the precedence rule:
/// verified token subject, then client-provided `clientId`, then a freshly
/// synthesized UUID.
#[must_use]
pub fn resolve(
    verified_user: Option<Uuid>,
    client_id: Option<&str>,
    display_name: Option<String>,
    is_anonymous: bool,
) -> UserIdentity {
    let user_id = verified_user
        .or_else(|| client_id.and_then(|c| Uuid::parse_str(c).ok()))
        .unwrap_or_else(Uuid::new_v4);

    let resolved_anonymous = is_anonymous || verified_user.is_none();
    let display_name = display_name.unwrap_or_else(|| anonymous_name(user_id));
    let avatar_color = avatar_color(user_id);

    UserIdentity { user_id, display_name, is_anonymous: resolved_anonymous, avatar_color }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
