//! Short random scene identities
//!
//! Ids are 10 symbols from an alphabet without vowels and look-alike glyphs,
//! so they never spell words and survive being read aloud or retyped.

use uuid::Uuid;

pub const ID_ALPHABET: &[u8; 36] = b"6789BCDFGHJKLMNPQRTWbcdfghjkmnpqrtwz";
pub const ID_LENGTH: usize = 10;

/// New random scene id
pub fn new_scene_id() -> String {
    let mut value = Uuid::new_v4().as_u128();
    let base = ID_ALPHABET.len() as u128;
    let mut id = String::with_capacity(ID_LENGTH);
    for _ in 0..ID_LENGTH {
        id.push(ID_ALPHABET[(value % base) as usize] as char);
        value /= base;
    }
    id
}

pub fn is_scene_id(s: &str) -> bool {
    s.len() == ID_LENGTH && s.bytes().all(|b| ID_ALPHABET.contains(&b))
}
