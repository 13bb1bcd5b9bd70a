//! Synthetic credential generation
//!
//! Emails look like `[a-z0-9]{8,12}[0-9]{2}@<domain>`; passwords are 12
//! independent draws from [`PASSWORD_CHARS`]. Nothing is checked for
//! uniqueness or strength.

use rand::Rng;

const LOCAL_PART_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Alphabet for generated passwords.
pub const PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%";

pub const PASSWORD_LEN: usize = 12;

/// Generated email/password pair for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

/// Generate a fresh credential pair.
pub fn generate_credential(rng: &mut impl Rng, domain: &str) -> Credential {
    Credential {
        email: generate_email(rng, domain),
        password: generate_password(rng),
    }
}

pub fn generate_email(rng: &mut impl Rng, domain: &str) -> String {
    let len = rng.gen_range(8..=12);
    let name = random_from(rng, LOCAL_PART_CHARS, len);
    let digits: u32 = rng.gen_range(0..100);
    format!("{name}{digits:02}@{domain}")
}

pub fn generate_password(rng: &mut impl Rng) -> String {
    random_from(rng, PASSWORD_CHARS, PASSWORD_LEN)
}

fn random_from(rng: &mut impl Rng, chars: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| chars[rng.gen_range(0..chars.len())] as char)
        .collect()
}
