//! Multipart boundary generation.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Number of random characters following the prefix.
const RANDOM_LEN: usize = 40;

/// Every boundary starts with `=_`, which never occurs in base64 output and
/// only as part of an `=XX` escape in quoted-printable output, so an encoded
/// body cannot contain a delimiter line.
pub const BOUNDARY_PREFIX: &str = "=_";

/// Generates a fresh random boundary.
#[must_use]
pub fn generate_boundary() -> String {
    let mut boundary = String::with_capacity(BOUNDARY_PREFIX.len() + RANDOM_LEN);
    boundary.push_str(BOUNDARY_PREFIX);
    boundary.extend(
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_LEN)
            .map(char::from),
    );
    boundary
}
