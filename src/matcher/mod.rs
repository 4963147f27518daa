//! Prefix matching for onion addresses.
//!
//! Prefixes are drawn from the base32 alphabet (`A-Z`, `2-7`) and compared
//! case-insensitively against the start of the address.

mod prefix;

pub use prefix::{Prefix, PrefixError, BASE32_ALPHABET};
