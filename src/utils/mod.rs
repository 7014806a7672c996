pub mod password;

pub use password::{hash_password, secret_tag, tag_matches, verify_password};
