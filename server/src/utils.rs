use rand::RngCore;

/// Number of random bytes in the shared access token.
pub const TOKEN_BYTES: usize = 16;

/// Generates the per-process access token as upper-case hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
