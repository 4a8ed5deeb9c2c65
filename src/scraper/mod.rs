//! C8 Scraper Pipeline: two fail-soft periodic workers that refresh the
//! catalog and lecturer-rating stores and mirror them to Redis.

pub mod course;
pub mod lecturer;

use base64::Engine;
use rand::Rng;

/// Ellucian Page Builder's parameter-obfuscation scheme: every key and
/// value is base64-encoded and prefixed with a base64-encoded two-digit
/// random salt. A single unobfuscated `encoded=true` flag tells the
/// endpoint the rest of the query string is wrapped this way.
pub fn obfuscate_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut rng = rand::rng();
    let mut out = Vec::with_capacity(params.len() + 1);

    for (key, value) in params {
        let key_salt: u8 = rng.random_range(10..100);
        let value_salt: u8 = rng.random_range(10..100);
        out.push((obfuscate_one(key, key_salt), obfuscate_one(value, value_salt)));
    }

    out.push(("encoded".to_string(), "true".to_string()));
    out
}

fn obfuscate_one(raw: &str, salt: u8) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    let salt_str = format!("{salt:02}");
    format!("{}{}", engine.encode(salt_str), engine.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obfuscate_params_appends_unobfuscated_encoded_flag() {
        let out = obfuscate_params(&[("subject", "CS")]);
        assert_eq!(out.last(), Some(&("encoded".to_string(), "true".to_string())));
    }

    #[test]
    fn obfuscate_params_produces_decodable_salted_values() {
        let out = obfuscate_params(&[("subject", "CS")]);
        let (key, _value) = &out[0];
        let engine = base64::engine::general_purpose::STANDARD;
        // Salt prefix is always 2 base64-encoded ASCII digits -> 4 chars.
        let salt_chunk = &key[..4];
        let decoded_salt = engine.decode(salt_chunk).unwrap();
        assert_eq!(decoded_salt.len(), 2);
        assert!(decoded_salt.iter().all(u8::is_ascii_digit));
    }
}
