//! Property-based tests for body sealing.
//!
//! Uses proptest to verify:
//! 1. `open(seal(p))` returns `p` under the same key.
//! 2. A token sealed under one key never opens under another.
//! 3. Without a key, seal and open are the identity.
//! 4. Random text never panics `open`.

use proptest::prelude::*;
use kafkachat::crypto::cipher_for;
use kafkachat::crypto::keys::{KEY_LEN, SymmetricKey};

fn arb_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; KEY_LEN]>().prop_map(SymmetricKey::from_bytes)
}

proptest! {
    #[test]
    fn seal_open_roundtrip(key in arb_key(), text in any::<String>()) {
        let cipher = cipher_for(Some(key));
        let token = cipher.seal(&text).unwrap();
        prop_assert_eq!(cipher.open(&token).unwrap(), text);
    }

    #[test]
    fn wrong_key_never_opens(a in arb_key(), b in arb_key(), text in any::<String>()) {
        prop_assume!(a != b);
        let token = cipher_for(Some(a)).seal(&text).unwrap();
        prop_assert!(cipher_for(Some(b)).open(&token).is_err());
    }

    #[test]
    fn plaintext_is_identity(text in any::<String>()) {
        let cipher = cipher_for(None);
        prop_assert_eq!(cipher.seal(&text).unwrap(), text.clone());
        prop_assert_eq!(cipher.open(&text).unwrap(), text);
    }

    #[test]
    fn key_text_roundtrip(key in arb_key()) {
        let parsed = SymmetricKey::parse(&key.encode()).unwrap();
        prop_assert!(parsed == key);
        prop_assert_eq!(key.encode().len(), 44);
    }

    #[test]
    fn random_tokens_never_panic(key in arb_key(), token in any::<String>()) {
        let _ = cipher_for(Some(key)).open(&token);
    }
}
