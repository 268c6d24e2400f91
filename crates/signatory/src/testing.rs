//! Key fixtures shared by unit tests. Keys are small so debug builds stay fast.

use std::sync::OnceLock;

use crate::signatory::Signatory;
use crate::signing::rsa::RsaSigner;
use crate::signing::Signer;

pub(crate) const KEY_BITS: usize = 1024;

fn seeded(id: &str, seed: &str) -> Signatory {
    let signer = RsaSigner::from_seed(seed, KEY_BITS, Default::default()).unwrap();
    let mut signatory = Signatory::new(id);
    signatory.public_key = signer.public_key_pem().unwrap();
    signatory.private_key = Some(signer.private_key_pem().unwrap());
    signatory
}

pub(crate) fn alice() -> &'static Signatory {
    static ALICE: OnceLock<Signatory> = OnceLock::new();
    ALICE.get_or_init(|| seeded("https://a.example/users/alice", "alice"))
}

/// Same identity as [`alice`] after a key rotation.
pub(crate) fn alice_rotated() -> &'static Signatory {
    static ROTATED: OnceLock<Signatory> = OnceLock::new();
    ROTATED.get_or_init(|| seeded("https://a.example/users/alice", "alice-rotated"))
}

pub(crate) fn mallory() -> &'static Signatory {
    static MALLORY: OnceLock<Signatory> = OnceLock::new();
    MALLORY.get_or_init(|| seeded("https://m.example/users/mallory", "mallory"))
}
