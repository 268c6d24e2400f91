#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use federated_signature::{
    Algorithm, IncomingVerifier, MemoryKeyCache, KeyCache, ResolverConfig, RsaSigner, Signatory,
    SignatoryResolver, Signer, VerifierConfig,
};

/// Small keys keep debug test runs fast.
const KEY_BITS: usize = 1024;

fn key_pair(seed: &str) -> (String, String) {
    let signer = RsaSigner::from_seed(seed, KEY_BITS, Algorithm::RsaSha256).unwrap();
    (signer.public_key_pem().unwrap(), signer.private_key_pem().unwrap())
}

fn alice_keys() -> &'static (String, String) {
    static KEYS: OnceLock<(String, String)> = OnceLock::new();
    KEYS.get_or_init(|| key_pair("alice"))
}

fn mallory_keys() -> &'static (String, String) {
    static KEYS: OnceLock<(String, String)> = OnceLock::new();
    KEYS.get_or_init(|| key_pair("mallory"))
}

fn with_keys(id: &str, (public_key, private_key): &(String, String)) -> Signatory {
    let mut signatory = Signatory::new(id);
    signatory.public_key = public_key.clone();
    signatory.private_key = Some(private_key.clone());
    signatory
}

/// Alice's key pair under any identity id.
pub fn alice(id: &str) -> Signatory {
    with_keys(id, alice_keys())
}

pub fn mallory(id: &str) -> Signatory {
    with_keys(id, mallory_keys())
}

pub fn public(signatory: &Signatory) -> Signatory {
    let mut public = signatory.clone();
    public.private_key = None;
    public
}

/// Verifier that already trusts `known` and would fetch anything else over HTTP.
pub fn verifier_trusting(known: &[&Signatory]) -> IncomingVerifier {
    let cache = Arc::new(MemoryKeyCache::new(None));
    for signatory in known {
        cache.put(&signatory.key_id, public(signatory));
    }
    let resolver = SignatoryResolver::new(
        cache,
        Arc::new(federated_signature::HttpKeyFetcher::new(&ResolverConfig::default()).unwrap()),
    );
    IncomingVerifier::new(Arc::new(resolver), VerifierConfig::default())
}
