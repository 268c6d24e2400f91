pub mod clock;
pub mod config;
pub mod error;
pub mod incoming;
pub mod outgoing;
pub mod request;
pub mod resolver;
pub mod server;
pub mod signatory;
pub mod signing;
pub mod store;

#[cfg(test)]
mod testing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ResolverConfig, VerifierConfig};
pub use error::{ErrorKind, InvalidOriginError, SignatoryError, SignatureError};
pub use incoming::IncomingVerifier;
pub use outgoing::{OutgoingSigner, OUTGOING_HEADERS};
pub use request::{IncomingRequest, OutgoingRequest, SignedRequest};
pub use resolver::{
    HttpKeyFetcher, KeyCache, KeyFetcher, MemoryKeyCache, ResolveSignatory, SignatoryResolver,
    MAX_KEY_DOCUMENT_BYTES,
};
pub use server::{AppState, router, run};
pub use signatory::{Algorithm, KeyDocument, PublicKeyDocument, Signatory};
pub use signing::{RsaSigner, RsaVerifier, SignatureHeader, Signer, Verifier};
pub use store::{fill_local_signatory, JsonFileStore, MemoryStore, SignatoryStore};
