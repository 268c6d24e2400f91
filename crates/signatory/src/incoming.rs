//! Validation of inbound signed requests.
//!
//! Checks run in a fixed order and the first failure rejects the request:
//! freshness of `Date`, body integrity (`Content-Length`, `Digest`), the
//! `Signature` header itself, the set of headers it covers, and finally the
//! signature against the sender's key.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::clock::{parse_http_date, Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::error::{SignatoryError, SignatureError};
use crate::request::{IncomingRequest, SignedRequest};
use crate::resolver::ResolveSignatory;
use crate::signatory::{key_origin, Algorithm, Signatory};
use crate::signing::{
    build_signing_string, header_value, verify_digest, RsaVerifier, SignatureHeader, Verifier,
};

/// A cached key first, then one forced refresh.
const VERIFY_ATTEMPTS: u8 = 2;

pub struct IncomingVerifier {
    resolver: Arc<dyn ResolveSignatory>,
    config: VerifierConfig,
    clock: Arc<dyn Clock>,
}

impl IncomingVerifier {
    pub fn new(resolver: Arc<dyn ResolveSignatory>, config: VerifierConfig) -> Self {
        Self {
            resolver,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub async fn verify_incoming(
        &self,
        request: IncomingRequest,
    ) -> Result<SignedRequest, SignatureError> {
        let timestamp = self.check_time(&request)?;
        self.check_content(&request)?;

        let signature_header = header_value(&request.headers, "signature")
            .ok_or_else(|| SignatureError::MalformedHeader("missing Signature header".into()))?;
        let signature_header = SignatureHeader::parse(&signature_header)?;
        self.enforce_headers(&signature_header)?;

        let clear_signature = build_signing_string(
            request.method.as_str(),
            &request.path,
            &request.host,
            &signature_header.headers,
            |name| header_value(&request.headers, name),
        )?;

        let origin = key_origin(&signature_header.key_id)?;
        let signed_signature = BASE64
            .decode(signature_header.signature.trim())
            .map_err(|e| SignatureError::MalformedHeader(format!("signature is not base64: {e}")))?;

        let signatory = self
            .verify_signature(&signature_header, &clear_signature, &signed_signature)
            .await?;

        tracing::debug!(
            key_id = %signature_header.key_id,
            origin = %origin,
            "Incoming signature verified"
        );

        Ok(SignedRequest {
            body: request.body,
            headers: request.headers,
            host: request.host,
            timestamp,
            origin,
            signature_header,
            clear_signature,
            signed_signature,
            signatory,
        })
    }

    fn check_time(&self, request: &IncomingRequest) -> Result<i64, SignatureError> {
        let date = header_value(&request.headers, "date")
            .ok_or_else(|| SignatureError::InvalidDate("missing Date header".into()))?;
        let time = parse_http_date(&date)
            .map_err(|e| SignatureError::InvalidDate(format!("{date}: {e}")))?;

        let age = (self.clock.now() - time).num_seconds();
        let ttl = self.config.ttl.as_secs();
        if age > i64::try_from(ttl).unwrap_or(i64::MAX) {
            return Err(SignatureError::Expired { age, ttl });
        }
        Ok(time.timestamp())
    }

    fn check_content(&self, request: &IncomingRequest) -> Result<(), SignatureError> {
        if let Some(declared) = header_value(&request.headers, "content-length") {
            if declared.parse::<usize>().ok() != Some(request.body.len()) {
                return Err(SignatureError::ContentLength {
                    declared,
                    actual: request.body.len(),
                });
            }
        }

        match header_value(&request.headers, "digest") {
            Some(digest) => verify_digest(&digest, &request.body),
            None if self.config.require_digest => Err(SignatureError::Digest),
            None => Ok(()),
        }
    }

    fn enforce_headers(&self, header: &SignatureHeader) -> Result<(), SignatureError> {
        let missing: Vec<String> = self
            .config
            .required_headers()
            .into_iter()
            .filter(|required| !header.declares(required))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SignatureError::MissingHeaders(missing.join(" ")))
        }
    }

    /// Resolves the sender's key and checks the signature, retrying exactly
    /// once with a refreshed key whatever made the first attempt fail.
    async fn verify_signature(
        &self,
        header: &SignatureHeader,
        clear: &str,
        signature: &[u8],
    ) -> Result<Signatory, SignatureError> {
        let algorithm = header.algorithm();
        let mut last = SignatureError::Verification;

        for attempt in 1..=VERIFY_ATTEMPTS {
            let force_refresh = attempt > 1;
            match self
                .attempt(&header.key_id, force_refresh, clear, signature, algorithm)
                .await
            {
                Ok(signatory) => return Ok(signatory),
                Err(error) => {
                    tracing::debug!(
                        key_id = %header.key_id,
                        attempt,
                        error = %error,
                        "Signature verification attempt failed"
                    );
                    last = error;
                }
            }
        }

        if matches!(
            last,
            SignatureError::Signatory(SignatoryError::OriginMismatch { .. })
        ) {
            tracing::warn!(
                key_id = %header.key_id,
                "Key origin mismatch, possible spoofing attempt"
            );
        }

        Err(SignatureError::VerificationExhausted {
            attempts: VERIFY_ATTEMPTS,
            last: Box::new(last),
        })
    }

    async fn attempt(
        &self,
        key_id: &str,
        force_refresh: bool,
        clear: &str,
        signature: &[u8],
        algorithm: Algorithm,
    ) -> Result<Signatory, SignatureError> {
        let signatory = self.resolver.resolve(key_id, force_refresh).await?;
        if !signatory.has_public_key() {
            return Err(SignatoryError::EmptyPublicKey.into());
        }
        RsaVerifier::from_pem(&signatory.public_key)?.verify(
            clear.as_bytes(),
            signature,
            algorithm,
        )?;
        Ok(signatory)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use url::Url;

    use super::*;
    use crate::clock::{format_http_date, FixedClock};
    use crate::error::ErrorKind;
    use crate::outgoing::OutgoingSigner;
    use crate::request::OutgoingRequest;
    use crate::resolver::tests::StubFetcher;
    use crate::resolver::{KeyCache, MemoryKeyCache, SignatoryResolver};
    use crate::signing::body_digest;
    use crate::testing;

    const KEY_ID: &str = "https://a.example/users/alice#main-key";
    const BODY: &[u8] = br#"{"type":"Follow","actor":"https://a.example/users/alice"}"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    /// Resolver handing out a scripted sequence of signatories.
    struct ScriptedResolver {
        answers: Mutex<Vec<Result<Signatory, SignatoryError>>>,
        calls: Mutex<Vec<bool>>,
    }

    impl ScriptedResolver {
        fn new(answers: Vec<Result<Signatory, SignatoryError>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<bool> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResolveSignatory for ScriptedResolver {
        async fn resolve(
            &self,
            _key_id: &str,
            force_refresh: bool,
        ) -> Result<Signatory, SignatoryError> {
            self.calls.lock().unwrap().push(force_refresh);
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                return Err(SignatoryError::NotFound);
            }
            answers.remove(0)
        }
    }

    fn public(signatory: &Signatory) -> Signatory {
        let mut public = signatory.clone();
        public.private_key = None;
        public
    }

    /// A request signed by alice at `signed_at` for `b.example`.
    fn signed_request(signed_at: DateTime<Utc>) -> IncomingRequest {
        let mut outgoing = OutgoingRequest::new(
            Method::POST,
            Url::parse("https://b.example/inbox").unwrap(),
        )
        .with_body(BODY);
        OutgoingSigner::new()
            .with_clock(Arc::new(FixedClock(signed_at)))
            .sign_outgoing(&mut outgoing, testing::alice())
            .unwrap();
        IncomingRequest {
            method: Method::POST,
            path: "/inbox".into(),
            host: "b.example".into(),
            headers: outgoing.headers,
            body: outgoing.body,
        }
    }

    fn verifier(resolver: Arc<dyn ResolveSignatory>) -> IncomingVerifier {
        IncomingVerifier::new(resolver, VerifierConfig::default())
            .with_clock(Arc::new(FixedClock(now())))
    }

    fn alice_resolver() -> Arc<ScriptedResolver> {
        Arc::new(ScriptedResolver::new(vec![Ok(public(testing::alice()))]))
    }

    #[tokio::test]
    async fn accepts_valid_request() {
        let resolver = alice_resolver();
        let signed = verifier(resolver.clone())
            .verify_incoming(signed_request(now()))
            .await
            .unwrap();

        assert_eq!(signed.origin, "a.example");
        assert_eq!(signed.timestamp, now().timestamp());
        assert_eq!(signed.signatory.key_id, KEY_ID);
        assert_eq!(signed.signature_header.key_id, KEY_ID);
        assert!(signed.clear_signature.starts_with("(request-target): post /inbox\n"));
        assert!(signed.clear_signature.ends_with("\nhost: b.example"));
        assert_eq!(resolver.calls(), [false]);
    }

    #[tokio::test]
    async fn replay_window_boundaries() {
        let ttl = Duration::seconds(300);

        for (offset, accepted) in [
            (ttl - Duration::seconds(1), true),
            (ttl, true),
            (ttl + Duration::seconds(1), false),
        ] {
            let result = verifier(alice_resolver())
                .verify_incoming(signed_request(now() - offset))
                .await;
            assert_eq!(result.is_ok(), accepted, "offset {offset}");
            if let Err(error) = result {
                assert!(matches!(error, SignatureError::Expired { .. }));
                assert_eq!(error.kind(), ErrorKind::TimeWindow);
                assert!(error.to_string().starts_with("object is too old"));
            }
        }
    }

    #[tokio::test]
    async fn unparseable_date_is_rejected() {
        let mut request = signed_request(now());
        request.headers.insert("date", HeaderValue::from_static("the day before"));
        let error = verifier(alice_resolver())
            .verify_incoming(request)
            .await
            .unwrap_err();
        assert!(matches!(error, SignatureError::InvalidDate(_)));
        assert_eq!(error.kind(), ErrorKind::TimeWindow);
    }

    #[tokio::test]
    async fn content_length_mismatch_is_rejected() {
        let mut request = signed_request(now());
        request.body = Bytes::from_static(b"{}");
        let error = verifier(alice_resolver())
            .verify_incoming(request)
            .await
            .unwrap_err();
        assert!(matches!(error, SignatureError::ContentLength { .. }));
        assert_eq!(error.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn tampered_body_is_an_integrity_error() {
        let mut request = signed_request(now());
        let mut body = request.body.to_vec();
        body[2] ^= 0x01;
        request.body = Bytes::from(body);

        let resolver = alice_resolver();
        let error = verifier(resolver.clone())
            .verify_incoming(request)
            .await
            .unwrap_err();
        assert!(matches!(error, SignatureError::Digest));
        assert_eq!(error.kind(), ErrorKind::Integrity);
        assert!(resolver.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_digest_is_tolerated_unless_required() {
        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_str(&format_http_date(now())).unwrap());
        headers.insert("content-length", HeaderValue::from(BODY.len()));
        let clear = build_signing_string(
            "POST",
            "/inbox",
            "b.example",
            &["(request-target)", "host", "date", "content-length"],
            |name| header_value(&headers, name),
        )
        .unwrap();
        let signature = crate::signing::sign_string(&clear, testing::alice()).unwrap();
        let header = SignatureHeader::new(
            KEY_ID,
            Algorithm::RsaSha256,
            vec![
                "(request-target)".into(),
                "host".into(),
                "date".into(),
                "content-length".into(),
            ],
            signature,
        );
        headers.insert("signature", HeaderValue::from_str(&header.to_string()).unwrap());
        let request = IncomingRequest {
            method: Method::POST,
            path: "/inbox".into(),
            host: "b.example".into(),
            headers,
            body: Bytes::from_static(BODY),
        };

        verifier(alice_resolver())
            .verify_incoming(request.clone())
            .await
            .unwrap();

        let strict = IncomingVerifier::new(
            alice_resolver(),
            VerifierConfig {
                require_digest: true,
                ..VerifierConfig::default()
            },
        )
        .with_clock(Arc::new(FixedClock(now())));
        let error = strict.verify_incoming(request).await.unwrap_err();
        assert!(matches!(error, SignatureError::Digest));
    }

    #[tokio::test]
    async fn missing_signature_header_is_malformed() {
        let mut request = signed_request(now());
        request.headers.remove("signature");
        let error = verifier(alice_resolver())
            .verify_incoming(request)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedSignatureHeader);
    }

    #[tokio::test]
    async fn headers_without_date_are_rejected_even_if_signed() {
        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_str(&format_http_date(now())).unwrap());
        headers.insert("content-length", HeaderValue::from(BODY.len()));
        headers.insert("digest", HeaderValue::from_str(&body_digest(BODY)).unwrap());
        let names = ["(request-target)", "host", "digest", "content-length"];
        let clear = build_signing_string("POST", "/inbox", "b.example", &names, |name| {
            header_value(&headers, name)
        })
        .unwrap();
        let signature = crate::signing::sign_string(&clear, testing::alice()).unwrap();
        let header = SignatureHeader::new(
            KEY_ID,
            Algorithm::RsaSha256,
            names.iter().map(|name| name.to_string()).collect(),
            signature,
        );
        headers.insert("signature", HeaderValue::from_str(&header.to_string()).unwrap());

        let resolver = alice_resolver();
        let error = verifier(resolver.clone())
            .verify_incoming(IncomingRequest {
                method: Method::POST,
                path: "/inbox".into(),
                host: "b.example".into(),
                headers,
                body: Bytes::from_static(BODY),
            })
            .await
            .unwrap_err();
        assert!(matches!(&error, SignatureError::MissingHeaders(missing) if missing == "date"));
        assert!(resolver.calls().is_empty());
    }

    #[tokio::test]
    async fn request_to_other_host_fails_verification() {
        let mut request = signed_request(now());
        request.host = "c.example".into();
        let error = verifier(Arc::new(ScriptedResolver::new(vec![
            Ok(public(testing::alice())),
            Ok(public(testing::alice())),
        ])))
        .verify_incoming(request)
        .await
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CryptographicVerification);
        assert_eq!(error.to_string(), "signature issue");
    }

    #[tokio::test]
    async fn stale_key_recovers_after_one_forced_refresh() {
        let mut request = signed_request(now());
        let mut outgoing = OutgoingRequest::new(
            Method::POST,
            Url::parse("https://b.example/inbox").unwrap(),
        )
        .with_body(BODY);
        OutgoingSigner::new()
            .with_clock(Arc::new(FixedClock(now())))
            .sign_outgoing(&mut outgoing, testing::alice_rotated())
            .unwrap();
        request.headers = outgoing.headers;

        let resolver = Arc::new(ScriptedResolver::new(vec![
            Ok(public(testing::alice())),
            Ok(public(testing::alice_rotated())),
            Ok(public(testing::alice_rotated())),
        ]));
        let signed = verifier(resolver.clone())
            .verify_incoming(request)
            .await
            .unwrap();
        assert_eq!(signed.signatory.public_key, testing::alice_rotated().public_key);
        assert_eq!(resolver.calls(), [false, true]);
    }

    #[tokio::test]
    async fn cache_miss_retries_with_refresh() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            Err(SignatoryError::NotFound),
            Ok(public(testing::alice())),
        ]));
        verifier(resolver.clone())
            .verify_incoming(signed_request(now()))
            .await
            .unwrap();
        assert_eq!(resolver.calls(), [false, true]);
    }

    #[tokio::test]
    async fn gives_up_after_two_attempts() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            Ok(public(testing::mallory())),
            Ok(public(testing::mallory())),
            Ok(public(testing::alice())),
        ]));
        let error = verifier(resolver.clone())
            .verify_incoming(signed_request(now()))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            SignatureError::VerificationExhausted { attempts: 2, .. }
        ));
        assert_eq!(error.kind(), ErrorKind::CryptographicVerification);
        assert_eq!(resolver.calls(), [false, true]);
    }

    #[tokio::test]
    async fn unresolvable_key_is_a_key_resolution_error() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            Err(SignatoryError::NotFound),
            Err(SignatoryError::Network("timed out".into())),
        ]));
        let error = verifier(resolver)
            .verify_incoming(signed_request(now()))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::KeyResolution);
    }

    #[tokio::test]
    async fn key_id_without_host_is_invalid_origin() {
        let mut request = signed_request(now());
        let signature = header_value(&request.headers, "signature").unwrap();
        let mut header = SignatureHeader::parse(&signature).unwrap();
        header.key_id = "main-key".into();
        request
            .headers
            .insert("signature", HeaderValue::from_str(&header.to_string()).unwrap());
        let error = verifier(alice_resolver())
            .verify_incoming(request)
            .await
            .unwrap_err();
        assert!(matches!(error, SignatureError::InvalidOrigin(_)));
        assert_eq!(error.kind(), ErrorKind::OriginMismatch);
    }

    #[tokio::test]
    async fn rotation_through_real_resolver_and_cache() {
        let fetcher = Arc::new(StubFetcher::serving(testing::alice_rotated()));
        let cache = Arc::new(MemoryKeyCache::new(None));
        cache.put(KEY_ID, public(testing::alice()));
        let resolver = Arc::new(SignatoryResolver::new(cache.clone(), fetcher.clone()));

        let mut outgoing = OutgoingRequest::new(
            Method::POST,
            Url::parse("https://b.example/inbox").unwrap(),
        )
        .with_body(BODY);
        OutgoingSigner::new()
            .with_clock(Arc::new(FixedClock(now())))
            .sign_outgoing(&mut outgoing, testing::alice_rotated())
            .unwrap();
        let request = IncomingRequest {
            method: Method::POST,
            path: "/inbox".into(),
            host: "b.example".into(),
            headers: outgoing.headers,
            body: outgoing.body,
        };

        verifier(resolver).verify_incoming(request).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            cache.get(KEY_ID).unwrap().public_key,
            testing::alice_rotated().public_key
        );
    }

    #[tokio::test]
    async fn counts_each_attempt_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        struct Counting(Arc<AtomicUsize>);

        #[async_trait]
        impl ResolveSignatory for Counting {
            async fn resolve(&self, _: &str, _: bool) -> Result<Signatory, SignatoryError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(public(testing::mallory()))
            }
        }

        let result = verifier(Arc::new(Counting(calls.clone())))
            .verify_incoming(signed_request(now()))
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
