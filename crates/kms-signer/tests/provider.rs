mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{RecordingClient, TEST_KEY, random_input};
use kms_signer::{
    KeyKind, KeyReference, KmsError, SignIntent, SignatureError, SignatureProvider,
    SigningAlgorithm,
};

fn test_key() -> KeyReference {
    // Size left unknown so the provider asks the KMS.
    KeyReference::new(TEST_KEY, KeyKind::Rsa)
}

fn signer(algorithm: &str, client: &Arc<RecordingClient>) -> SignatureProvider {
    SignatureProvider::create(test_key(), algorithm, SignIntent::Sign, client.clone()).unwrap()
}

fn verifier(algorithm: &str, client: &Arc<RecordingClient>) -> SignatureProvider {
    SignatureProvider::create(test_key(), algorithm, SignIntent::Verify, client.clone()).unwrap()
}

fn tamper(input: &[u8]) -> Vec<u8> {
    let mut tampered = input.to_vec();
    if tampered[0] == u8::MAX {
        tampered[0] -= 1;
    } else {
        tampered[0] += 1;
    }
    tampered
}

// ── Construction ─────────────────────────────────────────────────────

#[test]
fn invalid_algorithms_fail_without_remote_calls() {
    let client = RecordingClient::new();
    for (algorithm, intent) in [
        ("", SignIntent::Sign),
        ("", SignIntent::Verify),
        ("HS256", SignIntent::Sign),
        ("RSA-SHA1", SignIntent::Verify),
        ("rsa-sha256", SignIntent::Sign),
    ] {
        let result = SignatureProvider::create(test_key(), algorithm, intent, client.clone());
        match result {
            Err(SignatureError::InvalidArgument(_)) | Err(SignatureError::UnsupportedAlgorithm(_)) => {}
            other => panic!("expected construction failure for {algorithm:?}, got {other:?}"),
        }
    }
    assert_eq!(client.total_calls(), 0);
}

#[test]
fn construction_makes_no_remote_calls() {
    let client = RecordingClient::new();
    for algorithm in SigningAlgorithm::ALL {
        signer(algorithm.as_str(), &client);
        verifier(algorithm.as_str(), &client);
    }
    assert_eq!(client.total_calls(), 0);
}

// ── Sign / verify ────────────────────────────────────────────────────

#[test]
fn sign_verify_and_tamper_for_each_algorithm() {
    let client = RecordingClient::new();
    for (seed, algorithm) in SigningAlgorithm::ALL.into_iter().enumerate() {
        let provider = signer(algorithm.as_str(), &client);
        let input = random_input(seed as u64);

        let signature = provider.sign(&input).unwrap();
        assert_eq!(signature.len(), 128, "{algorithm} signature length");
        assert!(provider.verify(&input, &signature).unwrap());
        assert!(!provider.verify(&tamper(&input), &signature).unwrap());
    }
}

#[test]
fn tamper_decrements_max_byte() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA256", &client);
    let mut input = random_input(7);
    input[0] = u8::MAX;

    let signature = provider.sign(&input).unwrap();
    let tampered = tamper(&input);
    assert_eq!(tampered[0], u8::MAX - 1);
    assert!(!provider.verify(&tampered, &signature).unwrap());
}

#[test]
fn verification_only_accepts_signing_algorithm() {
    let client = RecordingClient::new();
    let input = random_input(42);

    for signed_with in SigningAlgorithm::ALL {
        let signature = signer(signed_with.as_str(), &client).sign(&input).unwrap();

        for verify_with in SigningAlgorithm::ALL {
            let valid = verifier(verify_with.as_str(), &client)
                .verify(&input, &signature)
                .unwrap();
            assert_eq!(
                valid,
                signed_with == verify_with,
                "signed with {signed_with}, verified with {verify_with}"
            );
        }
    }
}

#[test]
fn sha256_signature_rejected_by_sha384_verifier() {
    let client = RecordingClient::new();
    let input = random_input(1);

    let signature = signer("RSA-SHA256", &client).sign(&input).unwrap();
    assert_eq!(signature.len(), 128);
    assert!(!verifier("RSA-SHA384", &client).verify(&input, &signature).unwrap());
    assert!(verifier("RSA-SHA256", &client).verify(&input, &signature).unwrap());
}

#[test]
fn repeated_verify_is_stable() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA512", &client);
    let input = random_input(3);
    let signature = provider.sign(&input).unwrap();
    let tampered = tamper(&input);

    for _ in 0..5 {
        assert!(provider.verify(&input, &signature).unwrap());
        assert!(!provider.verify(&tampered, &signature).unwrap());
    }
}

#[test]
fn verifier_cannot_sign() {
    let client = RecordingClient::new();
    let provider = verifier("RSA-SHA256", &client);
    assert!(matches!(
        provider.sign(&random_input(0)),
        Err(SignatureError::InvalidOperation { .. })
    ));
    assert_eq!(client.total_calls(), 0);
}

// ── Remote metadata and failures ─────────────────────────────────────

#[test]
fn key_metadata_fetched_once() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA256", &client);
    for seed in 0..3 {
        provider.sign(&random_input(seed)).unwrap();
    }
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.sign_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn concurrent_first_signs_fetch_metadata_once() {
    let client = RecordingClient::new();
    let provider = Arc::new(signer("RSA-SHA256", &client));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|seed| {
            let provider = provider.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                provider.sign(&random_input(seed)).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 128);
    }

    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.sign_calls.load(Ordering::SeqCst), 8);
}

#[test]
fn failed_metadata_fetch_is_retried() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA256", &client);

    client.fail_next_calls(Some(KmsError::Unavailable("connection reset".into())));
    assert!(provider.sign(b"payload").is_err());
    client.fail_next_calls(None);
    assert_eq!(provider.sign(b"payload").unwrap().len(), 128);
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn sized_reference_skips_metadata_fetch() {
    let client = RecordingClient::new();
    let key = KeyReference::new(TEST_KEY, KeyKind::Rsa).with_size_bits(1024);
    let provider = SignatureProvider::create(key, "RSA-SHA256", SignIntent::Verify, client.clone()).unwrap();
    let signature = signer("RSA-SHA256", &client).sign(b"sized").unwrap();
    let before = client.metadata_calls.load(Ordering::SeqCst);

    assert!(provider.verify(b"sized", &signature).unwrap());
    assert_eq!(client.metadata_calls.load(Ordering::SeqCst), before);
}

#[test]
fn remote_failure_is_reported_and_retryable() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA384", &client);
    let input = random_input(9);

    client.fail_next_calls(Some(KmsError::Unavailable("connection reset".into())));
    assert!(matches!(
        provider.sign(&input),
        Err(SignatureError::CryptographicOperationFailed {
            source: KmsError::Unavailable(_),
            ..
        })
    ));

    client.fail_next_calls(None);
    let signature = provider.sign(&input).unwrap();
    assert!(provider.verify(&input, &signature).unwrap());
}

#[test]
fn remote_timeout_is_distinguishable() {
    let client = RecordingClient::new();
    let provider = signer("RSA-SHA256", &client);
    let signature = provider.sign(b"payload").unwrap();

    client.fail_next_calls(Some(KmsError::Timeout));
    assert!(matches!(
        provider.verify(b"payload", &signature),
        Err(SignatureError::Timeout { .. })
    ));
}

// ── Async adapters ───────────────────────────────────────────────────

#[tokio::test]
async fn async_sign_and_verify() {
    let client = RecordingClient::new();
    let provider = Arc::new(signer("RSA-SHA256", &client));
    let input = random_input(11);

    let signature = provider.sign_async(input.clone()).await.unwrap();
    assert_eq!(signature.len(), 128);
    assert!(provider.verify_async(input.clone(), signature.clone()).await.unwrap());
    assert!(!provider.verify_async(tamper(&input), signature).await.unwrap());
}

#[tokio::test]
async fn concurrent_verifies_share_one_provider() {
    let client = RecordingClient::new();
    let provider = Arc::new(signer("RSA-SHA512", &client));
    let input = random_input(12);
    let signature = provider.sign(&input).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let provider = provider.clone();
            let input = input.clone();
            let signature = signature.clone();
            tokio::spawn(async move { provider.verify_async(input, signature).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
}
