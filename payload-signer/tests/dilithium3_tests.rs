//! Dilithium3 簽名庫集成測試

use payload_signer::dilithium::Dilithium3Signer;
use payload_signer::traits::Signer;
use payload_signer::SignerError;

#[test]
fn test_full_sign_open_workflow() {
    // 1. 生成密鑰對
    let mut signer = Dilithium3Signer::new();
    signer.generate_keypair().unwrap();

    // 2. 準備負載（模擬固定證明）
    let proof_payload = r#"{"cid":"bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"}"#;

    // 3. 簽名（附加式簽名消息）
    let signed = signer.sign(proof_payload.as_bytes()).unwrap();
    println!("✓ Generated signed message: {} bytes", signed.len());

    // 4. 驗證並恢復負載
    let recovered = signer.open(&signed).unwrap();
    assert_eq!(
        recovered,
        proof_payload.as_bytes(),
        "Recovered payload must match the signed one"
    );
    println!("✓ Payload recovered through verification");

    // 5. 篡改檢測：替換負載部分
    let mut tampered = signed.clone();
    let len = tampered.len();
    tampered[len - 5] ^= 0xff;
    assert!(
        signer.open(&tampered).is_err(),
        "Tampered message must fail verification"
    );
    println!("✓ Tamper detection works");
}

#[test]
fn test_keypair_persistence() {
    // 1. 生成原始密鑰對
    let mut original_signer = Dilithium3Signer::new();
    original_signer.generate_keypair().unwrap();

    // 2. 導出密鑰
    let public_key = original_signer.public_key().to_vec();
    let secret_key = original_signer.secret_key().to_vec();

    println!(
        "✓ Exported keys: pk={} bytes, sk={} bytes",
        public_key.len(),
        secret_key.len()
    );

    // 3. 從字節恢復並交叉驗證
    let restored = Dilithium3Signer::from_bytes(&public_key, &secret_key).unwrap();

    let signed = original_signer.sign(b"persistence test").unwrap();
    assert_eq!(restored.open(&signed).unwrap(), b"persistence test");

    let signed2 = restored.sign(b"reverse direction").unwrap();
    assert_eq!(original_signer.open(&signed2).unwrap(), b"reverse direction");
}

#[test]
fn test_wrong_key_rejection() {
    let mut signer = Dilithium3Signer::new();
    signer.generate_keypair().unwrap();

    let mut other = Dilithium3Signer::new();
    other.generate_keypair().unwrap();

    let signed = signer.sign(b"audit payload").unwrap();

    match other.open(&signed) {
        Err(SignerError::Verification(_)) => {}
        other => panic!("Expected Verification error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_verification_only_flow() {
    // 審計方只持有提交者的公鑰
    let mut submitter = Dilithium3Signer::new();
    submitter.generate_keypair().unwrap();

    let signed_b64 = submitter.sign_base64(br#"{"cid":"QmTest"}"#).unwrap();

    let auditor = Dilithium3Signer::from_public_key_hex(&submitter.public_key_hex()).unwrap();
    let recovered = auditor.open_base64(&signed_b64).unwrap();
    assert_eq!(recovered, br#"{"cid":"QmTest"}"#);

    assert_eq!(auditor.algorithm_name(), "Dilithium3");
}
