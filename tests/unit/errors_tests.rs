/*!
 * Tests for error types and conversions
 */

use confessions::errors::{AppError, ConfessionError, PushError};

#[test]
fn test_notFound_display_shouldNameTheConfession() {
    let error = ConfessionError::NotFound(12);
    assert_eq!(error.to_string(), "Could not find the confession 12");
}

#[test]
fn test_fromAnyhow_withTypedError_shouldRecoverIt() {
    let wrapped = anyhow::Error::from(ConfessionError::InvalidState("not pending".to_string()));

    let recovered = ConfessionError::from(wrapped);

    assert_eq!(recovered, ConfessionError::InvalidState("not pending".to_string()));
    assert!(!recovered.is_store());
}

#[test]
fn test_fromAnyhow_withOtherError_shouldBecomeStoreError() {
    let wrapped = anyhow::anyhow!("disk full").context("Failed to write");

    let converted = ConfessionError::from(wrapped);

    match converted {
        ConfessionError::Store(message) => {
            assert!(message.contains("Failed to write"));
            assert!(message.contains("disk full"));
        }
        other => panic!("Expected store error, got {:?}", other),
    }
}

#[test]
fn test_fromRusqlite_shouldBecomeStoreError() {
    let converted = ConfessionError::from(rusqlite::Error::QueryReturnedNoRows);
    assert!(converted.is_store());
}

#[test]
fn test_pushError_fromSerdeJson_shouldBeSerialization() {
    let error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

    let converted = PushError::from(error);

    assert!(matches!(converted, PushError::Serialization(_)));
}

#[test]
fn test_appError_fromConfessionError_shouldWrap() {
    let error: AppError = ConfessionError::NotFound(3).into();

    assert!(matches!(error, AppError::Confession(ConfessionError::NotFound(3))));
    assert_eq!(
        error.to_string(),
        "Confession error: Could not find the confession 3"
    );
}

#[test]
fn test_appError_fromIo_shouldBeFileError() {
    let error: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(error, AppError::File(_)));
}
