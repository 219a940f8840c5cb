use clickmask::{ClickmaskError, ErrorKind, Result, SessionError};

#[test]
fn test_error_display() {
    let err = ClickmaskError::Api {
        status: 413,
        message: "Image too large".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("413"));
    assert!(text.contains("Image too large"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(ClickmaskError::DecoderNotReady)
    }
    assert!(returns_error().is_err());
}

// ============================================================================
// Kind classification
// ============================================================================

#[test]
fn encoder_failures_are_encode_kind() {
    for err in [
        ClickmaskError::Http("connection refused".into()),
        ClickmaskError::Api {
            status: 500,
            message: "boom".into(),
        },
        ClickmaskError::MalformedResponse("no embeddingData".into()),
    ] {
        assert_eq!(err.kind(), ErrorKind::Encode, "{err}");
        assert!(err.is_terminal());
    }
}

#[test]
fn model_load_is_terminal() {
    let err = ClickmaskError::ModelLoad("missing file".into());
    assert_eq!(err.kind(), ErrorKind::ModelLoad);
    assert!(err.is_terminal());
}

#[test]
fn decode_failures_are_recoverable() {
    for err in [
        ClickmaskError::Inference("bad shape".into()),
        ClickmaskError::DecoderNotReady,
    ] {
        assert_eq!(err.kind(), ErrorKind::Inference, "{err}");
        assert!(!err.is_terminal());
    }
}

#[test]
fn local_failures_are_other() {
    let io = ClickmaskError::from(std::io::Error::other("disk full"));
    assert_eq!(io.kind(), ErrorKind::Other);
    assert!(!io.is_terminal());

    let json = ClickmaskError::from(serde_json::from_str::<u32>("x").unwrap_err());
    assert_eq!(json.kind(), ErrorKind::Other);

    assert_eq!(
        ClickmaskError::Configuration("bad".into()).kind(),
        ErrorKind::Other
    );
}

// ============================================================================
// Session error payload
// ============================================================================

#[test]
fn session_error_serializes_kind_in_snake_case() {
    let err = SessionError::new(ErrorKind::ModelLoad, "no such file");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "model_load");
    assert_eq!(json["message"], "no such file");
    assert!(err.is_terminal());
}
