use super::ProviderError;
use super::ProviderName;

#[test]
fn it_parses_provider_names() {
    assert_eq!(
        ProviderName::parse("simple".to_string()),
        Some(ProviderName::Simple)
    );
    assert_eq!(ProviderName::parse("sse".to_string()), Some(ProviderName::Sse));
    assert_eq!(ProviderName::parse("mock".to_string()), None);
}

#[test]
fn it_distinguishes_aborts_from_failures() {
    assert!(ProviderError::Aborted.is_aborted());
    assert!(!ProviderError::Transport("network down".to_string()).is_aborted());
    assert!(!ProviderError::Status(502).is_aborted());
}

#[test]
fn it_formats_failures() {
    insta::assert_snapshot!(ProviderError::Transport("network down".to_string()).to_string(), @"request failed: network down");
    insta::assert_snapshot!(ProviderError::Status(503).to_string(), @"server responded with status 503");
}
