use ollama_kit::builder::{parse_host, DEFAULT_PORT};
use ollama_kit::{ErrorKind, Result};

#[test]
fn test_bare_host_gets_default_port() -> Result<()> {
    let url = parse_host("0.0.0.0")?;
    assert_eq!(url.scheme(), "http");
    assert_eq!(url.host_str(), Some("0.0.0.0"));
    assert_eq!(url.port(), Some(DEFAULT_PORT));

    let url = parse_host("[::1]")?;
    assert_eq!(url.port(), Some(11434));

    let url = parse_host("  ollama.internal  ")?;
    assert_eq!(url.host_str(), Some("ollama.internal"));
    assert_eq!(url.port(), Some(11434));

    Ok(())
}

#[test]
fn test_explicit_port_is_kept() -> Result<()> {
    assert_eq!(parse_host("localhost:8080")?.port(), Some(8080));
    assert_eq!(parse_host("[::1]:9000")?.port(), Some(9000));
    Ok(())
}

#[test]
fn test_full_urls_keep_scheme_defaults() -> Result<()> {
    let url = parse_host("http://example.com")?;
    assert_eq!(url.port_or_known_default(), Some(80));

    let url = parse_host("https://example.com")?;
    assert_eq!(url.port_or_known_default(), Some(443));

    let url = parse_host("http://example.com:11435")?;
    assert_eq!(url.port(), Some(11435));

    Ok(())
}

#[test]
fn test_malformed_host_is_invalid_request() {
    let err = parse_host("http://[::1").err().expect("expected an error");
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
