//! Property tests for the multipart extractor.
//!
//! A payload wrapped into a well-formed body must come back byte for byte,
//! whatever it contains, as long as it does not hold a full delimiter.

use folio_core::multipart::{DEFAULT_CONTENT_TYPE, ExtractError, extract};
use proptest::prelude::*;

const BOUNDARY: &str = "----folioBoundary7MA4YWxk";

fn wrap(fields: &[(&str, &[u8])], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content_type, data)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Bytes biased towards the characters that matter to the scanner.
fn tricky_bytes() -> impl Strategy<Value = Vec<u8>> {
    let interesting = prop_oneof![
        Just(b'\r'),
        Just(b'\n'),
        Just(b'-'),
        Just(b'f'),
        Just(b'o'),
        Just(b'"'),
        any::<u8>(),
    ];
    prop::collection::vec(interesting, 0..2048)
}

proptest! {
    #[test]
    fn payload_round_trips(data in tricky_bytes()) {
        let delimiter = format!("--{BOUNDARY}");
        prop_assume!(!contains(&data, delimiter.as_bytes()));

        let body = wrap(&[("title", &b"hello"[..])], Some(("photo.jpg", "image/jpeg", &data[..])));
        let file = extract(&body, &content_type()).unwrap();

        prop_assert_eq!(file.data, &data[..]);
        prop_assert_eq!(file.filename, "photo.jpg");
        prop_assert_eq!(file.content_type, "image/jpeg");
    }

    #[test]
    fn payload_with_partial_delimiters_round_trips(
        cut in 1usize..BOUNDARY.len() + 2,
        prefix in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let delimiter = format!("--{BOUNDARY}");
        let mut data = prefix;
        data.extend_from_slice(&delimiter.as_bytes()[..cut]);
        data.extend_from_slice(b"\r\n");
        prop_assume!(!contains(&data, delimiter.as_bytes()));

        let body = wrap(&[], Some(("a.bin", DEFAULT_CONTENT_TYPE, &data[..])));
        let file = extract(&body, &content_type()).unwrap();
        prop_assert_eq!(file.data, &data[..]);
    }

    #[test]
    fn bodies_without_files_never_extract(values in prop::collection::vec("[a-e0-9 ]{0,40}", 0..5)) {
        let fields: Vec<(&str, &[u8])> = values
            .iter()
            .map(|value| ("field", value.as_bytes()))
            .collect();

        let body = wrap(&fields, None);
        prop_assert_eq!(extract(&body, &content_type()), Err(ExtractError::NoFileFound));
    }
}

#[test]
fn only_first_of_many_files_is_returned() {
    let mut body = wrap(&[], Some(("one.png", "image/png", &b"ONE"[..])));
    // Splice a second file in before the closing delimiter.
    let closing = format!("--{BOUNDARY}--\r\n");
    body.truncate(body.len() - closing.len());
    body.extend_from_slice(&wrap(&[], Some(("two.png", "image/png", &b"TWO"[..]))));

    let file = extract(&body, &content_type()).unwrap();
    assert_eq!(file.filename, "one.png");
    assert_eq!(file.data, b"ONE");
}
