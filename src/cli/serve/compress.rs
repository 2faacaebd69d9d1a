//! Gzip response compression.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use tiny_http::Request;

/// Bodies smaller than this are not worth compressing.
const MIN_COMPRESS_SIZE: usize = 256;

/// Whether the request's `Accept-Encoding` allows gzip.
pub fn accepts_gzip(request: &Request) -> bool {
    request
        .headers()
        .iter()
        .filter(|h| h.field.equiv("Accept-Encoding"))
        .any(|h| allows_gzip(h.value.as_str()))
}

/// Parse an `Accept-Encoding` value (`gzip, br;q=0.9`, `*`, `gzip;q=0`).
fn allows_gzip(value: &str) -> bool {
    value.split(',').any(|item| {
        let mut parts = item.split(';').map(str::trim);
        let coding = parts.next().unwrap_or_default();
        let q_zero = parts.any(|p| {
            p.strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        });
        (coding.eq_ignore_ascii_case("gzip") || coding == "*") && !q_zero
    })
}

/// Whether a body of this type and size should be gzipped.
pub fn should_compress(content_type: &str, len: usize) -> bool {
    len >= MIN_COMPRESS_SIZE && crate::utils::mime::is_compressible(content_type)
}

pub fn gzip(body: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::fast());
    encoder.write_all(body)?;
    encoder.finish()
}
