use bytes::{Bytes, BytesMut};
use compression_codecs::{EncodeV2, gzip::GzipEncoder};
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use regex::Regex;
use std::io;
use std::sync::LazyLock;

/// The `Content-Encoding` value for gzip.
pub(crate) const GZIP: &str = "gzip";

pub(crate) const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

static ACCEPT_GZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(gzip|\*)(;q=((0|1)(.\d+)?))?").expect("accept-encoding pattern is valid")
});

/// Creates a gzip encoder at the default level.
pub(crate) fn encoder() -> Box<dyn EncodeV2 + Send> {
    Box::new(GzipEncoder::new(Level::Default.into()))
}

/// Decides whether an `Accept-Encoding` header allows a gzip response.
///
/// The first `gzip` or `*` token is taken, with an optional `;q=` value
/// directly attached. Only the literal zeros `0`, `0.0`, `0.00` and `0.000`
/// refuse gzip; any other quality, or none at all, accepts it.
pub fn accepts_gzip(header: &str) -> bool {
    let Some(captures) = ACCEPT_GZIP.captures(header) else {
        return false;
    };
    !matches!(
        captures.get(3).map(|q| q.as_str()),
        Some("0" | "0.0" | "0.00" | "0.000")
    )
}

/// Gzips a complete buffer in one go.
pub(crate) fn gzip_bytes(input: &[u8]) -> io::Result<Bytes> {
    let mut encoder = encoder();
    let mut output_buffer = vec![0u8; OUTPUT_BUFFER_SIZE];
    let mut input_buf = PartialBuffer::new(input);
    let mut all_output = BytesMut::with_capacity(input.len() / 2);

    // Keep encoding until all input is consumed
    while input_buf.written_len() < input.len() {
        let mut output = WriteBuffer::new_initialized(output_buffer.as_mut_slice());
        let consumed = input_buf.written_len();
        encoder.encode(&mut input_buf, &mut output).map_err(io::Error::other)?;

        let written = output.written_len();
        if written == 0 && input_buf.written_len() == consumed {
            return Err(io::Error::other("gzip encoder made no progress"));
        }
        all_output.extend_from_slice(&output_buffer[..written]);
    }

    loop {
        let mut output = WriteBuffer::new_initialized(output_buffer.as_mut_slice());
        let done = encoder.finish(&mut output).map_err(io::Error::other)?;
        let written = output.written_len();
        all_output.extend_from_slice(&output_buffer[..written]);
        if done {
            break;
        }
    }

    Ok(all_output.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_accepts_plain_gzip() {
        assert!(accepts_gzip("gzip"));
        assert!(accepts_gzip("deflate, gzip"));
        assert!(accepts_gzip("gzip, deflate, br"));
    }

    #[test]
    fn test_accepts_wildcard() {
        assert!(accepts_gzip("*"));
        assert!(accepts_gzip("br, *;q=0.1"));
    }

    #[test]
    fn test_zero_literals_refuse() {
        assert!(!accepts_gzip("gzip;q=0"));
        assert!(!accepts_gzip("gzip;q=0.0"));
        assert!(!accepts_gzip("gzip;q=0.00"));
        assert!(!accepts_gzip("gzip;q=0.000"));
        assert!(!accepts_gzip("*;q=0"));
    }

    #[test]
    fn test_nonzero_quality_accepts() {
        assert!(accepts_gzip("gzip;q=0.5"));
        assert!(accepts_gzip("gzip;q=1"));
        assert!(accepts_gzip("gzip;q=1.0"));
        // Not one of the zero literals, so it still counts as acceptable.
        assert!(accepts_gzip("gzip;q=0.0000"));
    }

    #[test]
    fn test_first_match_wins() {
        assert!(!accepts_gzip("gzip;q=0, *"));
        assert!(accepts_gzip("*, gzip;q=0"));
    }

    #[test]
    fn test_unsupported_encodings() {
        assert!(!accepts_gzip(""));
        assert!(!accepts_gzip("identity"));
        assert!(!accepts_gzip("br, deflate"));
    }

    #[test]
    fn test_gzip_bytes_round_trip() {
        let input = "lorem ipsum dolor sit amet ".repeat(100);
        let compressed = gzip_bytes(input.as_bytes()).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert!(compressed.len() < input.len());

        let mut decoded = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_gzip_bytes_empty_input() {
        let compressed = gzip_bytes(&[]).unwrap();
        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert!(decoded.is_empty());
    }
}
