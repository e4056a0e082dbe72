//! Content-hash integrity check (§4.2 of the governing design): `SHA-1` of
//! the file's text with every line containing `sha1sum` elided.
//!
//! A general-purpose streaming hasher crate was considered and rejected —
//! see DESIGN.md. The digest here is only ever computed over an entire
//! in-memory file, so a direct, self-contained implementation of the fixed
//! block algorithm is simpler than adopting a dependency for it.

use crate::error::{CrdsError, Result};

/// Computes the hex-encoded SHA-1 digest of `text` with every line
/// containing the literal substring `sha1sum` removed first.
pub fn checksum_text(text: &str) -> String {
    let filtered: String = text
        .lines()
        .filter(|line| !line.contains("sha1sum"))
        .map(|line| format!("{line}\n"))
        .collect();
    sha1_hex(filtered.as_bytes())
}

pub fn verify(file: &str, text: &str, expected: &str) -> Result<()> {
    let computed = checksum_text(text);
    if computed.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CrdsError::ChecksumError {
            file: file.to_string(),
            expected: expected.to_string(),
            computed,
        })
    }
}

/// Replaces the first `'sha1sum' : '...'` field in `text` with the
/// recomputed digest, preserving line order and every other line verbatim.
pub fn rewrite_checksum(text: &str) -> String {
    let digest = checksum_text(text);
    let mut replaced = false;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !replaced && line.contains("sha1sum") {
            if let Some(colon) = line.find(':') {
                let (prefix, _) = line.split_at(colon);
                let quote = line.rfind(|c| c == '\'' || c == '"');
                let trailing_comma = line.trim_end().ends_with(',');
                out.push_str(prefix);
                out.push_str(": '");
                out.push_str(&digest);
                out.push('\'');
                if trailing_comma {
                    out.push(',');
                }
                out.push('\n');
                replaced = true;
                let _ = quote;
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn sha1_hex(data: &[u8]) -> String {
    let digest = sha1(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A direct implementation of FIPS 180-4 SHA-1 over a single in-memory
/// buffer; no streaming interface is needed here.
fn sha1(data: &[u8]) -> [u8; 20] {
    let mut h: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

    let mut message = data.to_vec();
    let bit_len = (data.len() as u64) * 8;
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_len.to_be_bytes());

    for chunk in message.chunks_exact(64) {
        let mut w = [0u32; 80];
        for (i, word) in chunk.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let (mut a, mut b, mut c, mut d, mut e) = (h[0], h[1], h[2], h[3], h[4]);
        for (i, &wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | ((!b) & d), 0x5A827999u32),
                20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
                _ => (b ^ c ^ d, 0xCA62C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        h[0] = h[0].wrapping_add(a);
        h[1] = h[1].wrapping_add(b);
        h[2] = h[2].wrapping_add(c);
        h[3] = h[3].wrapping_add(d);
        h[4] = h[4].wrapping_add(e);
    }

    let mut out = [0u8; 20];
    for (i, word) in h.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_sha1_vector() {
        // sha1("abc")
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89");
    }

    #[test]
    fn empty_input_matches_known_vector() {
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn lines_containing_sha1sum_are_elided_before_hashing() {
        let with_sum = "header = {'sha1sum': 'xyz'}\nselector = {}\n";
        let without_sum = "selector = {}\n";
        assert_eq!(checksum_text(with_sum), checksum_text(without_sum));
    }

    #[test]
    fn verify_detects_a_tampered_byte() {
        let text = "selector = {}\n";
        let good = checksum_text(text);
        assert!(verify("x.rmap", text, &good).is_ok());
        assert!(matches!(
            verify("x.rmap", "selector = { }\n", &good),
            Err(CrdsError::ChecksumError { .. })
        ));
    }
}
