//! Canonical text decoding of raw chart buffers.
//!
//! Legacy chart files come in UTF-8 (with or without BOM), UTF-16 and various
//! Windows codepages. Everything line-oriented downstream works on one
//! canonical UTF-8 string produced here.

use encoding_rs::{Encoding, WINDOWS_1252};

/// Decode `data` to UTF-8.
///
/// A BOM wins if present; otherwise valid UTF-8 is taken as-is and anything
/// else is treated as WINDOWS_1252, which maps every byte and therefore
/// cannot fail.
pub fn normalize_utf8(data: &[u8]) -> String {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(data) {
        // decode() sniffs and strips the BOM itself
        let (text, _, _) = encoding.decode(data);
        return text.into_owned();
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("buffer is not valid UTF-8, decoding as WINDOWS_1252");
            let (text, _, _) = WINDOWS_1252.decode(data);
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8_passes_through() {
        assert_eq!(normalize_utf8("#TITLE:Häßlich".as_bytes()), "#TITLE:Häßlich");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"#TITLE:Song");
        assert_eq!(normalize_utf8(&data), "#TITLE:Song");
    }

    #[test]
    fn latin1_fallback() {
        // "Tiden är nu" in WINDOWS_1252
        let data = b"#ARTIST:Tiden \xE4r nu";
        assert_eq!(normalize_utf8(data), "#ARTIST:Tiden är nu");
    }

    #[test]
    fn utf16le_bom_is_honored() {
        let mut data = vec![0xFF, 0xFE];
        for unit in "#T".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(normalize_utf8(&data), "#T");
    }
}
