//! Character sets and collations used by string-like fields.
//!
//! Collation behaviour is deliberately small: a binary collation compares raw
//! bytes and never pads; `_bin` collations compare bytes with PAD SPACE
//! semantics; `_ci` collations fold ASCII letters to upper case and pad with
//! spaces. Comparison ([`CharsetInfo::strnncollsp`]) and sort weights
//! ([`CharsetInfo::strnxfrm`]) use the same folding, so memcmp over weights
//! agrees with the comparator.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collation {
    Binary,
    PadBin,
    CaseInsensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    SingleByte,
    Utf8,
}

/// A character set plus collation, keyed by the server's collation id.
#[derive(Debug, PartialEq, Eq)]
pub struct CharsetInfo {
    pub id: u32,
    pub name: &'static str,
    pub csname: &'static str,
    pub mbmaxlen: u8,
    collation: Collation,
    encoding: Encoding,
}

pub static BINARY: CharsetInfo = CharsetInfo {
    id: 63,
    name: "binary",
    csname: "binary",
    mbmaxlen: 1,
    collation: Collation::Binary,
    encoding: Encoding::SingleByte,
};

pub static LATIN1_SWEDISH_CI: CharsetInfo = CharsetInfo {
    id: 8,
    name: "latin1_swedish_ci",
    csname: "latin1",
    mbmaxlen: 1,
    collation: Collation::CaseInsensitive,
    encoding: Encoding::SingleByte,
};

pub static LATIN1_BIN: CharsetInfo = CharsetInfo {
    id: 47,
    name: "latin1_bin",
    csname: "latin1",
    mbmaxlen: 1,
    collation: Collation::PadBin,
    encoding: Encoding::SingleByte,
};

pub static UTF8_GENERAL_CI: CharsetInfo = CharsetInfo {
    id: 33,
    name: "utf8_general_ci",
    csname: "utf8",
    mbmaxlen: 3,
    collation: Collation::CaseInsensitive,
    encoding: Encoding::Utf8,
};

pub static UTF8MB4_GENERAL_CI: CharsetInfo = CharsetInfo {
    id: 45,
    name: "utf8mb4_general_ci",
    csname: "utf8mb4",
    mbmaxlen: 4,
    collation: Collation::CaseInsensitive,
    encoding: Encoding::Utf8,
};

pub static UTF8MB4_BIN: CharsetInfo = CharsetInfo {
    id: 46,
    name: "utf8mb4_bin",
    csname: "utf8mb4",
    mbmaxlen: 4,
    collation: Collation::PadBin,
    encoding: Encoding::Utf8,
};

static ALL: [&CharsetInfo; 6] = [
    &BINARY,
    &LATIN1_SWEDISH_CI,
    &LATIN1_BIN,
    &UTF8_GENERAL_CI,
    &UTF8MB4_GENERAL_CI,
    &UTF8MB4_BIN,
];

/// Look up a collation by id.
pub fn get_charset(id: u32) -> Option<&'static CharsetInfo> {
    ALL.iter().copied().find(|cs| cs.id == id)
}

/// Look up a collation by name, or a character set by name (its default collation).
pub fn get_charset_by_name(name: &str) -> Option<&'static CharsetInfo> {
    let lower = name.to_ascii_lowercase();
    if let Some(cs) = ALL.iter().copied().find(|cs| cs.name == lower) {
        return Some(cs);
    }
    match lower.as_str() {
        "binary" => Some(&BINARY),
        "latin1" => Some(&LATIN1_SWEDISH_CI),
        "utf8" | "utf8mb3" => Some(&UTF8_GENERAL_CI),
        "utf8mb4" => Some(&UTF8MB4_GENERAL_CI),
        _ => None,
    }
}

/// Result of scanning for the longest well-formed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellFormed {
    /// Bytes in the accepted prefix.
    pub len: usize,
    /// Characters in the accepted prefix.
    pub chars: usize,
    /// True when scanning stopped on an invalid byte sequence.
    pub invalid: bool,
}

impl CharsetInfo {
    pub fn is_binary(&self) -> bool {
        self.collation == Collation::Binary
    }

    /// Padding byte for fixed-length values.
    pub fn pad_char(&self) -> u8 {
        if self.is_binary() {
            0
        } else {
            b' '
        }
    }

    fn weight(&self, b: u8) -> u8 {
        match self.collation {
            Collation::CaseInsensitive => b.to_ascii_uppercase(),
            _ => b,
        }
    }

    /// Three-way comparison with this collation's padding rules.
    ///
    /// Binary collations compare bytes and then lengths. Padded collations treat
    /// the shorter string as if it were extended with spaces.
    pub fn strnncollsp(&self, a: &[u8], b: &[u8]) -> Ordering {
        let common = a.len().min(b.len());
        for i in 0..common {
            let ord = self.weight(a[i]).cmp(&self.weight(b[i]));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if self.is_binary() {
            return a.len().cmp(&b.len());
        }
        let (rest, flip) = if a.len() > common {
            (&a[common..], false)
        } else {
            (&b[common..], true)
        };
        for &c in rest {
            let ord = self.weight(c).cmp(&b' ');
            if ord != Ordering::Equal {
                return if flip { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }

    /// Strict comparison without padding, used where trailing spaces matter.
    pub fn strnncoll(&self, a: &[u8], b: &[u8]) -> Ordering {
        let common = a.len().min(b.len());
        for i in 0..common {
            let ord = self.weight(a[i]).cmp(&self.weight(b[i]));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }

    /// Write sort weights of `src` into `dst`, padding with the pad weight.
    ///
    /// Returns the number of weight bytes taken from `src`.
    pub fn strnxfrm(&self, dst: &mut [u8], src: &[u8]) -> usize {
        let n = dst.len().min(src.len());
        for i in 0..n {
            dst[i] = self.weight(src[i]);
        }
        dst[n..].fill(self.pad_char());
        n
    }

    /// Longest prefix of `src` that is well formed and holds at most `max_chars`.
    pub fn well_formed_len(&self, src: &[u8], max_chars: usize) -> WellFormed {
        match self.encoding {
            Encoding::SingleByte => {
                let len = src.len().min(max_chars);
                WellFormed { len, chars: len, invalid: false }
            }
            Encoding::Utf8 => {
                let mut pos = 0;
                let mut chars = 0;
                while pos < src.len() && chars < max_chars {
                    match utf8_char_len(&src[pos..], self.mbmaxlen) {
                        Some(n) => {
                            pos += n;
                            chars += 1;
                        }
                        None => {
                            return WellFormed { len: pos, chars, invalid: true };
                        }
                    }
                }
                WellFormed { len: pos, chars, invalid: false }
            }
        }
    }

    /// Number of characters in `src`; invalid bytes count as one character each.
    pub fn numchars(&self, src: &[u8]) -> usize {
        match self.encoding {
            Encoding::SingleByte => src.len(),
            Encoding::Utf8 => {
                let mut pos = 0;
                let mut chars = 0;
                while pos < src.len() {
                    pos += utf8_char_len(&src[pos..], self.mbmaxlen).unwrap_or(1);
                    chars += 1;
                }
                chars
            }
        }
    }

    /// Byte offset just past the first `chars` characters of `src`.
    pub fn charpos(&self, src: &[u8], chars: usize) -> usize {
        match self.encoding {
            Encoding::SingleByte => src.len().min(chars),
            Encoding::Utf8 => {
                let mut pos = 0;
                let mut n = 0;
                while pos < src.len() && n < chars {
                    pos += utf8_char_len(&src[pos..], self.mbmaxlen).unwrap_or(1);
                    n += 1;
                }
                pos.min(src.len())
            }
        }
    }

    /// Length of `src` without trailing spaces. Binary strings keep every
    /// byte, trailing NULs included.
    pub fn lengthsp(&self, src: &[u8]) -> usize {
        if self.is_binary() {
            return src.len();
        }
        src.iter().rposition(|&b| b != b' ').map(|p| p + 1).unwrap_or(0)
    }
}

/// Length of the UTF-8 sequence at the start of `s`, if well formed and within
/// `mbmaxlen` bytes.
fn utf8_char_len(s: &[u8], mbmaxlen: u8) -> Option<usize> {
    let first = *s.first()?;
    let n = match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    if n > mbmaxlen as usize || s.len() < n {
        return None;
    }
    std::str::from_utf8(&s[..n]).ok().map(|_| n)
}

/// True if anything other than spaces remains in `rest`.
pub fn test_if_important_data(rest: &[u8]) -> bool {
    rest.iter().any(|&b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(get_charset(63).unwrap().name, "binary");
        assert_eq!(get_charset(45).unwrap().mbmaxlen, 4);
        assert!(get_charset(9999).is_none());
        assert_eq!(get_charset_by_name("latin1").unwrap().id, 8);
        assert_eq!(get_charset_by_name("UTF8MB4_BIN").unwrap().id, 46);
    }

    #[test]
    fn test_pad_space_compare() {
        let cs = &LATIN1_SWEDISH_CI;
        assert_eq!(cs.strnncollsp(b"abc", b"ABC  "), Ordering::Equal);
        assert_eq!(cs.strnncollsp(b"a\x01", b"a"), Ordering::Less);
        assert_eq!(cs.strnncollsp(b"a", b"a\x01"), Ordering::Greater);
        assert_eq!(cs.strnncollsp(b"ab", b"b"), Ordering::Less);
    }

    #[test]
    fn test_binary_compare_uses_length() {
        assert_eq!(BINARY.strnncollsp(b"a", b"a\0"), Ordering::Less);
        assert_eq!(BINARY.strnncollsp(b"a ", b"a"), Ordering::Greater);
    }

    #[test]
    fn test_strnxfrm_matches_compare() {
        let cs = &LATIN1_SWEDISH_CI;
        let mut ka = [0u8; 6];
        let mut kb = [0u8; 6];
        cs.strnxfrm(&mut ka, b"a\x01");
        cs.strnxfrm(&mut kb, b"A");
        assert_eq!(ka.cmp(&kb), cs.strnncollsp(b"a\x01", b"A"));
    }

    #[test]
    fn test_well_formed_utf8() {
        let cs = &UTF8MB4_GENERAL_CI;
        let s = "héllo".as_bytes();
        let wf = cs.well_formed_len(s, 3);
        assert_eq!(wf, WellFormed { len: 4, chars: 3, invalid: false });
        let bad = [b'a', 0xFF, b'b'];
        let wf = cs.well_formed_len(&bad, 10);
        assert_eq!(wf, WellFormed { len: 1, chars: 1, invalid: true });
        assert_eq!(cs.numchars(s), 5);
        assert_eq!(cs.charpos(s, 2), 3);
    }

    #[test]
    fn test_utf8mb3_rejects_four_byte() {
        let emoji = "😀".as_bytes();
        assert!(UTF8_GENERAL_CI.well_formed_len(emoji, 1).invalid);
        assert!(!UTF8MB4_BIN.well_formed_len(emoji, 1).invalid);
    }

    #[test]
    fn test_lengthsp_keeps_binary_bytes() {
        assert_eq!(LATIN1_SWEDISH_CI.lengthsp(b"ab  "), 2);
        assert_eq!(LATIN1_SWEDISH_CI.lengthsp(b"ab\0\0"), 4);
        assert_eq!(BINARY.lengthsp(b"ab\0\0"), 4);
        assert_eq!(BINARY.lengthsp(b"ab  "), 4);
    }

    #[test]
    fn test_important_data() {
        assert!(!test_if_important_data(b"   "));
        assert!(test_if_important_data(b"  x"));
    }
}
