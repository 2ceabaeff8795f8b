//! Column type catalogue: type codes, flags and size helpers.
//!
//! Type codes follow the server's `enum_field_types` numbering, which is also
//! what the replication table map carries for each column.

use std::convert::TryFrom;

use crate::FieldError;

/// Physical column type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    Varchar,
    Bit,
    Timestamp2,
    DateTime2,
    Time2,
    Document,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
}

impl FieldType {
    pub fn code(self) -> u8 {
        match self {
            FieldType::Decimal => 0x00,
            FieldType::Tiny => 0x01,
            FieldType::Short => 0x02,
            FieldType::Long => 0x03,
            FieldType::Float => 0x04,
            FieldType::Double => 0x05,
            FieldType::Null => 0x06,
            FieldType::Timestamp => 0x07,
            FieldType::LongLong => 0x08,
            FieldType::Int24 => 0x09,
            FieldType::Date => 0x0a,
            FieldType::Time => 0x0b,
            FieldType::DateTime => 0x0c,
            FieldType::Year => 0x0d,
            FieldType::NewDate => 0x0e,
            FieldType::Varchar => 0x0f,
            FieldType::Bit => 0x10,
            FieldType::Timestamp2 => 0x11,
            FieldType::DateTime2 => 0x12,
            FieldType::Time2 => 0x13,
            FieldType::Document => 0xf5,
            FieldType::NewDecimal => 0xf6,
            FieldType::Enum => 0xf7,
            FieldType::Set => 0xf8,
            FieldType::TinyBlob => 0xf9,
            FieldType::MediumBlob => 0xfa,
            FieldType::LongBlob => 0xfb,
            FieldType::Blob => 0xfc,
            FieldType::VarString => 0xfd,
            FieldType::String => 0xfe,
            FieldType::Geometry => 0xff,
        }
    }

    /// True for every date/time type, legacy and fractional.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FieldType::Date
                | FieldType::NewDate
                | FieldType::Time
                | FieldType::Time2
                | FieldType::DateTime
                | FieldType::DateTime2
                | FieldType::Timestamp
                | FieldType::Timestamp2
        )
    }

    pub fn is_temporal_with_date(self) -> bool {
        self.is_temporal() && !matches!(self, FieldType::Time | FieldType::Time2)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Tiny
                | FieldType::Short
                | FieldType::Int24
                | FieldType::Long
                | FieldType::LongLong
                | FieldType::Year
        )
    }

    pub fn is_blob(self) -> bool {
        matches!(
            self,
            FieldType::TinyBlob
                | FieldType::MediumBlob
                | FieldType::LongBlob
                | FieldType::Blob
                | FieldType::Geometry
                | FieldType::Document
        )
    }

    /// Number of metadata bytes a column of this type carries in a table map.
    pub fn metadata_len(self) -> usize {
        match self {
            FieldType::Float
            | FieldType::Double
            | FieldType::TinyBlob
            | FieldType::MediumBlob
            | FieldType::LongBlob
            | FieldType::Blob
            | FieldType::Geometry
            | FieldType::Document
            | FieldType::Time2
            | FieldType::DateTime2
            | FieldType::Timestamp2 => 1,
            FieldType::Varchar
            | FieldType::VarString
            | FieldType::Bit
            | FieldType::NewDecimal
            | FieldType::String
            | FieldType::Enum
            | FieldType::Set => 2,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for FieldType {
    type Error = FieldError;

    fn try_from(code: u8) -> Result<Self, FieldError> {
        let ft = match code {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0a => FieldType::Date,
            0x0b => FieldType::Time,
            0x0c => FieldType::DateTime,
            0x0d => FieldType::Year,
            0x0e => FieldType::NewDate,
            0x0f => FieldType::Varchar,
            0x10 => FieldType::Bit,
            0x11 => FieldType::Timestamp2,
            0x12 => FieldType::DateTime2,
            0x13 => FieldType::Time2,
            0xf5 => FieldType::Document,
            0xf6 => FieldType::NewDecimal,
            0xf7 => FieldType::Enum,
            0xf8 => FieldType::Set,
            0xf9 => FieldType::TinyBlob,
            0xfa => FieldType::MediumBlob,
            0xfb => FieldType::LongBlob,
            0xfc => FieldType::Blob,
            0xfd => FieldType::VarString,
            0xfe => FieldType::String,
            0xff => FieldType::Geometry,
            _ => {
                return Err(FieldError::Parse(format!(
                    "invalid column type code: {}",
                    code
                )))
            }
        };
        Ok(ft)
    }
}

/// Result class used to pick a conversion path between two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemResult {
    String,
    Real,
    Int,
    Decimal,
}

/// Index key encoding class of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Binary,
    Text,
    Int8,
    UInt8,
    ShortInt,
    UShortInt,
    Int24,
    UInt24,
    LongInt,
    ULongInt,
    LongLong,
    ULongLong,
    Float,
    Double,
    Num,
    Bit,
    VarBinary1,
    VarText1,
    VarBinary2,
    VarText2,
}

/// Column attribute flags.
pub mod flags {
    pub const NOT_NULL: u32 = 1;
    pub const PRI_KEY: u32 = 2;
    pub const UNIQUE_KEY: u32 = 4;
    pub const MULTIPLE_KEY: u32 = 8;
    pub const BLOB: u32 = 16;
    pub const UNSIGNED: u32 = 32;
    pub const ZEROFILL: u32 = 64;
    pub const BINARY: u32 = 128;
    pub const ENUM: u32 = 256;
    pub const AUTO_INCREMENT: u32 = 512;
    pub const TIMESTAMP: u32 = 1024;
    pub const SET: u32 = 2048;
    pub const NO_DEFAULT_VALUE: u32 = 4096;
    pub const ON_UPDATE_NOW: u32 = 8192;
}

/// Automatic initialisation behaviour of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoInit {
    #[default]
    None,
    DefaultNow,
    OnUpdateNow,
    DefaultAndOnUpdateNow,
    NextNumber,
}

impl AutoInit {
    pub fn has_insert_default_function(self) -> bool {
        matches!(self, AutoInit::DefaultNow | AutoInit::DefaultAndOnUpdateNow)
    }

    pub fn has_update_default_function(self) -> bool {
        matches!(self, AutoInit::OnUpdateNow | AutoInit::DefaultAndOnUpdateNow)
    }
}

/// Index participation bitmaps; bit `n` refers to key number `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMaps {
    pub key_start: u64,
    pub part_of_key: u64,
    pub part_of_sortkey: u64,
}

/// Scale marker meaning "not fixed" for floating point columns.
pub const NOT_FIXED_DEC: u8 = 31;
/// Largest number of fractional-seconds digits.
pub const DATETIME_MAX_DECIMALS: u8 = 6;
/// Largest precision of a fixed-point column.
pub const DECIMAL_MAX_PRECISION: u8 = 65;
/// Largest scale of a fixed-point column.
pub const DECIMAL_MAX_SCALE: u8 = 30;
/// Size of the out-of-line handle stored after a blob length.
pub const BLOB_HANDLE_BYTES: usize = 8;
/// Length prefix width used for string keys built from document paths.
pub const KEY_BLOB_LENGTH: usize = 2;

/// Storage width of an ENUM with `elements` values.
pub fn get_enum_pack_length(elements: usize) -> usize {
    if elements < 256 {
        1
    } else {
        2
    }
}

/// Storage width of a SET with `elements` members.
pub fn get_set_pack_length(elements: usize) -> usize {
    let len = (elements + 7) / 8;
    if len > 4 {
        8
    } else {
        len
    }
}

/// Bytes used by `dec` fractional-second digits in the binary temporal forms.
pub fn fsp_storage_bytes(dec: u8) -> usize {
    ((dec as usize) + 1) / 2
}

/// Length-prefix width of a blob type.
pub fn blob_pack_length(ft: FieldType) -> usize {
    match ft {
        FieldType::TinyBlob => 1,
        FieldType::Blob => 2,
        FieldType::MediumBlob | FieldType::Document => 3,
        _ => 4,
    }
}

/// Blob type holding at most `max_bytes` bytes.
pub fn blob_type_for_length(max_bytes: u64) -> FieldType {
    if max_bytes <= 255 {
        FieldType::TinyBlob
    } else if max_bytes <= 65_535 {
        FieldType::Blob
    } else if max_bytes <= 16_777_215 {
        FieldType::MediumBlob
    } else {
        FieldType::LongBlob
    }
}

/// Record footprint of a column of type `ft` with display length `length`.
///
/// ENUM, SET and NEWDECIMAL need more than a length and report 0. Fractional
/// temporal types derive their precision from the display width.
pub fn calc_pack_length(ft: FieldType, length: u32) -> usize {
    const TIME_WIDTH: u32 = 10;
    const DATETIME_WIDTH: u32 = 19;
    let length_usize = length as usize;
    match ft {
        FieldType::VarString | FieldType::String | FieldType::Decimal => length_usize,
        FieldType::Varchar => length_usize + if length < 256 { 1 } else { 2 },
        FieldType::Year | FieldType::Tiny => 1,
        FieldType::Short => 2,
        FieldType::Int24 | FieldType::NewDate | FieldType::Time => 3,
        FieldType::Time2 => 3 + (length.saturating_sub(TIME_WIDTH) as usize) / 2,
        FieldType::Timestamp | FieldType::Date | FieldType::Long | FieldType::Float => 4,
        FieldType::Timestamp2 => 4 + (length.saturating_sub(DATETIME_WIDTH) as usize) / 2,
        FieldType::DateTime2 => 5 + (length.saturating_sub(DATETIME_WIDTH) as usize) / 2,
        FieldType::Double | FieldType::DateTime | FieldType::LongLong => 8,
        FieldType::Null => 0,
        FieldType::TinyBlob
        | FieldType::Blob
        | FieldType::MediumBlob
        | FieldType::LongBlob
        | FieldType::Geometry
        | FieldType::Document => blob_pack_length(ft) + BLOB_HANDLE_BYTES,
        FieldType::Bit => length_usize / 8,
        FieldType::Enum | FieldType::Set | FieldType::NewDecimal => 0,
    }
}

/// Convert the table-map metadata bytes of one column into the `param_data`
/// word that `unpack` expects.
///
/// Returns the decoded word and the number of metadata bytes consumed.
pub fn metadata_to_param(ft: FieldType, metadata: &[u8]) -> Result<(u32, usize), FieldError> {
    let need = ft.metadata_len();
    if metadata.len() < need {
        return Err(FieldError::Parse(format!(
            "metadata for column type {:?} needs {} bytes, got {}",
            ft,
            need,
            metadata.len()
        )));
    }
    let param = match need {
        0 => 0,
        1 => metadata[0] as u32,
        _ => match ft {
            // Little-endian length word.
            FieldType::Varchar | FieldType::VarString | FieldType::Bit => {
                metadata[0] as u32 | ((metadata[1] as u32) << 8)
            }
            // (precision, scale) and (real_type, length) pairs.
            _ => ((metadata[0] as u32) << 8) | metadata[1] as u32,
        },
    };
    Ok((param, need))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_round_trip_known_codes() {
        for code in [0x00u8, 0x03, 0x0e, 0x0f, 0x13, 0xf5, 0xf6, 0xf8, 0xfc, 0xfe, 0xff] {
            let ft = FieldType::try_from(code).unwrap();
            assert_eq!(ft.code(), code);
        }
        assert!(FieldType::try_from(0x40).is_err());
    }

    #[test]
    fn test_calc_pack_length() {
        assert_eq!(calc_pack_length(FieldType::Varchar, 255), 256);
        assert_eq!(calc_pack_length(FieldType::Varchar, 256), 258);
        assert_eq!(calc_pack_length(FieldType::DateTime2, 19), 5);
        // datetime(3) displays as 23 characters
        assert_eq!(calc_pack_length(FieldType::DateTime2, 23), 7);
        assert_eq!(calc_pack_length(FieldType::Time2, 17), 6);
        assert_eq!(calc_pack_length(FieldType::Bit, 10), 1);
        assert_eq!(calc_pack_length(FieldType::MediumBlob, 0), 3 + BLOB_HANDLE_BYTES);
        assert_eq!(calc_pack_length(FieldType::Enum, 1), 0);
    }

    #[test]
    fn test_enum_pack_length() {
        assert_eq!(get_enum_pack_length(1), 1);
        assert_eq!(get_enum_pack_length(255), 1);
        assert_eq!(get_enum_pack_length(256), 2);
    }

    #[test]
    fn test_set_pack_length() {
        assert_eq!(get_set_pack_length(1), 1);
        assert_eq!(get_set_pack_length(8), 1);
        assert_eq!(get_set_pack_length(9), 2);
        assert_eq!(get_set_pack_length(24), 3);
        assert_eq!(get_set_pack_length(32), 4);
        assert_eq!(get_set_pack_length(33), 8);
        assert_eq!(get_set_pack_length(64), 8);
    }

    #[test]
    fn test_fsp_storage_bytes() {
        assert_eq!(fsp_storage_bytes(0), 0);
        assert_eq!(fsp_storage_bytes(1), 1);
        assert_eq!(fsp_storage_bytes(2), 1);
        assert_eq!(fsp_storage_bytes(3), 2);
        assert_eq!(fsp_storage_bytes(4), 2);
        assert_eq!(fsp_storage_bytes(5), 3);
        assert_eq!(fsp_storage_bytes(6), 3);
    }

    #[test]
    fn test_metadata_to_param() {
        assert_eq!(metadata_to_param(FieldType::Long, &[]).unwrap(), (0, 0));
        assert_eq!(metadata_to_param(FieldType::Double, &[8]).unwrap(), (8, 1));
        assert_eq!(
            metadata_to_param(FieldType::Varchar, &[0x2c, 0x01]).unwrap(),
            (300, 2)
        );
        assert_eq!(
            metadata_to_param(FieldType::NewDecimal, &[10, 2]).unwrap(),
            ((10 << 8) | 2, 2)
        );
        assert!(metadata_to_param(FieldType::Bit, &[1]).is_err());
    }
}
