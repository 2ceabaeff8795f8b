//! Integration tests for rowfield-utils.
//!
//! These tests lay out tables through `TableSchema`, store values into the
//! record buffers and check the public read, compare, key and copy paths
//! against each other.

use std::cmp::Ordering;

use serde_json::json;

use rowfield::field::charset::{LATIN1_SWEDISH_CI, UTF8MB4_BIN, UTF8MB4_GENERAL_CI};
use rowfield::field::copy::{copy_row, field_conv, CopyField};
use rowfield::field::doc_field::{root_value, DocType};
use rowfield::field::replication::{pack_row, unpack_row, TableMap};
use rowfield::field::schema::{ColumnDef, TableDef, TableSchema};
use rowfield::field::session::{CheckLevel, FieldConfig};
use rowfield::field::status::{ConversionStatus, WarningCode};
use rowfield::field::types::ItemResult;

fn open(columns: Vec<ColumnDef>) -> TableDef {
    TableSchema::new("t", columns).open(FieldConfig::default()).unwrap()
}

fn sort_key(table: &TableDef, idx: usize) -> Vec<u8> {
    let f = &table.fields[idx];
    let mut key = vec![0u8; f.sort_length(table.row.config())];
    f.make_sort_key(&table.row, &mut key);
    key
}

// ---------- Numeric columns ----------

#[test]
fn test_out_of_range_clamps_to_boundary() {
    let mut t = open(vec![ColumnDef::new("a", "tinyint").not_null()]);
    let f = t.fields[0].clone();
    assert_eq!(f.store_int(&mut t.row, 99999, false), ConversionStatus::WarnOutOfRange);
    assert_eq!(f.val_int(&t.row), 127);
    assert_eq!(f.store_int(&mut t.row, -99999, false), ConversionStatus::WarnOutOfRange);
    assert_eq!(f.val_int(&t.row), -128);
    let warnings = t.row.session().warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.code == WarningCode::DataOutOfRange));
    assert_eq!(t.row.session().cuted_fields(), 2);
}

#[test]
fn test_unsigned_rejects_negative() {
    let mut t = open(vec![ColumnDef::new("a", "int unsigned").not_null()]);
    let f = t.fields[0].clone();
    assert_eq!(f.store_str(&mut t.row, b"-5", &LATIN1_SWEDISH_CI), ConversionStatus::WarnOutOfRange);
    assert_eq!(f.val_int(&t.row), 0);
    assert_eq!(f.store_int(&mut t.row, u32::MAX as i64, false), ConversionStatus::Ok);
    assert_eq!(f.val_int(&t.row), u32::MAX as i64);
    assert_eq!(f.store_int(&mut t.row, -1, true), ConversionStatus::WarnOutOfRange);
    assert_eq!(f.val_int(&t.row), u32::MAX as i64);
}

#[test]
fn test_bad_number_text_stores_zero() {
    let mut t = open(vec![ColumnDef::new("a", "int").not_null()]);
    let f = t.fields[0].clone();
    f.store_int(&mut t.row, 9, false);
    assert_eq!(f.store_str(&mut t.row, b"abc", &LATIN1_SWEDISH_CI), ConversionStatus::ErrBadValue);
    assert_eq!(f.val_int(&t.row), 0);
}

#[test]
fn test_decimal_representations_agree() {
    let mut t = open(vec![ColumnDef::new("d", "decimal(6,2)").not_null()]);
    let f = t.fields[0].clone();
    assert_eq!(f.store_str(&mut t.row, b"-12.5", &LATIN1_SWEDISH_CI), ConversionStatus::Ok);
    assert_eq!(f.val_string(&t.row), "-12.50");
    assert_eq!(f.val_int(&t.row), -13);
    assert_eq!(f.val_real(&t.row), -12.5);
    assert_eq!(f.val_decimal(&t.row).to_string(), "-12.50");
    assert_eq!(f.result_type(), ItemResult::Decimal);
}

#[test]
fn test_numeric_sort_keys_follow_cmp() {
    let mut t = open(vec![ColumnDef::new("a", "bigint").not_null()]);
    let f = t.fields[0].clone();
    let values = [i64::MIN, -1, 0, 1, 42, i64::MAX];
    let mut keys = Vec::new();
    for v in values {
        f.store_int(&mut t.row, v, false);
        keys.push(sort_key(&t, 0));
    }
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    f.store_int(&mut t.row, -1, false);
    t.store_record();
    f.store_int(&mut t.row, 1, false);
    assert_eq!(f.cmp_offset(&t.row, t.reclength), Ordering::Greater);
}

// ---------- String columns ----------

#[test]
fn test_char_trailing_spaces_are_a_note() {
    let mut t = open(vec![ColumnDef::new("s", "char(3)").not_null()]);
    let f = t.fields[0].clone();
    assert_eq!(f.store_str(&mut t.row, b"ab   ", &LATIN1_SWEDISH_CI), ConversionStatus::NoteTruncated);
    assert_eq!(f.val_string(&t.row), "ab");
    assert_eq!(f.store_str(&mut t.row, b"abcd", &LATIN1_SWEDISH_CI), ConversionStatus::WarnTruncated);
    assert_eq!(f.val_string(&t.row), "abc");
}

#[test]
fn test_varchar_counts_characters() {
    let mut col = ColumnDef::new("s", "varchar(3)").not_null();
    col.collation = Some("utf8mb4_general_ci".to_string());
    let mut t = open(vec![col]);
    let f = t.fields[0].clone();
    assert_eq!(f.charset(), &UTF8MB4_GENERAL_CI);
    let text = "héllo".as_bytes();
    assert_eq!(f.store_str(&mut t.row, text, &UTF8MB4_BIN), ConversionStatus::WarnTruncated);
    assert_eq!(f.val_string(&t.row), "hél");
    assert_eq!(f.data_length(&t.row), 4);
}

#[test]
fn test_case_insensitive_compare_and_keys() {
    let mut t = open(vec![ColumnDef::new("a", "varchar(10)"), ColumnDef::new("b", "varchar(10)")]);
    let (a, b) = (t.fields[0].clone(), t.fields[1].clone());
    a.set_notnull(&mut t.row);
    b.set_notnull(&mut t.row);
    a.store_str(&mut t.row, b"Hello", &LATIN1_SWEDISH_CI);
    b.store_str(&mut t.row, b"hello ", &LATIN1_SWEDISH_CI);
    assert_eq!(sort_key(&t, 0), sort_key(&t, 1));
}

#[test]
fn test_enum_and_set_values() {
    let mut t = open(vec![
        ColumnDef::new("e", "enum('small','medium','large')").not_null(),
        ColumnDef::new("s", "set('r','w','x')").not_null(),
    ]);
    let (e, s) = (t.fields[0].clone(), t.fields[1].clone());
    assert_eq!(e.store_str(&mut t.row, b"MEDIUM", &LATIN1_SWEDISH_CI), ConversionStatus::Ok);
    assert_eq!(e.val_int(&t.row), 2);
    assert_eq!(e.val_string(&t.row), "medium");
    assert_eq!(e.store_str(&mut t.row, b"huge", &LATIN1_SWEDISH_CI), ConversionStatus::WarnTruncated);
    assert_eq!(e.val_string(&t.row), "");

    assert_eq!(s.store_str(&mut t.row, b"x,r", &LATIN1_SWEDISH_CI), ConversionStatus::Ok);
    assert_eq!(s.val_int(&t.row), 0b101);
    assert_eq!(s.val_string(&t.row), "r,x");
}

#[test]
fn test_blob_values_live_in_arena() {
    let mut t = open(vec![ColumnDef::new("b", "blob"), ColumnDef::new("c", "tinytext")]);
    let (b, c) = (t.fields[0].clone(), t.fields[1].clone());
    b.set_notnull(&mut t.row);
    c.set_notnull(&mut t.row);
    let payload = vec![7u8; 1000];
    assert_eq!(b.store_str(&mut t.row, &payload, &UTF8MB4_BIN), ConversionStatus::Ok);
    assert_eq!(b.val_str(&t.row).as_ref(), payload.as_slice());
    assert_eq!(b.data_length(&t.row), 1000);

    let long = vec![b'z'; 300];
    assert_eq!(c.store_str(&mut t.row, &long, &LATIN1_SWEDISH_CI), ConversionStatus::WarnTruncated);
    assert_eq!(c.data_length(&t.row), 255);
}

// ---------- Temporal columns ----------

#[test]
fn test_temporal_text_forms() {
    let mut t = open(vec![
        ColumnDef::new("d", "date").not_null(),
        ColumnDef::new("dt", "datetime(3)").not_null(),
        ColumnDef::new("tm", "time").not_null(),
    ]);
    let (d, dt, tm) = (t.fields[0].clone(), t.fields[1].clone(), t.fields[2].clone());
    assert_eq!(d.store_str(&mut t.row, b"2024-02-29", &LATIN1_SWEDISH_CI), ConversionStatus::Ok);
    assert_eq!(d.val_int(&t.row), 20240229);
    assert_eq!(d.store_str(&mut t.row, b"2023-02-29", &LATIN1_SWEDISH_CI), ConversionStatus::WarnOutOfRange);
    assert_eq!(d.val_string(&t.row), "0000-00-00");

    assert_eq!(dt.store_str(&mut t.row, b"2024-01-02 03:04:05.5", &LATIN1_SWEDISH_CI), ConversionStatus::Ok);
    assert_eq!(dt.val_string(&t.row), "2024-01-02 03:04:05.500");

    assert_eq!(tm.store_int(&mut t.row, 123456, false), ConversionStatus::Ok);
    assert_eq!(tm.val_string(&t.row), "12:34:56");
}

#[test]
fn test_datetime_from_number() {
    let mut t = open(vec![ColumnDef::new("dt", "datetime").not_null()]);
    let f = t.fields[0].clone();
    assert_eq!(f.store_int(&mut t.row, 20200102030405, false), ConversionStatus::Ok);
    assert_eq!(f.val_string(&t.row), "2020-01-02 03:04:05");
}

// ---------- Copy ----------

#[test]
fn test_copy_row_between_tables() {
    let mut src = open(vec![
        ColumnDef::new("a", "int"),
        ColumnDef::new("b", "varchar(10)"),
        ColumnDef::new("c", "datetime"),
    ]);
    let mut dst = open(vec![
        ColumnDef::new("a", "smallint"),
        ColumnDef::new("b", "char(4)"),
        ColumnDef::new("c", "date"),
    ]);
    let f = src.fields.clone();
    for x in &f {
        x.set_notnull(&mut src.row);
    }
    f[0].store_int(&mut src.row, 70000, false);
    f[1].store_str(&mut src.row, b"abc", &LATIN1_SWEDISH_CI);
    f[2].store_str(&mut src.row, b"2021-06-07 08:09:10", &LATIN1_SWEDISH_CI);

    let copies: Vec<CopyField> = dst
        .fields
        .iter()
        .zip(&src.fields)
        .map(|(to, from)| CopyField::new(to, from))
        .collect();
    let status = copy_row(&copies, &mut dst.row, &src.row);
    assert_eq!(status, ConversionStatus::WarnOutOfRange);
    let g = &dst.fields;
    assert_eq!(g[0].val_int(&dst.row), 32767);
    assert_eq!(g[1].val_string(&dst.row), "abc");
    assert_eq!(g[2].val_string(&dst.row), "2021-06-07");
}

#[test]
fn test_null_copy_respects_check_level() {
    let mut src = open(vec![ColumnDef::new("a", "int")]);
    let config = FieldConfig {
        check_level: CheckLevel::ErrorForNull,
        ..FieldConfig::default()
    };
    let mut dst = TableSchema::new("t", vec![ColumnDef::new("a", "int").not_null()])
        .open(config)
        .unwrap();
    let (from, to) = (src.fields[0].clone(), dst.fields[0].clone());
    from.set_null(&mut src.row);
    assert_eq!(
        field_conv(&to, &mut dst.row, &from, &src.row),
        ConversionStatus::ErrNullConstraintViolation
    );
    assert_eq!(to.val_int(&dst.row), 0);
}

// ---------- Byte order ----------

#[test]
fn test_row_image_crosses_byte_orders() {
    let columns = || {
        vec![
            ColumnDef::new("a", "int").not_null(),
            ColumnDef::new("b", "bigint unsigned").not_null(),
            ColumnDef::new("c", "mediumint").not_null(),
        ]
    };
    let big_endian = FieldConfig {
        low_byte_first: false,
        ..FieldConfig::default()
    };
    let mut src = TableSchema::new("t", columns()).open(big_endian).unwrap();
    let f = src.fields.clone();
    f[0].store_int(&mut src.row, -123456, false);
    f[1].store_int(&mut src.row, u64::MAX as i64, true);
    f[2].store_int(&mut src.row, -8_000_000, false);
    assert_eq!(src.row.slice(f[0].ptr, 4), (-123456i32).to_be_bytes());

    let map = TableMap::from_table(&src);
    let image = pack_row(&f, &src.row);
    let mut dst = open(columns());
    let g = dst.fields.clone();
    let out = unpack_row(&map, &g, &mut dst.row, &image).unwrap();
    assert_eq!(out.status, ConversionStatus::Ok);
    assert_eq!(dst.row.slice(g[0].ptr, 4), (-123456i32).to_le_bytes());
    assert_eq!(g[0].val_int(&dst.row), -123456);
    assert_eq!(g[1].val_int(&dst.row) as u64, u64::MAX);
    assert_eq!(g[2].val_int(&dst.row), -8_000_000);
}

// ---------- Document paths ----------

#[test]
fn test_document_path_reads_and_updates() {
    let mut t = open(vec![ColumnDef::new("id", "int").not_null(), ColumnDef::new("doc", "json")]);
    let root = t.fields[1].clone();
    root.set_notnull(&mut t.row);
    let text = br#"{"user": {"name": "ann", "age": 41}, "tags": [1, 2]}"#;
    assert_eq!(root.store_str(&mut t.row, text, &UTF8MB4_BIN), ConversionStatus::Ok);

    let age = t.doc_path("doc", "user.age", DocType::Int, 8).unwrap();
    assert_eq!(age.val_int(&root, &t.row), Some(41));
    assert_eq!(age.full_name(&root), "`doc`.`user`.`age`");

    let missing = t.doc_path("doc", "user.email", DocType::Document, 0).unwrap();
    assert!(missing.is_null(&root, &t.row));
    assert_eq!(missing.store_json(&root, &mut t.row, br#""a@b.c""#), ConversionStatus::Ok);
    assert_eq!(missing.val_document(&root, &t.row), Some(json!("a@b.c")));

    let tag = t.doc_path("doc", "tags[0]", DocType::Document, 0).unwrap();
    assert_eq!(tag.delete(&root, &mut t.row), ConversionStatus::Ok);
    assert_eq!(
        root_value(&root, &t.row).unwrap(),
        json!({"user": {"name": "ann", "age": 41, "email": "a@b.c"}, "tags": [2]})
    );
    assert!(t.doc_path("id", "x", DocType::Document, 0).is_err());
}

// ---------- Defaults ----------

#[test]
fn test_restore_defaults_after_changes() {
    let mut t = open(vec![
        ColumnDef::new("n", "int").not_null().with_default("5"),
        ColumnDef::new("s", "varchar(8)").with_default("x"),
    ]);
    let fields = t.fields.clone();
    assert_eq!(fields[0].val_int(&t.row), 5);
    assert_eq!(fields[1].val_string(&t.row), "x");

    fields[0].store_int(&mut t.row, 8, false);
    fields[1].set_null(&mut t.row);
    t.set_defaults();
    assert_eq!(fields[0].val_int(&t.row), 5);
    assert!(!fields[1].is_null(&t.row));
    assert_eq!(fields[1].val_string(&t.row), "x");
}
