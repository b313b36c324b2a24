use super::*;
use crate::ErrorKind;

#[test]
fn load_accepts_all_separator_forms() {
    let p = Properties::load("a=1\nb:2\nc 3\nd = 4\ne\t:\t5\nf\n").unwrap();

    assert_eq!(p.get("a"), Some("1"));
    assert_eq!(p.get("b"), Some("2"));
    assert_eq!(p.get("c"), Some("3"));
    assert_eq!(p.get("d"), Some("4"));
    assert_eq!(p.get("e"), Some("5"));
    assert_eq!(p.get("f"), Some(""));
    assert_eq!(p.len(), 6);
}

#[test]
fn load_skips_comments_and_blank_lines() {
    let text = "# comment\n! also comment\n\n   \n  key = value  \r\n";
    let p = Properties::load(text).unwrap();

    assert_eq!(p.len(), 1);
    assert_eq!(p.get("key"), Some("value  "));
}

#[test]
fn load_joins_continuation_lines() {
    let text = "fruits = apple, banana, \\\n    pear, \\\n    cantaloupe\nnext=1\n";
    let p = Properties::load(text).unwrap();

    assert_eq!(p.get("fruits"), Some("apple, banana, pear, cantaloupe"));
    assert_eq!(p.get("next"), Some("1"));
}

#[test]
fn load_keeps_escaped_trailing_backslash() {
    let p = Properties::load("path=C:\\\\dir\\\\\nnext=1\n").unwrap();
    assert_eq!(p.get("path"), Some("C:\\dir\\"));
    assert_eq!(p.get("next"), Some("1"));
}

#[test]
fn load_decodes_escapes() {
    let p = Properties::load("key\\ with\\:sep=tab\\there\\u00e9\\n").unwrap();
    assert_eq!(p.get("key with:sep"), Some("tab\there\u{e9}\n"));
}

#[test]
fn load_rejects_malformed_unicode_escape() {
    let e = Properties::load("ok=1\nbad=\\u12").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Serialization);
    assert!(e.to_string().contains("line 2"), "{e}");
}

#[test]
fn store_writes_header_and_escapes() {
    let p: Properties = vec![(" lead", " v=1"), ("k:#", "a\\b\nc")].into_iter().collect();
    let text = p.store();

    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("#Serialized by ZKClient -- PropertiesSerializer"));
    assert_eq!(lines.next(), Some("\\ lead=\\ v\\=1"));
    assert_eq!(lines.next(), Some("k\\:\\#=a\\\\b\\nc"));
    assert_eq!(lines.next(), None);
}

#[test]
fn store_keeps_non_ascii_raw() {
    let p: Properties = vec![("名字", "配置")].into_iter().collect();
    assert!(p.store().contains("名字=配置"));
}

#[test]
fn serializer_round_trips_keys_and_values() {
    let mut p = Properties::new();
    p.set("DEV.zookeeper.server", "127.0.0.1:2181,127.0.0.2:2181");
    p.set("spaces in key", "  leading spaces");
    p.set("unicode", "héllo 配置");
    p.set("control", "a\u{1}b\tc");
    p.set("empty", "");

    let bytes = PropertiesSerializer.serialize(&p).unwrap();
    let back = PropertiesSerializer.deserialize(&bytes).unwrap();
    assert_eq!(back, p);
}

#[test]
fn serializer_decodes_empty_buffer_as_empty_bag() {
    let p = PropertiesSerializer.deserialize(&[]).unwrap();
    assert!(p.is_empty());
}

#[test]
fn set_and_remove_return_previous_values() {
    let mut p = Properties::new();
    assert_eq!(p.set("a", "1"), None);
    assert_eq!(p.set("a", "2"), Some("1".to_string()));
    assert!(p.contains_key("a"));
    assert_eq!(p.remove("a"), Some("2".to_string()));
    assert!(p.is_empty());
}
