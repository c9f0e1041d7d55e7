use super::*;
use crate::record::Record;

fn sample() -> Record {
    Record {
        id: Id::generate(),
        values: vec![1.0, 2.0, 3.0],
        original_text: "alpha".to_string(),
        tags: vec![7, -3],
        attributes: Attributes {
            priority: -1,
            user_id: 42,
            org_id: 7,
        },
    }
}

#[test]
fn test_round_trip() {
    let record = sample();
    let blob = encode(&record);
    let decoded = decode(&blob).unwrap();
    assert_eq!(decoded.id, record.id);
    assert!(decoded.values_eq(&record));
    assert_eq!(decoded.original_text, record.original_text);
    assert_eq!(decoded.tags, record.tags);
    assert_eq!(decoded.attributes, record.attributes);
}

#[test]
fn test_encode_decode_is_byte_identical() {
    let record = sample();
    let blob = encode(&record);
    let re_encoded = encode(&decode(&blob).unwrap());
    assert_eq!(blob, re_encoded);
}

#[test]
fn test_empty_text_and_tags() {
    let record = Record::new(vec![0.0; 8]);
    let blob = encode(&record);
    let decoded = decode(&blob).unwrap();
    assert_eq!(decoded.original_text, "");
    assert!(decoded.tags.is_empty());
}

#[test]
fn test_decode_rejects_truncated_blob() {
    let record = sample();
    let mut blob = encode(&record);
    blob.truncate(blob.len() - 1);
    assert!(decode(&blob).is_err());
}

#[test]
fn test_decode_rejects_trailing_garbage() {
    let record = sample();
    let mut blob = encode(&record);
    blob.push(0xFF);
    assert!(decode(&blob).is_err());
}

#[test]
fn test_decode_rejects_invalid_utf8() {
    let record = sample();
    let mut blob = encode(&record);
    // text_len_u32 starts at byte 16; corrupt the first text byte.
    blob[20] = 0xFF;
    assert!(decode(&blob).is_err());
}
