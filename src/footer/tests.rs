use super::*;
use crate::block::BlockHandle;

#[test]
fn round_trip() {
    let mut writer = FooterBlockWriter::new();
    writer.add(BlockHandle::new(10, 20), BlockHandle::new(100, 200));
    let bytes = writer.finalize().unwrap();
    assert_eq!(bytes.len(), FOOTER_SIZE);

    let reader = FooterBlockReader::parse(&bytes).unwrap();
    assert_eq!(reader.meta_handle(), BlockHandle::new(10, 20));
    assert_eq!(reader.index_handle(), BlockHandle::new(100, 200));
}

#[test]
fn finalize_fails_without_add() {
    let writer = FooterBlockWriter::new();
    assert!(writer.finalize().is_err());
}

#[test]
fn parse_rejects_wrong_size() {
    assert!(FooterBlockReader::parse(&[0u8; 10]).is_err());
    assert!(FooterBlockReader::parse(&[0u8; FOOTER_SIZE + 1]).is_err());
}

#[test]
fn parse_rejects_bad_magic() {
    let mut writer = FooterBlockWriter::new();
    writer.add(BlockHandle::new(1, 2), BlockHandle::new(3, 4));
    let mut bytes = writer.finalize().unwrap();
    bytes[FOOTER_SIZE - 1] = 0xff;
    assert!(FooterBlockReader::parse(&bytes).is_err());
}
