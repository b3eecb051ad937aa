use lamina::{transform, ByteOrder, Layout, LayoutError, PathElement, Segment, Transformer};

fn packet() -> Layout {
    Layout::structure([
        Layout::U8.with_name("kind"),
        Layout::U16.with_byte_order(ByteOrder::Little).with_name("length"),
        Layout::union([
            Layout::sequence(4, Layout::U8).unwrap().with_name("octets"),
            Layout::U32.with_byte_order(ByteOrder::Big).with_name("addr"),
        ])
        .unwrap()
        .with_name("source"),
        Layout::sequence(2, Layout::I64.with_byte_order(ByteOrder::Little))
            .unwrap()
            .with_name("stamps"),
    ])
    .unwrap()
    .with_name("packet")
}

#[test]
fn test_packet_offsets() {
    let layout = packet();
    assert_eq!(layout.byte_offset(&[PathElement::member("length")]).unwrap(), 2);
    assert_eq!(layout.byte_offset(&[PathElement::member("source")]).unwrap(), 4);
    assert_eq!(
        layout
            .byte_offset(&[PathElement::member("source"), PathElement::member("addr")])
            .unwrap(),
        4
    );
    assert_eq!(
        layout
            .byte_offset(&[PathElement::member("stamps"), PathElement::index(1)])
            .unwrap(),
        16
    );
    assert_eq!(layout.byte_size(), 24);
    assert_eq!(layout.byte_alignment(), 8);
    println!("{}", layout);
}

#[test]
fn test_bad_paths() {
    let layout = packet();
    assert!(matches!(
        layout.byte_offset(&[PathElement::member("stamps"), PathElement::index(2)]),
        Err(LayoutError::IndexOutOfRange { index: 2, count: 2, .. })
    ));
    assert!(matches!(
        layout.select(&[PathElement::member("kind"), PathElement::member("x")]),
        Err(LayoutError::PathMismatch { .. })
    ));
}

#[test]
fn test_transform_keeps_names_and_alignment() {
    let layout = packet().with_byte_alignment(16).unwrap();
    let big = transform::with_byte_order(&layout, ByteOrder::Big).unwrap();
    assert_eq!(big.name(), Some("packet"));
    assert_eq!(big.byte_alignment(), 16);
    assert_eq!(big.byte_size(), layout.byte_size());
    assert!(matches!(big.member("source"), Some(Layout::Union(_))));
    assert_eq!(
        big.select(&[PathElement::member("length")]).unwrap(),
        &Layout::U16.with_byte_order(ByteOrder::Big).with_name("length")
    );

    let flatten = Transformer::new()
        .on_sequences(|seq| {
            Ok(Layout::padding(seq.element().byte_size() * seq.count().unwrap_or(0)))
        })
        .on_values(|v| Ok(Layout::Value(v.with_order(ByteOrder::Little))));
    let flattened = packet().transform(&flatten).unwrap();
    // replaced nodes lose their names, rebuilt ancestors keep name and alignment
    assert_eq!(
        flattened.to_string(),
        "8%[u8(kind) u16(length) [x4|u32(addr)](source) x16](packet)"
    );
    assert_eq!(flattened.byte_size(), 24);
}

#[test]
fn test_segment_view_of_packet() {
    let layout = packet();
    let seg = Segment::for_layout(&layout);
    let source = seg.slice(4, 4).unwrap();
    source.write_bytes(0, &[10, 0, 0, 1]).unwrap();
    assert_eq!(seg.get::<u32>(4, ByteOrder::Big).unwrap(), 0x0a00_0001);
    seg.set(16, ByteOrder::Little, -5i64).unwrap();
    let stamps = seg.slice_from(8).unwrap();
    let mut out = [0i64; 2];
    stamps.copy_to(0, ByteOrder::Little, &mut out).unwrap();
    assert_eq!(out, [0, -5]);
    assert!(source.check_access(1, 2, 2).is_err());
}
