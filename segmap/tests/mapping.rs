use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use segmap::lamina::{transform, ByteOrder, Layout, PathElement, Segment};
use segmap::{AccessError, Mapper, MappingError, Registry, Views};

segmap::record! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Point {
        pub x: i32,
        pub y: i32,
    }
}

segmap::record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Line {
        pub begin: Point,
        pub end: Point,
    }
}

segmap::record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Ip {
        pub octets: [u8; 4],
        pub value: u32,
    }
}

segmap::record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Timed {
        pub at: Duration,
        pub id: u32,
    }
}

segmap::record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Flags {
        pub bits: Vec<bool>,
    }
}

fn point_layout() -> Layout {
    Layout::structure([Layout::I32.with_name("x"), Layout::I32.with_name("y")]).unwrap()
}

fn ints(values: &[i32]) -> Segment {
    let seg = Segment::allocate(values.len() * 4);
    for (ix, value) in values.iter().enumerate() {
        seg.set(ix * 4, ByteOrder::NATIVE, *value).unwrap();
    }
    seg
}

fn read_ints(seg: &Segment) -> Vec<i32> {
    let mut out = vec![0; seg.len() / 4];
    seg.copy_to(0, ByteOrder::NATIVE, &mut out).unwrap();
    out
}

#[test]
fn test_point() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let seg = ints(&[3, 4, 6, 0, 0, 0]);
    assert_eq!(mapper.get(&seg, 0).unwrap(), Point { x: 3, y: 4 });
    assert_eq!(mapper.get_at_index(&seg, 1).unwrap(), Point { x: 6, y: 0 });

    let out = Segment::for_layout(mapper.layout());
    mapper.set(&out, 0, &Point { x: 3, y: 4 }).unwrap();
    assert_eq!(read_ints(&out), vec![3, 4]);
}

#[test]
fn test_line() {
    let layout = Layout::structure([
        point_layout().with_name("begin"),
        point_layout().with_name("end"),
    ])
    .unwrap();
    let mapper = Mapper::<Line>::new(&layout).unwrap();
    let seg = ints(&[3, 4, 6, 0, 0, 0]);
    let line = mapper.get(&seg, 0).unwrap();
    assert_eq!(line, Line { begin: Point { x: 3, y: 4 }, end: Point { x: 6, y: 0 } });

    let line = Line { begin: Point { x: -1, y: 7 }, end: Point { x: 9, y: 11 } };
    let seg = Segment::allocate(16);
    mapper.set(&seg, 0, &line).unwrap();
    assert_eq!(read_ints(&seg), vec![-1, 7, 9, 11]);
    assert_eq!(mapper.get(&seg, 0).unwrap(), line);
}

#[test]
fn test_index_scaling() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let seg = ints(&[1, 2, 3, 4, 5, 6, 7, 8]);
    for index in 0..4 {
        assert_eq!(
            mapper.get_at_index(&seg, index).unwrap(),
            mapper.get(&seg, index * mapper.layout().byte_size()).unwrap()
        );
    }
    mapper.set_at_index(&seg, 3, &Point { x: 0, y: 0 }).unwrap();
    assert_eq!(read_ints(&seg), vec![1, 2, 3, 4, 5, 6, 0, 0]);
    assert!(matches!(mapper.get_at_index(&seg, 4), Err(AccessError::OutOfBounds { .. })));
}

#[test]
fn test_bounds_and_alignment() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let seg = Segment::allocate(12);
    assert!(mapper.get(&seg, 4).is_ok());
    assert_eq!(
        mapper.get(&seg, 8).unwrap_err(),
        AccessError::OutOfBounds { offset: 8, size: 8, len: 12 }
    );
    assert_eq!(
        mapper.set(&seg, 2, &Point { x: 1, y: 1 }).unwrap_err(),
        AccessError::Misaligned { offset: 2, alignment: 4 }
    );
    assert_eq!(seg.to_vec(), vec![0; 12]);
}

#[test]
fn test_struct_offsets() {
    let layout = Layout::structure([Layout::I32.with_name("a"), Layout::I64.with_name("b")]).unwrap();
    assert_eq!(layout.byte_offset(&[PathElement::member("b")]).unwrap(), 8);
    assert_eq!(layout.byte_size(), 16);
    assert_eq!(layout.byte_alignment(), 8);
}

#[test]
fn test_composite_size_is_extent() {
    segmap::record! {
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Tagged {
            value: i64,
            tag: i8,
        }
    }

    let layout = Layout::structure([Layout::I64.with_name("value"), Layout::I8.with_name("tag")])
        .unwrap();
    let mapper = Mapper::<Tagged>::new(&layout).unwrap();
    assert_eq!(mapper.layout().byte_size(), 9);
    let seg = Segment::for_layout(mapper.layout());
    assert_eq!(seg.len(), 9);
    let value = Tagged { value: -3, tag: 5 };
    mapper.set(&seg, 0, &value).unwrap();
    assert_eq!(mapper.get(&seg, 0).unwrap(), value);

    let union = Layout::union([
        Layout::I32.with_name("a"),
        Layout::sequence(3, Layout::I16).unwrap().with_name("b"),
    ])
    .unwrap();
    assert_eq!(union.byte_size(), 6);
    assert_eq!(union.byte_alignment(), 4);
}

#[test]
fn test_union_overlap() {
    let layout = Layout::union([Layout::I32.with_name("x"), Layout::I32.with_name("y")]).unwrap();
    assert_eq!(layout.byte_size(), 4);
    let mapper = Mapper::<Point>::new(&layout).unwrap();
    let seg = Segment::allocate(4);
    mapper.set(&seg, 0, &Point { x: 1, y: 77 }).unwrap();
    // the last component written wins
    assert_eq!(mapper.get(&seg, 0).unwrap(), Point { x: 77, y: 77 });
}

#[test]
fn test_union_arms() {
    let root = Layout::union([
        Layout::sequence(4, Layout::U8).unwrap().with_name("octets"),
        Layout::U32.with_byte_order(ByteOrder::Big).with_name("value"),
    ])
    .unwrap();
    let seg = Segment::from_bytes(&[127, 0, 0, 1]);

    let octets = Mapper::<[u8; 4]>::at_path(&root, &[PathElement::member("octets")]).unwrap();
    let value = Mapper::<u32>::at_path(&root, &[PathElement::member("value")]).unwrap();
    assert_eq!(octets.get(&seg, 0).unwrap(), [127, 0, 0, 1]);
    assert_eq!(value.get(&seg, 0).unwrap(), 0x7f00_0001);

    let both = Mapper::<Ip>::new(&root).unwrap();
    assert_eq!(both.get(&seg, 0).unwrap(), Ip { octets: [127, 0, 0, 1], value: 0x7f00_0001 });

    value.set(&seg, 0, &0x0a00_0002).unwrap();
    assert_eq!(octets.get(&seg, 0).unwrap(), [10, 0, 0, 2]);
}

#[test]
fn test_path_into_struct() {
    let root = Layout::structure([
        Layout::U64.with_name("header"),
        Layout::sequence(3, point_layout()).unwrap().with_name("points"),
    ])
    .unwrap();
    let path = [PathElement::member("points"), PathElement::index(2)];
    let third = Mapper::<Point>::at_path(&root, &path).unwrap();
    assert_eq!(third.layout(), &root);

    let seg = Segment::for_layout(&root);
    third.set(&seg, 0, &Point { x: 5, y: 6 }).unwrap();
    assert_eq!(seg.get::<i32>(24, ByteOrder::NATIVE).unwrap(), 5);
    assert_eq!(seg.get::<i32>(28, ByteOrder::NATIVE).unwrap(), 6);

    let points = Mapper::<Vec<Point>>::at_path(&root, &[PathElement::member("points")]).unwrap();
    assert_eq!(points.get(&seg, 0).unwrap()[2], Point { x: 5, y: 6 });

    assert!(matches!(
        Mapper::<Point>::at_path(&root, &[PathElement::member("nope")]),
        Err(MappingError::Layout(_))
    ));
}

#[test]
fn test_byte_order_transform() {
    let little = Layout::structure([
        Layout::I32.with_byte_order(ByteOrder::Little).with_name("x"),
        Layout::I32.with_byte_order(ByteOrder::Little).with_name("y"),
    ])
    .unwrap();
    let big = transform::with_byte_order(&little, ByteOrder::Big).unwrap();
    assert_eq!(little.to_string(), "[i32(x) i32(y)]");
    assert_eq!(big.to_string(), "[I32(x) I32(y)]");
    assert_eq!(big.to_string().to_lowercase(), little.to_string());
    assert_eq!(big.byte_size(), little.byte_size());

    let seg = Segment::from_bytes(&[1, 0, 0, 0, 2, 0, 0, 0]);
    let from_little = Mapper::<Point>::new(&little).unwrap().get(&seg, 0).unwrap();
    let from_big = Mapper::<Point>::new(&big).unwrap().get(&seg, 0).unwrap();
    assert_eq!(from_little, Point { x: 1, y: 2 });
    assert_eq!(from_big, Point { x: 0x0100_0000, y: 0x0200_0000 });
}

#[test]
fn test_dimension_mismatch_before_access() {
    segmap::record! {
        struct Grid {
            cells: Vec<i32>,
        }
    }

    let layout = Layout::structure([Layout::sequence(
        2,
        Layout::sequence(3, Layout::I32).unwrap(),
    )
    .unwrap()
    .with_name("cells")])
    .unwrap();
    match Mapper::<Grid>::new(&layout) {
        Err(MappingError::DimensionMismatch { site, depth, dimensions, .. }) => {
            assert_eq!(site, "Grid.cells");
            assert_eq!((depth, dimensions), (1, 2));
        }
        other => panic!("unexpected {:?}", other.err()),
    }
}

#[test]
fn test_direct_self_reference() {
    segmap::record! {
        struct Node {
            kids: Vec<Node>,
        }
    }

    let layout = Layout::structure([Layout::sequence(1, Layout::structure([Layout::I32]).unwrap())
        .unwrap()
        .with_name("kids")])
    .unwrap();
    match Mapper::<Node>::new(&layout) {
        Err(MappingError::SelfReference { type_name, via }) => {
            assert_eq!(type_name, "Node");
            assert_eq!(via, "Node.kids: Vec<Node>");
        }
        other => panic!("unexpected {:?}", other.err()),
    }
}

#[test]
fn test_indirect_cycle() {
    segmap::record! {
        struct A {
            bs: Vec<B>,
        }
    }

    segmap::record! {
        struct B {
            a: A,
        }
    }

    let inner = Layout::structure([Layout::I32.with_name("bs")]).unwrap().with_name("a");
    let b = Layout::structure([inner]).unwrap();
    let layout =
        Layout::structure([Layout::sequence(2, b).unwrap().with_name("bs")]).unwrap();
    match Mapper::<A>::new(&layout) {
        Err(MappingError::SelfReference { type_name, via }) => {
            assert_eq!(type_name, "A");
            assert_eq!(via, "A -> Vec<B> -> B -> A");
        }
        other => panic!("unexpected {:?}", other.err()),
    }
}

#[test]
fn test_bool_arrays_refused() {
    let layout = Layout::structure([Layout::sequence(8, Layout::BOOL).unwrap().with_name("bits")])
        .unwrap();
    let err = Mapper::<Flags>::new(&layout).unwrap_err();
    println!("{}", err);
    assert!(matches!(err, MappingError::UnsupportedElementKind { .. }));
}

#[test]
fn test_missing_mapping_message() {
    let layout = Layout::structure([Layout::I32.with_name("x")]).unwrap().with_name("half");
    let err = Mapper::<Point>::new(&layout).unwrap_err();
    assert_eq!(err.to_string(), format!("no mapping for Point.y in layout {}", layout));
}

#[test]
fn test_stream_and_page() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let seg = ints(&[0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    let xs: Vec<i32> = mapper.stream(&seg).unwrap().map(|p| p.unwrap().x).collect();
    assert_eq!(xs, vec![0, 1, 2, 3, 4]);
    // a second stream starts over
    assert_eq!(mapper.stream(&seg).unwrap().count(), 5);

    let page: Vec<Point> = mapper.page(&seg, 2, 1).unwrap().map(Result::unwrap).collect();
    assert_eq!(page, vec![Point { x: 2, y: 2 }, Point { x: 3, y: 3 }]);
    assert_eq!(mapper.page(&seg, 2, 2).unwrap().count(), 1);

    let ragged = Segment::allocate(12);
    assert_eq!(
        mapper.stream(&ragged).err(),
        Some(AccessError::NotAMultiple { len: 12, size: 8 })
    );
}

#[test]
fn test_derived_mappers() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let pairs = mapper.map(|p| (p.x, p.y), |&(x, y)| Point { x, y });
    let seg = Segment::allocate(8);
    pairs.set(&seg, 0, &(10, 20)).unwrap();
    assert_eq!(pairs.get(&seg, 0).unwrap(), (10, 20));
    assert_eq!(mapper.get(&seg, 0).unwrap(), Point { x: 10, y: 20 });

    let sums = mapper.map_read_only(|p| p.x + p.y);
    assert_eq!(sums.get(&seg, 0).unwrap(), 30);
    assert_eq!(
        sums.set(&seg, 0, &1).unwrap_err(),
        AccessError::ReadOnly { type_name: "i32".to_string() }
    );
    assert_eq!(pairs.type_name(), "(i32, i32)");
}

#[test]
fn test_view_follows_segment() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let views = Views::<Point>::new(&point_layout()).unwrap();
    let seg = ints(&[0, 0, 0, 0]);
    let second = views.at_index(&seg, 1).unwrap();
    assert_eq!(second.offset(), 8);

    mapper.set_at_index(&seg, 1, &Point { x: 5, y: -5 }).unwrap();
    assert_eq!(second.get::<i32>("x").unwrap(), 5);
    assert_eq!(second.load().unwrap(), Point { x: 5, y: -5 });
    assert!(matches!(second.set("y", &1i32), Err(AccessError::ReadOnly { .. })));

    second.store(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(read_ints(second.segment()), vec![0, 0, 1, 2]);
}

#[test]
fn test_natural_mapper() {
    let mapper = Mapper::<Line>::natural().unwrap();
    assert_eq!(mapper.layout().byte_size(), 16);
    let seg = Segment::for_layout(mapper.layout());
    let line = Line { begin: Point { x: 1, y: 2 }, end: Point { x: 3, y: 4 } };
    mapper.set(&seg, 0, &line).unwrap();
    assert_eq!(read_ints(&seg), vec![1, 2, 3, 4]);
}

#[test]
fn test_known_types() {
    let durations = Mapper::<Duration>::natural().unwrap();
    assert_eq!(durations.layout().byte_size(), 12);
    let seg = Segment::allocate(48);
    durations.set_at_index(&seg, 2, &Duration::new(90, 500)).unwrap();
    assert_eq!(seg.get::<u64>(24, ByteOrder::NATIVE).unwrap(), 90);
    assert_eq!(durations.get_at_index(&seg, 2).unwrap(), Duration::new(90, 500));
    assert!(matches!(
        durations.get_at_index(&seg, 1),
        Err(AccessError::Misaligned { offset: 12, alignment: 8 })
    ));

    let times = Mapper::<SystemTime>::natural().unwrap();
    let when = UNIX_EPOCH + Duration::new(1_700_000_000, 42);
    times.set(&seg, 0, &when).unwrap();
    assert_eq!(times.get(&seg, 0).unwrap(), when);
}

#[test]
fn test_known_type_component() {
    let at = Layout::structure([Layout::U64, Layout::U32]).unwrap().with_name("at");
    let layout = Layout::structure([at, Layout::U32.with_name("id")]).unwrap();
    let mapper = Mapper::<Timed>::new(&layout).unwrap();
    let seg = Segment::for_layout(&layout);
    let value = Timed { at: Duration::from_millis(1500), id: 7 };
    mapper.set(&seg, 0, &value).unwrap();
    assert_eq!(seg.get::<u32>(8, ByteOrder::NATIVE).unwrap(), 500_000_000);
    assert_eq!(mapper.get(&seg, 0).unwrap(), value);

    let wrong = Layout::structure([
        Layout::structure([Layout::U32, Layout::U32]).unwrap().with_name("at"),
        Layout::U32.with_name("id"),
    ])
    .unwrap();
    let err = Mapper::<Timed>::new(&wrong).unwrap_err();
    assert!(err.to_string().contains("registered layout is"), "{}", err);

    let empty = Registry::empty();
    let err = Mapper::<Timed>::builder(&layout).registry(&empty).build().unwrap_err();
    assert!(err.to_string().contains("not registered"), "{}", err);
}

#[test]
fn test_layout_from_json() {
    let layout = Layout::from_json(
        r#"{
            "kind": "struct",
            "members": [
                { "kind": "value", "carrier": "i32", "order": "big", "name": "x" },
                { "kind": "padding", "size": 4 },
                { "kind": "value", "carrier": "i32", "order": "big", "name": "y" }
            ]
        }"#,
    )
    .unwrap();
    let mapper = Mapper::<Point>::new(&layout).unwrap();
    let seg = Segment::from_bytes(&[0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 2]);
    assert_eq!(mapper.get(&seg, 0).unwrap(), Point { x: 1, y: 2 });
}

#[test]
fn test_threads_share_mapper_and_segment() {
    let mapper = Mapper::<Point>::new(&point_layout()).unwrap();
    let seg = Segment::allocate(8 * 16);
    let handles: Vec<_> = (0..16)
        .map(|ix| {
            let (mapper, seg) = (mapper.clone(), seg.clone());
            thread::spawn(move || {
                mapper.set_at_index(&seg, ix, &Point { x: ix as i32, y: -(ix as i32) }).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    for (ix, point) in mapper.stream(&seg).unwrap().enumerate() {
        assert_eq!(point.unwrap(), Point { x: ix as i32, y: -(ix as i32) });
    }
}

#[test]
fn test_sentinel_publishes_writes() {
    segmap::record! {
        #[derive(Debug, Clone, Copy, PartialEq)]
        struct Message {
            ready: u8,
            payload: u64,
        }
    }

    let layout =
        Layout::structure([Layout::U8.with_name("ready"), Layout::U64.with_name("payload")])
            .unwrap();
    let mapper = Mapper::<Message>::new(&layout).unwrap();
    let seg = Segment::for_layout(&layout);

    let writer = {
        let (mapper, seg) = (mapper.clone(), seg.clone());
        thread::spawn(move || mapper.set(&seg, 0, &Message { ready: 1, payload: 0xfeed }).unwrap())
    };
    loop {
        let message = mapper.get(&seg, 0).unwrap();
        if message.ready == 1 && message.payload == 0xfeed {
            break;
        }
        thread::yield_now();
    }
    writer.join().unwrap();
}
