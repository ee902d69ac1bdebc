use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use packrat::ops::{DiffChange, convert_packs, diff_packs, extract_pack, list_entries};
use packrat::pack::{FileTime, Pack, WarnSink, create_pack, open_pack};
use packrat::Error;

/// A warning sink that records everything it sees.
fn recording_sink() -> (WarnSink, Arc<Mutex<Vec<(String, String)>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);
    let sink = WarnSink::new(move |entry, message| {
        log2.lock().unwrap().push((entry.to_string(), message.to_string()));
    });
    (sink, log)
}

fn add_entry(pack: &mut Pack, name: &str, data: &[u8], mtime: Option<FileTime>) {
    assert!(pack.new_entry(name, mtime).unwrap(), "entry {name} was skipped");
    assert_eq!(pack.write(data).unwrap(), data.len());
    pack.close_write_entry().unwrap();
}

fn read_entry(pack: &mut Pack, name: &str) -> Vec<u8> {
    assert!(pack.open_entry(name).unwrap(), "entry {name} not found");
    let mut out = Vec::new();
    let mut buf = [0u8; 7]; // deliberately odd-sized chunks
    loop {
        let n = pack.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    pack.close_read_entry().unwrap();
    out
}

fn entry_names(pack: &Pack) -> Vec<String> {
    list_entries(pack, None).into_iter().map(|e| e.name).collect()
}

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> FileTime {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
}

fn make_pack(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    let mut pack = create_pack(path, WarnSink::silent()).unwrap();
    if !entries.is_empty() {
        pack.pre_reserve(entries.len()).unwrap();
    }
    for (name, data) in entries {
        add_entry(&mut pack, name, data, None);
    }
    pack.close().unwrap();
    path.to_path_buf()
}

// ==================== round-trips ====================

#[test]
fn pak_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test0.pak");

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    add_entry(&mut pack, "gfx/palette.lmp", b"rgbrgbrgb", None);
    add_entry(&mut pack, "maps/e1m1.bsp", &[0u8; 1000], None);
    pack.close().unwrap();

    let mut pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    assert_eq!(entry_names(&pack), vec!["gfx/palette.lmp", "maps/e1m1.bsp"]);
    assert_eq!(read_entry(&mut pack, "gfx/palette.lmp"), b"rgbrgbrgb");
    assert_eq!(read_entry(&mut pack, "MAPS/E1M1.BSP"), vec![0u8; 1000]);

    // The flat-table format has no concept of time.
    assert!(pack.open_entry("maps/e1m1.bsp").unwrap());
    assert_eq!(pack.entry_timestamp(), None);
    pack.close_read_entry().unwrap();
    pack.close().unwrap();
}

#[test]
fn pak_physical_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout0.pak");

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    add_entry(&mut pack, "a.txt", b"hello", None);
    pack.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"PACK");
    let table_offset = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let table_size = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    assert_eq!(table_size, 64);
    assert_eq!(bytes.len(), table_offset + table_size);
    // Data region: header .. table, holding exactly the entry bytes.
    assert_eq!(&bytes[12..table_offset], b"hello");
    // Record: 56-byte name field, then offset and length.
    let record = &bytes[table_offset..];
    assert_eq!(&record[..5], b"a.txt");
    assert!(record[5..56].iter().all(|&b| b == 0));
    assert_eq!(u32::from_le_bytes(record[56..60].try_into().unwrap()), 12);
    assert_eq!(u32::from_le_bytes(record[60..64].try_into().unwrap()), 5);
}

#[test]
fn grp_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.grp");

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    pack.pre_reserve(2).unwrap();
    add_entry(&mut pack, "tiles.art", b"artdata", None);
    add_entry(&mut pack, "demo1.dmo", b"demobytes", None);
    pack.close().unwrap();

    let mut pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    // GRP names are stored upper-cased, matching historical tooling.
    assert_eq!(entry_names(&pack), vec!["TILES.ART", "DEMO1.DMO"]);
    assert_eq!(read_entry(&mut pack, "tiles.art"), b"artdata");
    assert_eq!(read_entry(&mut pack, "DEMO1.DMO"), b"demobytes");
    pack.close().unwrap();
}

#[test]
fn pk3_round_trip_with_timestamps() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.pk3");

    // DOS times have two-second resolution; use an even second.
    let stamp = ts(2003, 7, 14, 12, 30, 24);

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    add_entry(&mut pack, "scripts/arena.txt", b"map q3dm17", Some(stamp));
    add_entry(&mut pack, "textures/wall.png", &[0xAB; 4096], Some(stamp));
    pack.close().unwrap();

    let mut pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    assert_eq!(read_entry(&mut pack, "scripts/arena.txt"), b"map q3dm17");
    assert_eq!(read_entry(&mut pack, "TEXTURES/WALL.PNG"), vec![0xAB; 4096]);

    assert!(pack.open_entry("scripts/arena.txt").unwrap());
    assert_eq!(pack.entry_timestamp(), Some(stamp));
    pack.close_read_entry().unwrap();
    pack.close().unwrap();
}

#[test]
fn dir_round_trip_with_timestamps() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("loosefiles");

    let stamp = ts(2010, 2, 5, 8, 15, 30);

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    add_entry(&mut pack, "sub/inner/readme.txt", b"nested", Some(stamp));
    add_entry(&mut pack, "top.bin", &[1, 2, 3], None);
    pack.close().unwrap();

    assert!(path.join("sub/inner/readme.txt").is_file());

    let mut pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    let mut names = entry_names(&pack);
    names.sort();
    assert_eq!(names, vec!["sub/inner/readme.txt", "top.bin"]);
    assert_eq!(read_entry(&mut pack, "sub/inner/readme.txt"), b"nested");

    assert!(pack.open_entry("sub/inner/readme.txt").unwrap());
    assert_eq!(pack.entry_timestamp(), Some(stamp));
    pack.close_read_entry().unwrap();
    pack.close().unwrap();
}

// ==================== open/close stability ====================

#[test]
fn open_then_close_does_not_mutate() {
    let dir = tempdir().unwrap();
    for file in ["stable0.pak", "stable.grp", "stable.pk3"] {
        let path = make_pack(
            &dir.path().join(file),
            &[("one.dat", b"first"), ("two.dat", b"second")],
        );
        let before = fs::read(&path).unwrap();

        let pack = open_pack(&path, false, WarnSink::silent()).unwrap();
        assert_eq!(pack.entry_count(), 2);
        pack.close().unwrap();

        let after = fs::read(&path).unwrap();
        assert_eq!(before, after, "{file} changed across open/close");
    }
}

#[test]
fn create_empty_then_reopen() {
    let dir = tempdir().unwrap();
    for file in ["empty0.pak", "empty.grp", "empty.pk3"] {
        let path = dir.path().join(file);
        create_pack(&path, WarnSink::silent()).unwrap().close().unwrap();

        let pack = open_pack(&path, false, WarnSink::silent()).unwrap();
        assert_eq!(pack.entry_count(), 0, "{file}");
        pack.close().unwrap();
    }
}

// ==================== contract behavior ====================

#[test]
fn duplicate_entry_is_skipped_with_warning() {
    let dir = tempdir().unwrap();
    let (sink, log) = recording_sink();

    let mut pack = create_pack(&dir.path().join("dup0.pak"), sink).unwrap();
    add_entry(&mut pack, "x.txt", b"data", None);

    assert!(!pack.new_entry("X.TXT", None).unwrap());
    assert_eq!(pack.entry_count(), 1);

    let warnings = log.lock().unwrap();
    assert!(warnings.iter().any(|(e, m)| e == "X.TXT" && m.contains("duplicate")));
    drop(warnings);
    pack.close().unwrap();
}

#[test]
fn missing_entry_is_a_warning_not_an_error() {
    let dir = tempdir().unwrap();
    let (sink, log) = recording_sink();

    let path = make_pack(&dir.path().join("miss0.pak"), &[("here.txt", b"x")]);
    let mut pack = open_pack(&path, false, sink).unwrap();

    assert!(!pack.open_entry("not/here.txt").unwrap());
    assert!(log.lock().unwrap().iter().any(|(e, m)| e == "not/here.txt" && m.contains("not found")));
    pack.close().unwrap();
}

#[test]
fn names_are_canonicalized_and_lookup_is_case_insensitive() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("canon.pk3"), WarnSink::silent()).unwrap();
    add_entry(&mut pack, r"textures\base\wall.tga", b"tga", None);

    assert!(pack.contains("textures/base/wall.tga"));
    assert!(pack.contains("TEXTURES/BASE/WALL.TGA"));
    assert!(pack.contains(r"Textures\Base\Wall.Tga"));
    assert!(!pack.contains("textures/base/floor.tga"));
    pack.close().unwrap();
}

#[test]
fn empty_name_is_rejected() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("bad0.pak"), WarnSink::silent()).unwrap();
    assert!(matches!(pack.new_entry("", None), Err(Error::EmptyEntryName)));
    pack.close().unwrap();
}

#[test]
fn over_long_name_is_rejected() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("long.grp"), WarnSink::silent()).unwrap();
    // GRP names are capped at 12 bytes.
    assert!(matches!(
        pack.new_entry("waytoolongname.dat", None),
        Err(Error::NameTooLong { .. })
    ));
    pack.close().unwrap();
}

#[test]
fn bad_magic_is_structural() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fake0.pak");
    fs::write(&path, b"NOPE\0\0\0\0\0\0\0\0").unwrap();
    assert!(matches!(
        open_pack(&path, false, WarnSink::silent()),
        Err(Error::BadMagic { .. })
    ));
}

#[test]
fn table_out_of_bounds_is_structural() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bounds0.pak");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PACK");
    bytes.extend_from_slice(&9999u32.to_le_bytes()); // offset past EOF
    bytes.extend_from_slice(&64u32.to_le_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        open_pack(&path, false, WarnSink::silent()),
        Err(Error::TableOutOfBounds { .. })
    ));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.tar");
    fs::write(&path, b"whatever").unwrap();
    assert!(matches!(
        open_pack(&path, false, WarnSink::silent()),
        Err(Error::UnsupportedArchive { .. })
    ));
}

// ==================== GRP batch protocol ====================

#[test]
fn grp_shift_preserves_existing_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shift.grp");

    // Large enough to exercise the backward block walk.
    let big: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    make_pack(&path, &[("tiles.art", &big), ("small.map", b"tiny")]);

    // Reopen writable and insert two more entries in one batch.
    let mut pack = open_pack(&path, true, WarnSink::silent()).unwrap();
    pack.pre_reserve(2).unwrap();
    add_entry(&mut pack, "extra1.dat", b"eins", None);
    add_entry(&mut pack, "extra2.dat", b"zwei", None);
    pack.close().unwrap();

    let mut pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    assert_eq!(pack.entry_count(), 4);
    assert_eq!(read_entry(&mut pack, "tiles.art"), big);
    assert_eq!(read_entry(&mut pack, "small.map"), b"tiny");
    assert_eq!(read_entry(&mut pack, "extra1.dat"), b"eins");
    assert_eq!(read_entry(&mut pack, "extra2.dat"), b"zwei");
    pack.close().unwrap();

    // Total size is exactly header + table + data.
    let expected = 16 + 4 * 16 + big.len() as u64 + 4 + 4 + 4;
    assert_eq!(fs::metadata(&path).unwrap().len(), expected);
}

#[test]
fn grp_reserving_twice_is_a_protocol_violation() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("batch.grp"), WarnSink::silent()).unwrap();
    pack.pre_reserve(2).unwrap();
    assert!(matches!(pack.pre_reserve(1), Err(Error::BatchPending)));
}

#[test]
fn grp_close_mid_batch_is_refused() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("torn.grp"), WarnSink::silent()).unwrap();
    pack.pre_reserve(2).unwrap();
    add_entry(&mut pack, "only.one", b"x", None);
    assert!(matches!(pack.close(), Err(Error::BatchOpen { written: 1, reserved: 2 })));
}

#[test]
fn grp_warns_on_non_dos_names() {
    let dir = tempdir().unwrap();
    let (sink, log) = recording_sink();
    let mut pack = create_pack(&dir.path().join("dos.grp"), sink).unwrap();
    add_entry(&mut pack, "read_me.txt", b"x", None);
    assert!(log.lock().unwrap().iter().any(|(_, m)| m.contains("8.3")));
    pack.close().unwrap();
}

// ==================== PAK rollover ====================

#[test]
fn pak_rolls_over_to_next_volume() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vol0.pak");

    let mut pack = create_pack(&path, WarnSink::silent()).unwrap();
    for i in 0..2049 {
        add_entry(&mut pack, &format!("e{i:04}.dat"), b"d", None);
    }
    assert_eq!(pack.entry_count(), 2049);
    pack.close().unwrap();

    let first = open_pack(&path, false, WarnSink::silent()).unwrap();
    assert_eq!(first.entry_count(), 2048);
    first.close().unwrap();

    let second = open_pack(dir.path().join("vol1.pak"), false, WarnSink::silent()).unwrap();
    assert_eq!(second.entry_count(), 1);
    second.close().unwrap();
}

#[test]
fn pak_rollover_requires_numeric_suffix() {
    let dir = tempdir().unwrap();
    let mut pack = create_pack(&dir.path().join("data.pak"), WarnSink::silent()).unwrap();
    let mut hit_cap = false;
    for i in 0..2049 {
        match pack.new_entry(&format!("e{i:04}.dat"), None) {
            Ok(true) => {
                pack.write(b"d").unwrap();
                pack.close_write_entry().unwrap();
            }
            Ok(false) => panic!("unexpected duplicate"),
            Err(Error::RolloverUnavailable { .. }) => {
                hit_cap = true;
                break;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(hit_cap, "rollover should be unavailable without a numeric suffix");
}

// ==================== merge/convert ====================

#[test]
fn merge_last_source_wins() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("a0.pak"), &[("x.txt", b"from a"), ("a_only.txt", b"A")]);
    let b = make_pack(&dir.path().join("b0.pak"), &[("X.TXT", b"from b"), ("b_only.txt", b"B")]);

    let (sink, log) = recording_sink();
    let mut sources = vec![
        open_pack(&a, false, sink.clone()).unwrap(),
        open_pack(&b, false, sink.clone()).unwrap(),
    ];
    let out = dir.path().join("merged.pk3");
    let mut dest = create_pack(&out, sink.clone()).unwrap();

    let outcome = convert_packs(&mut sources, &mut dest, &sink).unwrap();
    assert_eq!(outcome.copied, 3);
    assert_eq!(outcome.skipped, 1);
    dest.close().unwrap();
    for s in sources {
        s.close().unwrap();
    }

    // The override was decided without reading A's bytes; the warning names it.
    assert!(log.lock().unwrap().iter().any(|(e, m)| e == "x.txt" && m.contains("overridden")));

    let mut merged = open_pack(&out, false, WarnSink::silent()).unwrap();
    assert_eq!(merged.entry_count(), 3);
    assert_eq!(read_entry(&mut merged, "x.txt"), b"from b");
    assert_eq!(read_entry(&mut merged, "a_only.txt"), b"A");
    assert_eq!(read_entry(&mut merged, "b_only.txt"), b"B");
    merged.close().unwrap();
}

#[test]
fn merge_into_grp_reserves_once() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("src0.pak"), &[("one.dat", b"1"), ("two.dat", b"2")]);
    let b = make_pack(&dir.path().join("src.pk3"), &[("three.dat", b"3")]);

    let warn = WarnSink::silent();
    let mut sources = vec![
        open_pack(&a, false, warn.clone()).unwrap(),
        open_pack(&b, false, warn.clone()).unwrap(),
    ];
    let out = dir.path().join("merged.grp");
    let mut dest = create_pack(&out, warn.clone()).unwrap();
    convert_packs(&mut sources, &mut dest, &warn).unwrap();
    dest.close().unwrap();

    let mut merged = open_pack(&out, false, warn).unwrap();
    assert_eq!(merged.entry_count(), 3);
    assert_eq!(read_entry(&mut merged, "ONE.DAT"), b"1");
    assert_eq!(read_entry(&mut merged, "THREE.DAT"), b"3");
    merged.close().unwrap();
}

#[test]
fn merge_carries_timestamps() {
    let dir = tempdir().unwrap();
    let stamp = ts(1999, 12, 9, 17, 0, 2);

    let src_path = dir.path().join("stamped.pk3");
    let mut src = create_pack(&src_path, WarnSink::silent()).unwrap();
    add_entry(&mut src, "old.txt", b"aged", Some(stamp));
    src.close().unwrap();

    let out = dir.path().join("copy.pk3");
    let warn = WarnSink::silent();
    let mut sources = vec![open_pack(&src_path, false, warn.clone()).unwrap()];
    let mut dest = create_pack(&out, warn.clone()).unwrap();
    convert_packs(&mut sources, &mut dest, &warn).unwrap();
    dest.close().unwrap();

    let mut copy = open_pack(&out, false, WarnSink::silent()).unwrap();
    assert!(copy.open_entry("old.txt").unwrap());
    assert_eq!(copy.entry_timestamp(), Some(stamp));
    copy.close_read_entry().unwrap();
    copy.close().unwrap();
}

// ==================== extraction ====================

#[test]
fn extract_creates_per_archive_subfolder() {
    let dir = tempdir().unwrap();
    let path = make_pack(
        &dir.path().join("assets0.pak"),
        &[("gfx/title.lmp", b"img"), ("sound/door.wav", b"wav")],
    );

    let out = dir.path().join("out");
    let written = extract_pack(&path, &out, &WarnSink::silent()).unwrap();
    assert_eq!(written, 2);

    assert_eq!(fs::read(out.join("assets0/gfx/title.lmp")).unwrap(), b"img");
    assert_eq!(fs::read(out.join("assets0/sound/door.wav")).unwrap(), b"wav");
}

// ==================== diff ====================

fn diff_reports(a: &Path, b: &Path) -> Vec<DiffChange> {
    let warn = WarnSink::silent();
    let mut first = open_pack(a, false, warn.clone()).unwrap();
    let mut second = open_pack(b, false, warn).unwrap();
    let report = diff_packs(&mut first, &mut second).unwrap();
    first.close().unwrap();
    second.close().unwrap();
    report.changes
}

#[test]
fn diff_detects_rename() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("da0.pak"), &[("a.txt", b"hi")]);
    let b = make_pack(&dir.path().join("db0.pak"), &[("b.txt", b"hi")]);

    assert_eq!(
        diff_reports(&a, &b),
        vec![DiffChange::Renamed {
            name: "a.txt".to_string(),
            renamed_to: vec!["b.txt".to_string()],
        }]
    );
}

#[test]
fn diff_detects_content_change() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("ca0.pak"), &[("a.txt", b"hi")]);
    let b = make_pack(&dir.path().join("cb0.pak"), &[("a.txt", b"bye")]);

    assert_eq!(
        diff_reports(&a, &b),
        vec![DiffChange::ContentChanged { name: "a.txt".to_string() }]
    );
}

#[test]
fn diff_detects_only_in_one_side() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("oa0.pak"), &[("only_a.txt", b"x")]);
    let b = make_pack(&dir.path().join("ob0.pak"), &[]);

    assert_eq!(
        diff_reports(&a, &b),
        vec![DiffChange::OnlyInFirst { name: "only_a.txt".to_string() }]
    );

    assert_eq!(
        diff_reports(&b, &a),
        vec![DiffChange::OnlyInSecond { name: "only_a.txt".to_string() }]
    );
}

#[test]
fn diff_identical_archives_report_nothing() {
    let dir = tempdir().unwrap();
    let a = make_pack(&dir.path().join("ia0.pak"), &[("same.txt", b"same"), ("more.txt", b"more")]);
    let b = make_pack(&dir.path().join("ib.pk3"), &[("SAME.TXT", b"same"), ("more.txt", b"more")]);

    assert_eq!(diff_reports(&a, &b), vec![]);
}

#[test]
fn diff_results_are_sorted_by_name() {
    let dir = tempdir().unwrap();
    let a = make_pack(
        &dir.path().join("sa0.pak"),
        &[("zeta.txt", b"z"), ("alpha.txt", b"a")],
    );
    let b = make_pack(&dir.path().join("sb0.pak"), &[]);

    let names: Vec<String> = diff_reports(&a, &b).iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["alpha.txt", "zeta.txt"]);
}

// ==================== cross-format listing ====================

#[test]
fn list_filter_is_case_insensitive_substring() {
    let dir = tempdir().unwrap();
    let path = make_pack(
        &dir.path().join("filt0.pak"),
        &[("maps/e1m1.bsp", b"1"), ("maps/e1m2.bsp", b"2"), ("gfx/title.lmp", b"3")],
    );

    let pack = open_pack(&path, false, WarnSink::silent()).unwrap();
    let hits = list_entries(&pack, Some("MAPS/"));
    assert_eq!(hits.len(), 2);
    let none = list_entries(&pack, Some("missing"));
    assert!(none.is_empty());
    pack.close().unwrap();
}
