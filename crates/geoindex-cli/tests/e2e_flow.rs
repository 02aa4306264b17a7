//! End-to-end tests for the geoindex binary.
//!
//! Builds a small tree of GPX tracks and JPEG photographs, then runs the
//! `export-gpx`, `query` and `group` subcommands against it.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use tempfile::TempDir;

fn geoindex_binary() -> String {
    env!("CARGO_BIN_EXE_geoindex").to_string()
}

/// Runs the binary with an isolated home and config directory.
fn run(temp: &Path, args: &[&str]) -> Output {
    Command::new(geoindex_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env("XDG_DATA_HOME", temp.join(".local/share"))
        .env_remove("RUST_LOG")
        .env_remove("GEOINDEX_GAZETTEER_PATH")
        .env_remove("GEOINDEX_IMAGE_CACHE_PATH")
        .args(args)
        .output()
        .expect("failed to run geoindex")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "geoindex failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn ascii(tag: Tag, value: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    }
}

fn dms(tag: Tag, degrees: u32, minutes: u32, seconds: u32) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(vec![
            Rational::from((degrees, 1)),
            Rational::from((minutes, 1)),
            Rational::from((seconds, 1)),
        ]),
    }
}

/// Writes a minimal JPEG carrying only an EXIF segment.
fn write_jpeg(path: &Path, fields: &[Field]) {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&u16::try_from(tiff.len() + 8).unwrap().to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    fs::write(path, jpeg).unwrap();
}

fn photo(path: &Path, taken: &str, gps: Option<[Field; 4]>) {
    let mut fields = vec![
        ascii(Tag::Model, "Pixel 7"),
        ascii(Tag::DateTimeOriginal, taken),
    ];
    fields.extend(gps.into_iter().flatten());
    write_jpeg(path, &fields);
}

const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="41.850030" lon="-87.650050"><time>2024-06-01T12:00:00Z</time></trkpt>
      <trkpt lat="41.850030" lon="-87.650050"><time>2024-06-01T12:05:00Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="42.331430" lon="-83.045750"><time>2024-06-01T18:00:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

fn geonames_row(
    id: &str,
    name: &str,
    lat: f64,
    lon: f64,
    country: &str,
    population: u64,
) -> String {
    format!(
        "{id}\t{name}\t{name}\t\t{lat}\t{lon}\tP\tPPL\t{country}\t\t00\t\t\t\t{population}\t\t200\tZone\t2024-01-01"
    )
}

struct Fixture {
    temp: TempDir,
    tracks: PathBuf,
    photos: PathBuf,
    gazetteer: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();

        let tracks = temp.path().join("tracks");
        fs::create_dir_all(&tracks).unwrap();
        fs::write(tracks.join("day.gpx"), TRACK).unwrap();

        let photos = temp.path().join("photos");
        fs::create_dir_all(photos.join("later")).unwrap();
        photo(&photos.join("a.jpg"), "2024:06:01 12:02:00", None);
        photo(&photos.join("b.JPEG"), "2024:06:01 12:04:00", None);
        photo(&photos.join("c.jpg"), "2024:06:01 18:03:00", None);
        photo(&photos.join("lost.jpg"), "2024:06:01 15:00:00", None);
        photo(
            &photos.join("later").join("dresden.jpg"),
            "2024:06:03 09:00:00",
            Some([
                dms(Tag::GPSLatitude, 51, 3, 3),
                ascii(Tag::GPSLatitudeRef, "N"),
                dms(Tag::GPSLongitude, 13, 44, 18),
                ascii(Tag::GPSLongitudeRef, "E"),
            ]),
        );

        let gazetteer = temp.path().join("cities.txt");
        let rows = [
            geonames_row("4887398", "Chicago", 41.85003, -87.65005, "US", 2_720_546),
            geonames_row("4990729", "Detroit", 42.33143, -83.04575, "US", 677_116),
            geonames_row("2935022", "Dresden", 51.05089, 13.73832, "DE", 486_854),
            geonames_row("9999999", "Hamlet", 51.05, 13.74, "DE", 12),
        ];
        fs::write(&gazetteer, rows.join("\n")).unwrap();

        Self {
            temp,
            tracks,
            photos,
            gazetteer,
        }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Writes a config file pointing at the fixture gazetteer.
    fn config_file(&self, extra: &str) -> PathBuf {
        let path = self.path().join("geoindex.toml");
        fs::write(
            &path,
            format!(
                "gazetteer_path = {:?}\nminimum_population = 1000\n{extra}",
                self.gazetteer.to_str().unwrap()
            ),
        )
        .unwrap();
        path
    }
}

#[test]
fn export_gpx_writes_all_track_points() {
    let fixture = Fixture::new();
    let out = fixture.path().join("out.gpx");

    let output = run(
        fixture.path(),
        &[
            "export-gpx",
            fixture.tracks.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ],
    );
    stdout(&output);

    let written = fs::read_to_string(&out).unwrap();
    assert_eq!(written.matches("<trkpt").count(), 3);
    assert!(written.contains("2024-06-01T18:00:00"));
}

#[test]
fn query_lists_records_near_coordinate() {
    let fixture = Fixture::new();

    let output = run(
        fixture.path(),
        &[
            "query",
            fixture.path().to_str().unwrap(),
            "--latitude",
            "42.33143",
            "--longitude",
            "-83.04575",
            "--level",
            "15",
        ],
    );
    let text = stdout(&output);

    assert_eq!(text.lines().count(), 1, "unexpected output: {text}");
    assert!(text.starts_with("day.gpx @ 2024-06-01T18:00:00+00:00"));
}

#[test]
fn group_json_assigns_photos_to_cities() {
    let fixture = Fixture::new();
    let config = fixture.config_file("");

    let output = run(
        fixture.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "group",
            "--locations",
            fixture.tracks.to_str().unwrap(),
            "--images",
            fixture.photos.to_str().unwrap(),
            "--json",
        ],
    );
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    let groups = report["groups"].as_array().unwrap();
    let summary: Vec<(String, usize)> = groups
        .iter()
        .map(|g| {
            (
                g["place"]["name"].as_str().unwrap().to_string(),
                g["files"].as_array().unwrap().len(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        [
            ("Chicago".to_string(), 2),
            ("Detroit".to_string(), 1),
            ("Dresden".to_string(), 1),
        ]
    );
    assert_eq!(groups[0]["camera_model"], "Pixel 7");
    assert_eq!(groups[0]["time_key"], "2024-06-01T12:02:00Z");
    assert_eq!(groups[1]["time_key"], "2024-06-01T12:02:00Z");
    assert_eq!(groups[2]["time_key"], "2024-06-03T09:00:00Z");

    let unassigned = report["unassigned"].as_array().unwrap();
    assert_eq!(unassigned.len(), 1);
    assert!(unassigned[0]["file"].as_str().unwrap().ends_with("lost.jpg"));
    assert_eq!(unassigned[0]["reason"], "no matching/near location record");
}

#[test]
fn group_text_output_and_env_configuration() {
    let fixture = Fixture::new();
    let cache = fixture.path().join("cache");

    let output = Command::new(geoindex_binary())
        .env("HOME", fixture.path())
        .env("XDG_CONFIG_HOME", fixture.path().join(".config"))
        .env("GEOINDEX_GAZETTEER_PATH", &fixture.gazetteer)
        .env("GEOINDEX_IMAGE_CACHE_PATH", &cache)
        .args([
            "group",
            "--locations",
            fixture.tracks.to_str().unwrap(),
            "--images",
            fixture.photos.to_str().unwrap(),
            "--camera-model",
            "Pixel 7",
        ])
        .output()
        .unwrap();
    let text = stdout(&output);

    assert!(
        text.contains("Chicago, US  [Pixel 7]  (2 images)"),
        "{text}"
    );
    assert!(text.contains("Unassigned (1):"), "{text}");
    assert_eq!(fs::read_dir(&cache).unwrap().count(), 5);
}

#[test]
fn group_skew_moves_photos_away_from_fixes() {
    let fixture = Fixture::new();
    let config = fixture.config_file("");

    let output = run(
        fixture.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "group",
            "--locations",
            fixture.tracks.to_str().unwrap(),
            "--images",
            fixture.photos.to_str().unwrap(),
            "--skew",
            "-1h",
            "--json",
        ],
    );
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    // Only the geotagged photo survives; every other one is an hour off its fix.
    assert_eq!(report["groups"].as_array().unwrap().len(), 1);
    assert_eq!(report["unassigned"].as_array().unwrap().len(), 4);
}

#[test]
fn group_fails_without_gazetteer() {
    let fixture = Fixture::new();

    let output = run(
        fixture.path(),
        &[
            "group",
            "--locations",
            fixture.tracks.to_str().unwrap(),
            "--images",
            fixture.photos.to_str().unwrap(),
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load gazetteer"), "{stderr}");
}
