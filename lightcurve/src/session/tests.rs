use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use super::*;
use crate::frame::FrameHeader;
use crate::photometry::Aperture;
use crate::testing::synthetic::star_field;
use crate::testing::{MemorySource, frame, gps_header, init_tracing};

const SKY: f64 = 100.0;
const EXPOSURE: f64 = 10.0;

fn session_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2011, 3, 4)
        .unwrap()
        .and_hms_opt(21, 0, 0)
        .unwrap()
}

/// Stars are cut off 6 px from their centers, so both annuli in
/// `good_regions` see only sky.
fn sky_image() -> Image {
    star_field(64, 64, SKY, &[(20.0, 20.0, 5000.0), (44.0, 40.0, 3000.0)])
}

fn good_regions() -> Vec<Aperture> {
    vec![
        Aperture::new(20.4, 19.7, 8.0, 16.0).unwrap(),
        Aperture::new(43.6, 40.3, 8.0, 16.0).unwrap(),
    ]
}

fn setup_with(regions: Vec<Aperture>) -> SessionSetup {
    regions
        .into_iter()
        .fold(SessionSetup::new("run_*.fits", session_start()), |s, r| {
            s.with_region(r)
        })
}

/// `count` frames named `run_0001.fits`... taken 30 s apart.
fn source_with_frames(count: u32) -> MemorySource {
    let mut source = MemorySource::new();
    for i in 0..count {
        let name = format!("run_{:04}.fits", i + 1);
        source.insert(&name, frame(sky_image(), gps_header(EXPOSURE, 30 * i)));
    }
    source.insert("dark.fits", frame(Image::new_filled(64, 64, 0.0), FrameHeader::default()));
    source
}

fn new_log(dir: &Path, setup: &SessionSetup) -> PathBuf {
    let path = dir.join("run.dat");
    ReductionSession::create(&path, setup).unwrap();
    path
}

fn records(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_create_refuses_existing_log() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions());
    let path = new_log(dir.path(), &setup);
    let before = fs::read_to_string(&path).unwrap();

    let err = ReductionSession::create(&path, &setup).unwrap_err();
    assert!(matches!(err, SessionError::LogExists(_)));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_session_without_regions_logs_times_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(vec![]));
    let source = source_with_frames(2);

    let mut session = ReductionSession::open(&path, &source).unwrap();
    assert!(session.setup().regions.is_empty());
    session.run(&source, &SessionConfig::default()).unwrap();

    assert_eq!(records(&path), vec!["0 run_0001.fits", "30 run_0002.fits"]);
}

#[test]
fn test_open_replays_header() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions());
    let path = new_log(dir.path(), &setup);

    let session = ReductionSession::open(&path, &MemorySource::new()).unwrap();
    assert_eq!(session.setup(), &setup);
    assert_eq!(session.processed_count(), 0);
    assert!(session.dark().is_none());
}

#[test]
fn test_run_appends_one_record_per_frame() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let source = source_with_frames(3);

    let mut session = ReductionSession::open(&path, &source).unwrap();
    let summary = session.run(&source, &SessionConfig::default()).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            matched: 3,
            skipped: 0,
            processed: 3,
            region_failures: 0,
        }
    );

    let lines = records(&path);
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0], (30 * i).to_string());
        assert_eq!(fields[5], format!("run_{:04}.fits", i + 1));
        let star: f64 = fields[1].parse().unwrap();
        let sky: f64 = fields[2].parse().unwrap();
        assert!(star > 0.0);
        assert!((sky - SKY * std::f64::consts::PI * 64.0 / EXPOSURE).abs() < 1e-3);
    }
}

#[test]
fn test_resume_appends_only_new_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));

    let source = source_with_frames(2);
    let mut session = ReductionSession::open(&path, &source).unwrap();
    session.run(&source, &SessionConfig::default()).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let source = source_with_frames(3);
    let mut session = ReductionSession::open(&path, &source).unwrap();
    assert_eq!(session.processed_count(), 2);
    let summary = session.run(&source, &SessionConfig::default()).unwrap();
    assert_eq!((summary.skipped, summary.processed), (2, 1));

    let after = fs::read_to_string(&path).unwrap();
    assert!(after.starts_with(&before));
    assert_eq!(after[before.len()..].lines().count(), 1);
    assert!(after.trim_end().ends_with("run_0003.fits"));

    // Only the new frame was loaded.
    assert_eq!(source.loads(), vec!["run_0003.fits"]);

    // Nothing left to do.
    let summary = session.run(&source, &SessionConfig::default()).unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), after);
}

#[test]
fn test_region_failure_is_contained() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let regions = vec![
        good_regions()[0],
        // Annulus runs off the left edge.
        Aperture::new(3.0, 30.0, 4.0, 8.0).unwrap(),
        good_regions()[1],
    ];
    let path = new_log(dir.path(), &setup_with(regions));
    let source = source_with_frames(2);

    let mut session = ReductionSession::open(&path, &source).unwrap();
    let summary = session.run(&source, &SessionConfig::default()).unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.region_failures, 2);

    for line in records(&path) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 8);
        assert_eq!(&fields[3..5], &["0", "0"]);
        assert_ne!(fields[1], "0");
        assert_ne!(fields[5], "0");
    }

    let log = parse_log(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(log.records.iter().all(|r| r.regions[1].is_none()));
    assert!(log.records.iter().all(|r| r.regions[0].is_some() && r.regions[2].is_some()));
}

#[test]
fn test_missing_timestamp_aborts_with_log_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let mut source = source_with_frames(3);
    source.insert(
        "run_0002.fits",
        frame(
            sky_image(),
            FrameHeader {
                exptime: Some(EXPOSURE),
                ..Default::default()
            },
        ),
    );

    let mut session = ReductionSession::open(&path, &source).unwrap();
    let err = session.run(&source, &SessionConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::NoTimestamp { ref name } if name == "run_0002.fits"));

    let lines = records(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("run_0001.fits"));
    assert!(parse_log(&fs::read_to_string(&path).unwrap()).is_ok());
}

#[test]
fn test_missing_exposure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let mut header = gps_header(EXPOSURE, 0);
    header.exptime = None;
    let source = MemorySource::new().with("run_0001.fits", frame(sky_image(), header));

    let mut session = ReductionSession::open(&path, &source).unwrap();
    let err = session.run(&source, &SessionConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::MissingExposure { .. }));
    assert!(records(&path).is_empty());
}

#[test]
fn test_torn_tail_is_truncated_and_reprocessed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let source = source_with_frames(2);

    let mut session = ReductionSession::open(&path, &MemorySource::new()).unwrap();
    session.run(&source_with_frames(1), &SessionConfig::default()).unwrap();
    let intact = fs::read_to_string(&path).unwrap();

    let mut torn = intact.clone();
    torn.push_str("30 1523.1 40");
    fs::write(&path, &torn).unwrap();

    let mut session = ReductionSession::open(&path, &source).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), intact);
    assert_eq!(session.processed_count(), 1);

    session.run(&source, &SessionConfig::default()).unwrap();
    let lines = records(&path);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with("run_0002.fits"));
}

#[test]
fn test_header_without_final_newline_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions());
    let path = new_log(dir.path(), &setup);
    let intact = fs::read_to_string(&path).unwrap();
    fs::write(&path, intact.trim_end_matches('\n')).unwrap();

    let session = ReductionSession::open(&path, &MemorySource::new()).unwrap();
    assert_eq!(session.setup(), &setup);
    assert_eq!(fs::read_to_string(&path).unwrap(), intact);
}

#[test]
fn test_complete_record_without_final_newline_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let source = source_with_frames(2);

    let mut session = ReductionSession::open(&path, &source).unwrap();
    session.run(&source, &SessionConfig::default()).unwrap();
    let intact = fs::read_to_string(&path).unwrap();
    fs::write(&path, intact.trim_end_matches('\n')).unwrap();

    let mut session = ReductionSession::open(&path, &source).unwrap();
    assert_eq!(session.processed_count(), 2);
    assert_eq!(fs::read_to_string(&path).unwrap(), intact);

    let summary = session.run(&source, &SessionConfig::default()).unwrap();
    assert_eq!(summary.processed, 0);
}

#[test]
fn test_torn_header_line_leaves_log_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.dat");
    let text = "# Pattern: run_*.fits\n# Startdate: 2011-03-04 21:00:00\n# Region: (20.4, 19";
    fs::write(&path, text).unwrap();

    let err = ReductionSession::open(&path, &MemorySource::new()).unwrap_err();
    assert!(matches!(err, SessionError::CorruptLog { line: 3, .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn test_corrupt_log_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("0 1 2 run_0001.fits\n");
    fs::write(&path, text).unwrap();

    let err = ReductionSession::open(&path, &MemorySource::new()).unwrap_err();
    assert!(matches!(err, SessionError::CorruptLog { .. }));
}

#[test]
fn test_dark_is_subtracted_before_photometry() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions()).with_dark_template("dark.fits");
    let path = new_log(dir.path(), &setup);

    // Frames carry a 50-count pedestal that the dark removes.
    let mut source = MemorySource::new();
    let mut pedestal = sky_image();
    pedestal.iter_mut().for_each(|v| *v += 50.0);
    source.insert("run_0001.fits", frame(pedestal, gps_header(EXPOSURE, 0)));
    source.insert("dark.fits", frame(Image::new_filled(64, 64, 50.0), FrameHeader::default()));

    let mut session = ReductionSession::open(&path, &source).unwrap();
    assert!(session.dark().is_some());
    session.run(&source, &SessionConfig::default()).unwrap();

    let plain_dir = tempfile::tempdir().unwrap();
    let plain_path = new_log(plain_dir.path(), &setup_with(good_regions()));
    let plain_source = source_with_frames(1);
    let mut plain = ReductionSession::open(&plain_path, &plain_source).unwrap();
    plain.run(&plain_source, &SessionConfig::default()).unwrap();

    let parse = |p: &Path| parse_log(&fs::read_to_string(p).unwrap()).unwrap().records;
    let (with_dark, plain) = (parse(&path), parse(&plain_path));
    assert_eq!(with_dark.len(), 1);
    for (a, b) in with_dark[0].regions.iter().zip(&plain[0].regions) {
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!((a.star - b.star).abs() < 1e-5, "{} vs {}", a.star, b.star);
        assert!((a.sky - b.sky).abs() < 1e-5);
    }
}

#[test]
fn test_dark_size_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions()).with_dark_template("dark.fits");
    let path = new_log(dir.path(), &setup);
    let source = source_with_frames(1).with(
        "dark.fits",
        frame(Image::new_filled(32, 32, 0.0), FrameHeader::default()),
    );

    let mut session = ReductionSession::open(&path, &source).unwrap();
    let err = session.run(&source, &SessionConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::DarkMismatch { .. }));
}

#[test]
fn test_missing_dark_template_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let setup = setup_with(good_regions()).with_dark_template("absent.fits");
    let path = new_log(dir.path(), &setup);
    let err = ReductionSession::open(&path, &MemorySource::new()).unwrap_err();
    assert!(matches!(err, SessionError::Frame { .. }));
}

#[test]
fn test_mid_exposure_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let path = new_log(dir.path(), &setup_with(good_regions()));
    let source = source_with_frames(2);

    let config = SessionConfig {
        time_anchor: TimeAnchor::MidExposure,
        ..Default::default()
    };
    let mut session = ReductionSession::open(&path, &source).unwrap();
    session.run(&source, &config).unwrap();

    let times: Vec<String> = records(&path)
        .iter()
        .map(|l| l.split_whitespace().next().unwrap().to_string())
        .collect();
    assert_eq!(times, vec!["5", "35"]);
}

#[test]
fn test_first_frame_start() {
    let source = source_with_frames(3);
    let start = first_frame_start(&source, "run_*.fits").unwrap();
    assert_eq!(start, session_start());

    let err = first_frame_start(&source, "nothing_*.fits").unwrap_err();
    assert!(matches!(err, SessionError::Frame { .. }));
}
