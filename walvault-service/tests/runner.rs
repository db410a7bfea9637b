use std::collections::HashSet;

use walvault_service::wal::{
    MissingSegmentStatus, RunnerError, ScanConfig, ScannedSegmentStatus, SegmentRunner,
    SegmentScanner, SegmentsSequence, TimelineSwitchMap, classify_missing_segment,
};
use walvault_types::{SegmentDescription, SegmentNo};

const MIN: u64 = 5000;
const MAX: u64 = 5050;

fn set(numbers: impl IntoIterator<Item = u64>) -> HashSet<SegmentDescription> {
    numbers
        .into_iter()
        .map(|number| SegmentDescription::new(1, SegmentNo(number)))
        .collect()
}

#[test]
fn full_set_yields_every_segment_once() {
    let known = set(MIN..MAX);
    let switches = TimelineSwitchMap::new();
    let mut runner = SegmentRunner::new(
        SegmentDescription::new(1, SegmentNo(MAX)),
        SegmentNo(MIN),
        &known,
        &switches,
    );

    let mut visited = Vec::new();
    let stop = loop {
        match runner.next() {
            Ok(segment) => visited.push(segment.number.get()),
            Err(error) => break error,
        }
    };

    let expected: Vec<u64> = (MIN..MAX).rev().collect();
    assert_eq!(visited, expected);
    assert_eq!(
        stop,
        RunnerError::ReachedStopSegment {
            stop: SegmentNo(MIN)
        }
    );
    assert_eq!(runner.next(), Err(stop));
}

#[test]
fn reports_holes_without_advancing() {
    let holes = [5001, 5003, 5004, 5010];
    let known = set((MIN..MAX).filter(|number| !holes.contains(number)));
    let switches = TimelineSwitchMap::new();
    let mut runner = SegmentRunner::new(
        SegmentDescription::new(1, SegmentNo(MAX)),
        SegmentNo(MIN),
        &known,
        &switches,
    );

    let mut reported = Vec::new();
    loop {
        match runner.next() {
            Ok(_) => {}
            Err(RunnerError::SegmentNotFound(missing)) => {
                let position = runner.current();
                assert_eq!(
                    runner.next(),
                    Err(RunnerError::SegmentNotFound(missing)),
                    "runner must not move past a hole on its own"
                );
                assert_eq!(runner.current(), position);

                reported.push(missing.number.get());
                assert_eq!(runner.force_move_next(), Ok(missing));
            }
            Err(RunnerError::ReachedStopSegment { .. }) => break,
        }
    }

    reported.reverse();
    assert_eq!(reported, holes);
}

#[test]
fn scan_and_sequence_agree_on_holes() {
    let holes = [5001, 5003, 5004, 5010];
    let numbers: Vec<u64> = (MIN..MAX).filter(|number| !holes.contains(number)).collect();
    let known = set(numbers.iter().copied());
    let switches = TimelineSwitchMap::new();

    let mut sequence = SegmentsSequence::new(1, SegmentNo(numbers[0]));
    for &number in &numbers[1..] {
        sequence.add_segment_no(SegmentNo(number));
    }

    let mut runner = SegmentRunner::new(
        SegmentDescription::new(1, SegmentNo(MAX)),
        SegmentNo(MIN),
        &known,
        &switches,
    );
    let mut scanner = SegmentScanner::new(&mut runner);
    scanner.scan(ScanConfig::unlimited(MissingSegmentStatus::Lost));

    let mut scanned = scanner.missing_segments();
    scanned.reverse();
    assert_eq!(scanned, sequence.find_missing_ranges(MissingSegmentStatus::Lost));
    assert_eq!(scanned.len(), 3);
    assert_eq!(
        (scanned[1].start_segment, scanned[1].end_segment),
        (SegmentNo(5003), SegmentNo(5004))
    );
}

#[test]
fn refined_statuses_match_three_pass_scan() {
    let window = 4;
    let known = set([2, 3, 8, 9, 10, 14]);
    let switches = TimelineSwitchMap::new();
    let start = SegmentDescription::new(1, SegmentNo(17));

    // Delayed down to the newest stored segment, then uploading within the window, then lost.
    let mut runner = SegmentRunner::new(start, SegmentNo::FIRST, &known, &switches);
    let mut passes = SegmentScanner::new(&mut runner);
    passes.scan(ScanConfig {
        unlimited_scan: true,
        scan_segments_limit: 0,
        stop_on_first_found: true,
        missing_segment_status: MissingSegmentStatus::ProbablyDelayed,
    });
    passes.scan(ScanConfig {
        unlimited_scan: false,
        scan_segments_limit: window as usize,
        stop_on_first_found: false,
        missing_segment_status: MissingSegmentStatus::ProbablyUploading,
    });
    passes.scan(ScanConfig::unlimited(MissingSegmentStatus::Lost));
    let three_pass = passes.into_runs();

    let mut runner = SegmentRunner::new(start, SegmentNo::FIRST, &known, &switches);
    let mut single = SegmentScanner::new(&mut runner);
    single.scan(ScanConfig::unlimited(MissingSegmentStatus::ProbablyDelayed));
    single.refine_missing_statuses(window);
    let refined = single.into_runs();

    assert_eq!(refined, three_pass);
    assert_eq!(refined.len(), 7);
    assert_eq!(
        ScannedSegmentStatus::from(classify_missing_segment(
            SegmentNo(11),
            Some(SegmentNo(14)),
            window
        )),
        refined[4].status
    );
}
