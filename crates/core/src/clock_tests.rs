// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn stamp_ordering() {
    assert!(Stamp::new(200, 0) > Stamp::new(100, 5));
    assert!(Stamp::new(100, 2) > Stamp::new(100, 1));
}

#[test]
fn stamp_display_roundtrip() {
    let stamp = Stamp::new(1_700_000_000_000, 3);
    let text = stamp.to_string();
    assert_eq!(text, "1700000000000-3");
    assert_eq!(text.parse::<Stamp>().unwrap(), stamp);
}

#[parameterized(
    missing_counter = { "1000" },
    bad_wall = { "abc-1" },
    bad_counter = { "1000-x" },
)]
fn stamp_parse_rejects(input: &str) {
    assert!(input.parse::<Stamp>().is_err());
}

#[test]
fn stamp_to_datetime() {
    let stamp = Stamp::new(1_000, 0);
    assert_eq!(stamp.to_datetime().timestamp_millis(), 1_000);
}

#[test]
fn stamp_clock_advances_with_wall_clock() {
    let clock = ManualClock::new(1_000);
    let stamps = StampClock::new(Arc::new(clock.clone()));

    assert_eq!(stamps.next(), Stamp::new(1_000, 0));
    clock.advance(5);
    assert_eq!(stamps.next(), Stamp::new(1_005, 0));
}

#[test]
fn stamp_clock_counts_within_same_millisecond() {
    let clock = ManualClock::new(1_000);
    let stamps = StampClock::new(Arc::new(clock));

    let a = stamps.next();
    let b = stamps.next();
    let c = stamps.next();
    assert!(a < b && b < c);
    assert_eq!(c, Stamp::new(1_000, 2));
}

#[test]
fn stamp_clock_survives_backwards_clock() {
    let clock = ManualClock::new(5_000);
    let stamps = StampClock::new(Arc::new(clock.clone()));

    let before = stamps.next();
    clock.set(1_000);
    let after = stamps.next();

    assert!(after > before);
    assert_eq!(after.wall_ms, 5_000);
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new(10);
    let other = clock.clone();
    clock.advance(90);
    assert_eq!(other.now_ms(), 100);
    assert_eq!(other.now().timestamp_millis(), 100);
}
