//! Chart pattern generators
//!
//! Each generator turns an anchor price into an ordered queue of transition
//! events forming a named chart shape. Waypoints are relative ratios around
//! the anchor; durations are candle counts per leg. Structure is
//! deterministic, magnitudes and breakout direction come from the injected
//! RNG, so seeded tests can assert shape invariants without pinning values.

use rand::Rng;

use crate::error::{Result, SimError};
use crate::event::TransitionEvent;

/// A named chart shape the simulation can script onto an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    BullishFlag,
    BearishFlag,
    BullishPennant,
    BearishPennant,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    RisingWedge,
    FallingWedge,
    Triangle,
    Rectangle,
    CupAndHandle,
    InvertedCupAndHandle,
}

impl Pattern {
    /// Every supported pattern, in a stable order
    pub const ALL: [Pattern; 16] = [
        Pattern::BullishFlag,
        Pattern::BearishFlag,
        Pattern::BullishPennant,
        Pattern::BearishPennant,
        Pattern::DoubleTop,
        Pattern::DoubleBottom,
        Pattern::TripleTop,
        Pattern::TripleBottom,
        Pattern::HeadAndShoulders,
        Pattern::InverseHeadAndShoulders,
        Pattern::RisingWedge,
        Pattern::FallingWedge,
        Pattern::Triangle,
        Pattern::Rectangle,
        Pattern::CupAndHandle,
        Pattern::InvertedCupAndHandle,
    ];

    /// Parse a pattern from its wire name (snake_case)
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "bullish_flag" => Ok(Pattern::BullishFlag),
            "bearish_flag" => Ok(Pattern::BearishFlag),
            "bullish_pennant" => Ok(Pattern::BullishPennant),
            "bearish_pennant" => Ok(Pattern::BearishPennant),
            "double_top" => Ok(Pattern::DoubleTop),
            "double_bottom" => Ok(Pattern::DoubleBottom),
            "triple_top" => Ok(Pattern::TripleTop),
            "triple_bottom" => Ok(Pattern::TripleBottom),
            "head_and_shoulders" => Ok(Pattern::HeadAndShoulders),
            "inverse_head_and_shoulders" => Ok(Pattern::InverseHeadAndShoulders),
            "rising_wedge" => Ok(Pattern::RisingWedge),
            "falling_wedge" => Ok(Pattern::FallingWedge),
            "triangle" => Ok(Pattern::Triangle),
            "rectangle" => Ok(Pattern::Rectangle),
            "cup_and_handle" => Ok(Pattern::CupAndHandle),
            "inverted_cup_and_handle" => Ok(Pattern::InvertedCupAndHandle),
            other => Err(SimError::InvalidArgument(format!(
                "unknown pattern name: {other}"
            ))),
        }
    }

    /// Wire name of this pattern
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::BullishFlag => "bullish_flag",
            Pattern::BearishFlag => "bearish_flag",
            Pattern::BullishPennant => "bullish_pennant",
            Pattern::BearishPennant => "bearish_pennant",
            Pattern::DoubleTop => "double_top",
            Pattern::DoubleBottom => "double_bottom",
            Pattern::TripleTop => "triple_top",
            Pattern::TripleBottom => "triple_bottom",
            Pattern::HeadAndShoulders => "head_and_shoulders",
            Pattern::InverseHeadAndShoulders => "inverse_head_and_shoulders",
            Pattern::RisingWedge => "rising_wedge",
            Pattern::FallingWedge => "falling_wedge",
            Pattern::Triangle => "triangle",
            Pattern::Rectangle => "rectangle",
            Pattern::CupAndHandle => "cup_and_handle",
            Pattern::InvertedCupAndHandle => "inverted_cup_and_handle",
        }
    }

    /// Generate the event queue for this shape around `anchor`.
    ///
    /// The first event always starts at `anchor`; the returned queue is
    /// finite and non-empty.
    pub fn generate(&self, anchor: f64, rng: &mut impl Rng) -> Vec<TransitionEvent> {
        match self {
            Pattern::BullishFlag => bullish_flag(anchor, rng),
            Pattern::BearishFlag => bearish_flag(anchor, rng),
            Pattern::BullishPennant => bullish_pennant(anchor),
            Pattern::BearishPennant => bearish_pennant(anchor),
            Pattern::DoubleTop => double_top(anchor),
            Pattern::DoubleBottom => double_bottom(anchor),
            Pattern::TripleTop => triple_top(anchor),
            Pattern::TripleBottom => triple_bottom(anchor),
            Pattern::HeadAndShoulders => head_and_shoulders(anchor),
            Pattern::InverseHeadAndShoulders => inverse_head_and_shoulders(anchor),
            Pattern::RisingWedge => rising_wedge(anchor),
            Pattern::FallingWedge => falling_wedge(anchor),
            Pattern::Triangle => triangle(anchor),
            Pattern::Rectangle => rectangle(anchor),
            Pattern::CupAndHandle => cup_and_handle(anchor),
            Pattern::InvertedCupAndHandle => inverted_cup_and_handle(anchor),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Walk a list of targets, emitting one leg per (target, candles) pair
fn zigzag(events: &mut Vec<TransitionEvent>, mut last: f64, legs: &[(f64, u32)]) -> f64 {
    for &(target, candles) in legs {
        events.push(TransitionEvent::leg(last, target, candles));
        last = target;
    }
    last
}

fn bullish_flag(anchor: f64, rng: &mut impl Rng) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    // Pole excursion of 8-12%
    let pole_top = anchor * rng.gen_range(1.08..=1.12);
    events.push(TransitionEvent::leg(anchor, pole_top, 6));

    let top = pole_top;
    let bottom = pole_top * 0.97;
    let last = zigzag(
        &mut events,
        pole_top,
        &[
            (bottom, 3),
            (top * 0.99, 3),
            (bottom * 1.01, 3),
            (top * 0.985, 3),
        ],
    );

    // Flags break out upward three times out of four
    let breakout = if rng.gen_bool(0.75) {
        pole_top * 1.06
    } else {
        bottom * 0.96
    };
    events.push(TransitionEvent::leg(last, breakout, 4));

    events
}

fn bearish_flag(anchor: f64, rng: &mut impl Rng) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let pole_bottom = anchor * rng.gen_range(0.88..=0.92);
    events.push(TransitionEvent::leg(anchor, pole_bottom, 6));

    let top = pole_bottom * 1.03;
    let bottom = pole_bottom;
    let last = zigzag(
        &mut events,
        pole_bottom,
        &[
            (top, 3),
            (bottom * 1.01, 3),
            (top * 0.995, 3),
            (bottom * 1.02, 3),
        ],
    );

    let breakout = if rng.gen_bool(0.75) {
        pole_bottom * 0.94
    } else {
        top * 1.02
    };
    events.push(TransitionEvent::leg(last, breakout, 4));

    events
}

fn bullish_pennant(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let pole_top = anchor * 1.1;
    events.push(TransitionEvent::leg(anchor, pole_top, 6));

    // Converging retracements
    let legs: [(f64, u32); 5] = [
        (pole_top * 0.96, 4),
        (pole_top * 0.995, 3),
        (pole_top * 0.97, 3),
        (pole_top * 0.99, 2),
        (pole_top * 0.98, 2),
    ];
    let last = zigzag(&mut events, pole_top, &legs);

    events.push(TransitionEvent::leg(last, pole_top * 1.08, 5));
    events
}

fn bearish_pennant(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let pole_bottom = anchor * 0.9;
    events.push(TransitionEvent::leg(anchor, pole_bottom, 6));

    let legs: [(f64, u32); 5] = [
        (pole_bottom * 1.03, 4),
        (pole_bottom * 0.985, 3),
        (pole_bottom * 1.02, 3),
        (pole_bottom * 0.99, 2),
        (pole_bottom * 1.01, 2),
    ];
    let last = zigzag(&mut events, pole_bottom, &legs);

    events.push(TransitionEvent::leg(last, pole_bottom * 0.9, 5));
    events
}

fn double_top(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let top1 = anchor * 1.12;
    let neckline = anchor * 1.03;
    let top2 = top1 * 0.997;

    events.push(TransitionEvent::leg(anchor, top1, 10));
    events.push(TransitionEvent::leg(top1, neckline, 8));
    events.push(TransitionEvent::leg(neckline, top2, 9));
    events.push(TransitionEvent::leg(top2, neckline, 7));

    // Measured move projects the pattern height below the neckline
    let measured_move = top1 - neckline;
    let target = (neckline - measured_move).max(0.0);
    events.push(TransitionEvent::leg(neckline, target, 12));

    events
}

fn double_bottom(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let bottom1 = anchor * 0.88;
    let neckline = anchor * 0.97;
    let bottom2 = bottom1 * 1.01;

    events.push(TransitionEvent::leg(anchor, bottom1, 10));
    events.push(TransitionEvent::leg(bottom1, neckline, 8));
    events.push(TransitionEvent::leg(neckline, bottom2, 9));
    events.push(TransitionEvent::leg(bottom2, neckline, 7));

    let measured_move = neckline - bottom1;
    events.push(TransitionEvent::leg(neckline, neckline + measured_move, 12));

    events
}

fn triple_top(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let top1 = anchor * 1.12;
    let low1 = anchor * 1.03;
    let top2 = top1 * 0.998;
    let low2 = low1 * 0.998;
    let top3 = top1 * 1.002;

    events.push(TransitionEvent::leg(anchor, top1, 10));
    events.push(TransitionEvent::leg(top1, low1, 8));
    events.push(TransitionEvent::leg(low1, top2, 9));
    events.push(TransitionEvent::leg(top2, low2, 7));
    events.push(TransitionEvent::leg(low2, top3, 9));
    events.push(TransitionEvent::leg(top3, low2, 8));

    let measured_move = top1 - low1;
    events.push(TransitionEvent::leg(low2, low1 - measured_move, 12));

    events
}

fn triple_bottom(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let bottom1 = anchor * 0.88;
    let high1 = anchor * 0.97;
    let bottom2 = bottom1 * 1.01;
    let high2 = high1 * 0.998;
    let bottom3 = bottom1 * 0.997;

    events.push(TransitionEvent::leg(anchor, bottom1, 10));
    events.push(TransitionEvent::leg(bottom1, high1, 9));
    events.push(TransitionEvent::leg(high1, bottom2, 8));
    events.push(TransitionEvent::leg(bottom2, high2, 9));
    events.push(TransitionEvent::leg(high2, bottom3, 8));
    events.push(TransitionEvent::leg(bottom3, high2, 9));

    let measured_move = high1 - bottom1;
    events.push(TransitionEvent::leg(high2, high1 + measured_move, 12));

    events
}

fn head_and_shoulders(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let left_shoulder = anchor * 1.08;
    let neckline = anchor * 1.03;
    let head = anchor * 1.2;
    let right_shoulder = left_shoulder * 0.995;

    events.push(TransitionEvent::leg(anchor, left_shoulder, 8));
    events.push(TransitionEvent::leg(left_shoulder, neckline, 6));
    events.push(TransitionEvent::leg(neckline, head, 10));
    events.push(TransitionEvent::leg(head, neckline, 6));
    events.push(TransitionEvent::leg(neckline, right_shoulder, 8));
    events.push(TransitionEvent::leg(right_shoulder, neckline, 6));

    let measured_move = head - neckline;
    let target = (neckline - measured_move).max(0.0);
    events.push(TransitionEvent::leg(neckline, target, 12));

    events
}

fn inverse_head_and_shoulders(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let left_shoulder = anchor * 0.92;
    let neckline = anchor * 0.97;
    let head = anchor * 0.85;
    let right_shoulder = left_shoulder * 1.01;

    events.push(TransitionEvent::leg(anchor, left_shoulder, 10));
    events.push(TransitionEvent::leg(left_shoulder, neckline, 8));
    events.push(TransitionEvent::leg(neckline, head, 10));
    events.push(TransitionEvent::leg(head, neckline, 8));
    events.push(TransitionEvent::leg(neckline, right_shoulder, 9));
    events.push(TransitionEvent::leg(right_shoulder, neckline, 7));

    let measured_move = neckline - head;
    events.push(TransitionEvent::leg(neckline, neckline + measured_move, 12));

    events
}

fn rising_wedge(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let pole_top = anchor * 1.12;
    events.push(TransitionEvent::leg(anchor, pole_top, 10));

    let top1 = pole_top * 1.02;
    let low1 = pole_top * 0.985;
    let top2 = pole_top * 1.04;
    let low2 = pole_top * 0.99;
    let top3 = pole_top * 1.03;
    let low3 = pole_top * 1.005;

    events.push(TransitionEvent::leg(pole_top, top1, 8));
    events.push(TransitionEvent::leg(top1, low1, 7));
    events.push(TransitionEvent::leg(low1, top2, 7));
    events.push(TransitionEvent::leg(top2, low2, 6));
    events.push(TransitionEvent::leg(low2, top3, 6));
    events.push(TransitionEvent::leg(top3, low3, 6));

    let height = pole_top - low1;
    let target = (low3 - height).max(0.0);
    events.push(TransitionEvent::leg(low3, target, 12));

    events
}

fn falling_wedge(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let pole_bottom = anchor * 0.90;
    events.push(TransitionEvent::leg(anchor, pole_bottom, 10));

    let high1 = pole_bottom * 1.03;
    let low1 = pole_bottom * 0.985;
    let high2 = pole_bottom * 1.05;
    let low2 = pole_bottom * 0.99;
    let high3 = pole_bottom * 1.04;
    let low3 = pole_bottom * 1.005;

    events.push(TransitionEvent::leg(pole_bottom, high1, 8));
    events.push(TransitionEvent::leg(high1, low1, 7));
    events.push(TransitionEvent::leg(low1, high2, 7));
    events.push(TransitionEvent::leg(high2, low2, 6));
    events.push(TransitionEvent::leg(low2, high3, 6));
    events.push(TransitionEvent::leg(high3, low3, 6));

    let height = anchor - pole_bottom;
    events.push(TransitionEvent::leg(low3, low3 + height, 12));

    events
}

fn triangle(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let swing_low = anchor * 0.93;
    events.push(TransitionEvent::leg(anchor, swing_low, 10));

    let high1 = anchor * 1.02;
    let low1 = anchor * 0.965;
    let high2 = anchor * 1.015;
    let low2 = anchor * 0.97;
    let high3 = anchor * 1.01;
    let low3 = anchor * 0.975;

    events.push(TransitionEvent::leg(swing_low, high1, 8));
    events.push(TransitionEvent::leg(high1, low1, 7));
    events.push(TransitionEvent::leg(low1, high2, 7));
    events.push(TransitionEvent::leg(high2, low2, 6));
    events.push(TransitionEvent::leg(low2, high3, 6));
    events.push(TransitionEvent::leg(high3, low3, 6));

    let base_height = high1 - low1;
    events.push(TransitionEvent::leg(low3, low3 - base_height, 12));

    events
}

fn rectangle(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let bottom = anchor * 0.94;
    let top = anchor * 1.02;
    let mid = (top + bottom) / 2.0;

    events.push(TransitionEvent::leg(anchor, bottom, 8));
    events.push(TransitionEvent::leg(bottom, top, 7));
    events.push(TransitionEvent::leg(top, mid, 6));
    events.push(TransitionEvent::leg(mid, top, 7));
    events.push(TransitionEvent::leg(top, bottom, 6));
    events.push(TransitionEvent::leg(bottom, mid, 8));

    let height = top - bottom;
    events.push(TransitionEvent::leg(mid, bottom - height, 12));

    events
}

fn cup_and_handle(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let left_bottom1 = anchor * 0.95;
    let left_bottom2 = anchor * 0.92;
    let base_mid = anchor * 0.905;
    let cup_rim = anchor;

    events.push(TransitionEvent::leg(anchor, left_bottom1, 14));
    events.push(TransitionEvent::leg(left_bottom1, left_bottom2, 12));
    events.push(TransitionEvent::leg(left_bottom2, base_mid, 12));
    events.push(TransitionEvent::leg(base_mid, left_bottom2, 12));
    events.push(TransitionEvent::leg(left_bottom2, left_bottom1, 12));
    events.push(TransitionEvent::leg(left_bottom1, cup_rim, 16));

    let handle_pull = cup_rim * 0.98;
    let handle_base = cup_rim * 0.99;
    events.push(TransitionEvent::leg(cup_rim, handle_pull, 10));
    events.push(TransitionEvent::leg(handle_pull, handle_base, 8));

    let height = cup_rim - left_bottom2;
    events.push(TransitionEvent::leg(handle_base, handle_base + height, 18));

    events
}

fn inverted_cup_and_handle(anchor: f64) -> Vec<TransitionEvent> {
    let mut events = Vec::new();

    let top1 = anchor * 1.05;
    let mid1 = anchor * 1.03;
    let cup_peak = anchor * 1.06;

    events.push(TransitionEvent::leg(anchor, top1, 14));
    events.push(TransitionEvent::leg(top1, mid1, 12));
    events.push(TransitionEvent::leg(mid1, cup_peak, 14));
    events.push(TransitionEvent::leg(cup_peak, mid1, 12));
    events.push(TransitionEvent::leg(mid1, top1, 14));

    let handle_start = anchor * 1.02;
    let handle_end = anchor * 1.03;
    events.push(TransitionEvent::leg(top1, handle_start, 10));
    events.push(TransitionEvent::leg(handle_start, handle_end, 8));

    let height = cup_peak - handle_start;
    events.push(TransitionEvent::leg(handle_end, handle_end - height, 10));

    events
}
