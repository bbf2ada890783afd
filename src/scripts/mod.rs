//! Type-safe host script argument modules.
//!
//! This module contains structs that implement `ScriptArgs` for each host script.
//! Each struct maps Rust fields to the exact `{placeholder}` tokens expected by
//! the corresponding ExtendScript body under `scripts/host/`.

pub mod layer;
pub mod project;
pub mod session;

use crate::script_traits::number;

/// Where a layer sits on its composition's timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTiming {
    /// Layer start in composition seconds
    pub start_time: f64,
    /// Offset of the in point from the start
    pub in_point: f64,
    /// Time stretch in percent
    pub stretch: f64,
    /// Absolute out point in composition seconds
    pub out_point: f64,
}

impl LayerTiming {
    /// Unstretched layer covering `[start, start + duration]`.
    pub fn span(start: f64, duration: f64) -> Self {
        Self {
            start_time: start,
            in_point: 0.0,
            stretch: 100.0,
            out_point: start + duration,
        }
    }

    fn replacements(&self) -> [(&'static str, String); 4] {
        [
            ("start_time", number(self.start_time)),
            ("in_point", number(self.in_point)),
            ("stretch", number(self.stretch)),
            ("out_point", number(self.out_point)),
        ]
    }
}
