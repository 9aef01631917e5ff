//! Operators whose output depends on earlier cycles.

use cf_core::{seconds, ExprId, FloatKey, Time, Value};

use crate::arena::ExprArena;
use crate::error::ExprResult;
use crate::node::ExprKind;

impl ExprArena {
    /// First-order low pass with the given time constant.
    pub fn smooth(&mut self, input: ExprId, time_constant: Time) -> ExprResult<ExprId> {
        self.build(ExprKind::Smooth {
            input,
            time_constant: FloatKey::new(seconds(time_constant)),
        })
    }

    /// Follow `input` changing by at most `max_rate` units per second.
    pub fn rate_limit(&mut self, input: ExprId, max_rate: f64) -> ExprResult<ExprId> {
        self.build(ExprKind::RateLimit {
            input,
            max_rate: FloatKey::new(max_rate),
        })
    }

    /// Value of `input` in the previous cycle, `initial` in the first one.
    ///
    /// This is the only node that may close a feedback loop in the network.
    pub fn pre(&mut self, input: ExprId, initial: Value) -> ExprResult<ExprId> {
        self.build(ExprKind::Pre { input, initial })
    }

    /// True in the cycle where a boolean changes in the given direction.
    pub fn edge(&mut self, input: ExprId, rising: bool) -> ExprResult<ExprId> {
        self.build(ExprKind::Edge { input, rising })
    }

    pub fn rising(&mut self, input: ExprId) -> ExprResult<ExprId> {
        self.edge(input, true)
    }

    pub fn falling(&mut self, input: ExprId) -> ExprResult<ExprId> {
        self.edge(input, false)
    }
}
