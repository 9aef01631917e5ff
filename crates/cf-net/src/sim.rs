//! Reference cycle simulator.
//!
//! Executes a validated fragment on the host, one cycle per [`NetSimulator::step`].
//! Every block is evaluated once per cycle in evaluation order. Stateful
//! blocks behave as follows:
//!
//! - `Smooth`: `y += (x - y) * min(1, dt / tau)`, `y = x` in the first cycle
//! - `RateLimit`: `y` moves toward `x` by at most `rate * dt`, `y = x` in the first cycle
//! - `Pre`: outputs the value its input had at the end of the previous cycle
//! - `Edge`: compares against the previous cycle (initially `false`)
//! - `Latch`: set wins over reset, holds otherwise
//! - `Timer`: true once the input has been true for `duration` seconds
//! - `PersistStore`: slot writes become visible in the next cycle

use std::collections::HashMap;

use cf_core::ops::{
    apply_binary, apply_compare, apply_compose, apply_index, apply_limit, apply_pack, apply_unary,
};
use cf_core::{BlockId, ClockSignal, DataKind, PortId, Value};
use tracing::trace;

use crate::block::{Block, Primitive};
use crate::error::{NetError, NetResult};
use crate::fragment::NetFragment;

const TIMER_EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
enum BlockState {
    Filter(f64),
    Delay(Value),
    Edge(bool),
    Latch(bool),
    /// Seconds the input has been continuously true.
    Timer(Option<f64>),
}

/// Cycle-by-cycle evaluator for a [`NetFragment`].
#[derive(Debug)]
pub struct NetSimulator<'a> {
    fragment: &'a NetFragment,
    order: Vec<BlockId>,
    period: f64,
    time: f64,
    cycle: u64,
    values: HashMap<PortId, Value>,
    state: HashMap<BlockId, BlockState>,
    inputs: HashMap<String, Value>,
    sensors: HashMap<String, Value>,
    slots: HashMap<u32, Value>,
}

impl<'a> NetSimulator<'a> {
    /// Validate the fragment and prepare a simulator with cycle length
    /// `period` seconds.
    pub fn new(fragment: &'a NetFragment, period: f64) -> NetResult<Self> {
        if !(period.is_finite() && period > 0.0) {
            return Err(NetError::InvalidArg {
                what: "cycle period must be positive",
            });
        }
        fragment.validate()?;
        let order = fragment.evaluation_order()?;
        Ok(Self {
            fragment,
            order,
            period,
            time: 0.0,
            cycle: 0,
            values: HashMap::new(),
            state: HashMap::new(),
            inputs: HashMap::new(),
            sensors: HashMap::new(),
            slots: HashMap::new(),
        })
    }

    pub fn set_input(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.inputs.insert(name.into(), value.into());
    }

    pub fn set_sensor(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.sensors.insert(name.into(), value.into());
    }

    pub fn set_slot(&mut self, slot: u32, value: impl Into<Value>) {
        self.slots.insert(slot, value.into());
    }

    pub fn slot(&self, slot: u32) -> Option<&Value> {
        self.slots.get(&slot)
    }

    /// Time at the start of the next cycle.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Value of an output port after the last cycle.
    pub fn value(&self, port: PortId) -> Option<&Value> {
        self.values.get(&port)
    }

    pub fn double(&self, port: PortId) -> Option<f64> {
        self.value(port).and_then(Value::as_double)
    }

    pub fn boolean(&self, port: PortId) -> Option<bool> {
        self.value(port).and_then(Value::as_bool)
    }

    /// Value of a named network output after the last cycle.
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.fragment.output(name).and_then(|p| self.value(p))
    }

    /// Run `n` cycles.
    pub fn run(&mut self, n: usize) -> NetResult<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Evaluate one cycle.
    pub fn step(&mut self) -> NetResult<()> {
        let fragment = self.fragment;
        let order = self.order.clone();
        for id in &order {
            let block = fragment.block(*id)?;
            if block.primitive.is_delay() || block.primitive.is_sink() {
                if let Primitive::Pre { initial } = &block.primitive {
                    let out = match self.state.get(id) {
                        Some(BlockState::Delay(v)) => v.clone(),
                        _ => initial.clone(),
                    };
                    self.store(block, out)?;
                }
                continue;
            }
            let args = self.gather(block)?;
            let out = self.evaluate(block, &args)?;
            self.store(block, out)?;
        }

        // End of cycle: latch delays and persisted stores.
        for id in &order {
            let block = fragment.block(*id)?;
            match &block.primitive {
                Primitive::Pre { .. } => {
                    let v = self.gather(block)?.remove(0);
                    self.state.insert(*id, BlockState::Delay(v));
                }
                Primitive::PersistStore { slot } => {
                    let v = self.gather(block)?.remove(0);
                    self.slots.insert(*slot, v);
                }
                _ => {}
            }
        }

        trace!(cycle = self.cycle, time = self.time, "simulated cycle");
        self.cycle += 1;
        self.time += self.period;
        Ok(())
    }

    fn gather(&self, block: &Block) -> NetResult<Vec<Value>> {
        block
            .inputs
            .iter()
            .map(|input| {
                self.fragment
                    .producer(*input)
                    .and_then(|p| self.values.get(&p))
                    .cloned()
                    .ok_or_else(|| NetError::Simulation {
                        what: format!("input {input} of block {} has no value", block.id),
                    })
            })
            .collect()
    }

    fn store(&mut self, block: &Block, value: Value) -> NetResult<()> {
        let port = block.output.ok_or_else(|| NetError::Simulation {
            what: format!("block {} has no output", block.id),
        })?;
        self.values.insert(port, value);
        Ok(())
    }

    fn output_kind(&self, block: &Block) -> NetResult<DataKind> {
        let port = block.output.ok_or_else(|| NetError::Simulation {
            what: format!("block {} has no output", block.id),
        })?;
        Ok(self.fragment.port(port)?.kind)
    }

    fn evaluate(&mut self, block: &Block, args: &[Value]) -> NetResult<Value> {
        let dt = self.period;
        let fail = || NetError::Simulation {
            what: format!(
                "'{}' block {} cannot evaluate {:?}",
                block.primitive.name(),
                block.id,
                args
            ),
        };
        let out = match (&block.primitive, args) {
            (Primitive::Constant { value }, []) => value.clone(),
            (Primitive::Input { name }, []) => match self.inputs.get(name) {
                Some(v) => v.clone(),
                None => Value::zero(self.output_kind(block)?),
            },
            (Primitive::Sensor { name, .. }, []) => match self.sensors.get(name) {
                Some(v) => v.clone(),
                None => Value::zero(self.output_kind(block)?),
            },
            (Primitive::PersistLoad { slot }, []) => match self.slots.get(slot) {
                Some(v) => v.clone(),
                None => Value::zero(self.output_kind(block)?),
            },
            (Primitive::Clock { signal }, []) => match signal {
                ClockSignal::Time => Value::Double(self.time),
                ClockSignal::Period => Value::Double(dt),
            },
            (Primitive::Unary { op }, [x]) => apply_unary(*op, x).ok_or_else(fail)?,
            (Primitive::Binary { op }, [a, b]) => apply_binary(*op, a, b).ok_or_else(fail)?,
            (Primitive::Compare { op }, [a, b]) => apply_compare(*op, a, b).ok_or_else(fail)?,
            (Primitive::Select, [c, t, f]) => {
                if c.as_bool().ok_or_else(fail)? {
                    t.clone()
                } else {
                    f.clone()
                }
            }
            (Primitive::Limit, [v, lo, hi]) => apply_limit(v, lo, hi).ok_or_else(fail)?,
            (Primitive::Index { index }, [x]) => apply_index(x, *index).ok_or_else(fail)?,
            (Primitive::Pack, parts) => apply_pack(parts).ok_or_else(fail)?,
            (Primitive::Compose { kind }, parts) => apply_compose(*kind, parts).ok_or_else(fail)?,
            (Primitive::Identity, [x]) => x.clone(),
            (Primitive::Smooth { time_constant }, [x]) => {
                let x = x.as_double().ok_or_else(fail)?;
                let y = match self.state.get(&block.id) {
                    Some(BlockState::Filter(y)) => y + (x - y) * (dt / time_constant).min(1.0),
                    _ => x,
                };
                self.state.insert(block.id, BlockState::Filter(y));
                Value::Double(y)
            }
            (Primitive::RateLimit { max_rate }, [x]) => {
                let x = x.as_double().ok_or_else(fail)?;
                let step = max_rate * dt;
                let y = match self.state.get(&block.id) {
                    Some(BlockState::Filter(y)) => y + (x - y).clamp(-step, step),
                    _ => x,
                };
                self.state.insert(block.id, BlockState::Filter(y));
                Value::Double(y)
            }
            (Primitive::Edge { rising }, [x]) => {
                let now = x.as_bool().ok_or_else(fail)?;
                let before = matches!(self.state.get(&block.id), Some(BlockState::Edge(true)));
                self.state.insert(block.id, BlockState::Edge(now));
                Value::Boolean(if *rising { now && !before } else { !now && before })
            }
            (Primitive::Latch, [set, reset]) => {
                let set = set.as_bool().ok_or_else(fail)?;
                let reset = reset.as_bool().ok_or_else(fail)?;
                let held = matches!(self.state.get(&block.id), Some(BlockState::Latch(true)));
                let on = set || (held && !reset);
                self.state.insert(block.id, BlockState::Latch(on));
                Value::Boolean(on)
            }
            (Primitive::Timer { duration }, [x]) => {
                let on = x.as_bool().ok_or_else(fail)?;
                let elapsed = match (on, self.state.get(&block.id)) {
                    (false, _) => None,
                    (true, Some(BlockState::Timer(Some(e)))) => Some(e + dt),
                    (true, _) => Some(0.0),
                };
                self.state.insert(block.id, BlockState::Timer(elapsed));
                Value::Boolean(elapsed.is_some_and(|e| e + TIMER_EPS >= *duration))
            }
            (Primitive::AnyOf, terms) => {
                let mut any = false;
                for t in terms {
                    any |= t.as_bool().ok_or_else(fail)?;
                }
                Value::Boolean(any)
            }
            (Primitive::AllOf, terms) => {
                let mut all = true;
                for t in terms {
                    all &= t.as_bool().ok_or_else(fail)?;
                }
                Value::Boolean(all)
            }
            _ => return Err(fail()),
        };
        Ok(out)
    }
}
