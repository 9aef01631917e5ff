//! Network fragment structure.
//!
//! The fragment is responsible for:
//! - Allocating blocks and their typed ports
//! - Validating connections (kind agreement, single producer per input)
//! - Computing evaluation order
//! - Naming network outputs and registering state/exception ports

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cf_core::{BlockId, DataKind, Id, PortId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::block::{Block, Primitive};
use crate::error::{NetError, NetResult};
use crate::port::{Port, PortDirection};
use crate::registry::StateRegistry;

/// A wire from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: PortId,
    pub to: PortId,
}

/// Mutable network builder owned by one compile session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetFragment {
    blocks: Vec<Block>,
    ports: Vec<Port>,
    connections: Vec<Connection>,
    /// Producer of each connected input port.
    #[serde(skip)]
    producers: HashMap<PortId, PortId>,
    outputs: BTreeMap<String, PortId>,
    states: StateRegistry,
}

impl NetFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block with one input port per entry of `inputs` and an output
    /// port of kind `output` (`None` for sinks).
    pub fn add_block(
        &mut self,
        primitive: Primitive,
        inputs: &[DataKind],
        output: Option<DataKind>,
    ) -> NetResult<BlockId> {
        if let Some(n) = primitive.num_inputs() {
            if n != inputs.len() {
                return Err(NetError::InvalidConnection {
                    what: format!(
                        "'{}' takes {n} inputs, {} given",
                        primitive.name(),
                        inputs.len()
                    ),
                });
            }
        }
        if primitive.is_sink() != output.is_none() {
            return Err(NetError::InvalidArg {
                what: "only sinks have no output port",
            });
        }

        let id = Id::next_for("block", self.blocks.len())?;
        let input_ports = inputs
            .iter()
            .enumerate()
            .map(|(slot, kind)| self.add_port(id, PortDirection::Input, *kind, slot))
            .collect::<NetResult<Vec<_>>>()?;
        let output_port = output
            .map(|kind| self.add_port(id, PortDirection::Output, kind, 0))
            .transpose()?;
        trace!(block = %id, primitive = primitive.name(), "added block");
        self.blocks.push(Block {
            id,
            primitive,
            inputs: input_ports,
            output: output_port,
        });
        Ok(id)
    }

    fn add_port(
        &mut self,
        block: BlockId,
        direction: PortDirection,
        kind: DataKind,
        slot: usize,
    ) -> NetResult<PortId> {
        let id = Id::next_for("port", self.ports.len())?;
        self.ports.push(Port {
            id,
            block,
            direction,
            kind,
            slot,
        });
        Ok(id)
    }

    /// Source block with a single output; returns the output port.
    pub fn add_source(&mut self, primitive: Primitive, kind: DataKind) -> NetResult<PortId> {
        let block = self.add_block(primitive, &[], Some(kind))?;
        self.output_port(block)
    }

    /// Block fed by `inputs` (in slot order); returns its output port.
    pub fn add_wired(
        &mut self,
        primitive: Primitive,
        inputs: &[PortId],
        output: DataKind,
    ) -> NetResult<PortId> {
        let kinds = inputs
            .iter()
            .map(|p| self.port(*p).map(|port| port.kind))
            .collect::<NetResult<Vec<_>>>()?;
        let block = self.add_block(primitive, &kinds, Some(output))?;
        let targets = self.block(block)?.inputs.clone();
        for (from, to) in inputs.iter().zip(targets) {
            self.connect(*from, to)?;
        }
        self.output_port(block)
    }

    pub fn block(&self, id: BlockId) -> NetResult<&Block> {
        self.blocks
            .get(id.slot())
            .ok_or_else(|| NetError::InvalidReference {
                what: format!("block {id}"),
            })
    }

    pub fn port(&self, id: PortId) -> NetResult<&Port> {
        self.ports
            .get(id.slot())
            .ok_or_else(|| NetError::InvalidReference {
                what: format!("port {id}"),
            })
    }

    pub fn output_port(&self, block: BlockId) -> NetResult<PortId> {
        self.block(block)?
            .output
            .ok_or_else(|| NetError::InvalidReference {
                what: format!("block {block} has no output"),
            })
    }

    /// Block that owns an output port.
    pub fn owner(&self, port: PortId) -> NetResult<&Block> {
        let block = self.port(port)?.block;
        self.block(block)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connect an output port to an input port of the same kind.
    pub fn connect(&mut self, from: PortId, to: PortId) -> NetResult<()> {
        let src = self.port(from)?;
        let dst = self.port(to)?;
        if !src.is_output() || !dst.is_input() {
            return Err(NetError::InvalidConnection {
                what: format!("{from} -> {to} must run from an output to an input"),
            });
        }
        if src.kind != dst.kind {
            return Err(NetError::InvalidConnection {
                what: format!(
                    "incompatible port kinds: {from} carries {} but {to} expects {}",
                    src.kind, dst.kind
                ),
            });
        }
        if let Some(existing) = self.producers.get(&to) {
            return Err(NetError::InvalidConnection {
                what: format!("input {to} is already driven by {existing}"),
            });
        }
        self.producers.insert(to, from);
        self.connections.push(Connection { from, to });
        Ok(())
    }

    /// Output port driving an input port.
    pub fn producer(&self, input: PortId) -> Option<PortId> {
        self.producers.get(&input).copied()
    }

    pub fn is_connected(&self, input: PortId) -> bool {
        self.producers.contains_key(&input)
    }

    /// Name an output port so the executor can stream it.
    pub fn expose(&mut self, name: impl Into<String>, port: PortId) -> NetResult<()> {
        let name = name.into();
        if !self.port(port)?.is_output() {
            return Err(NetError::InvalidReference {
                what: format!("'{name}' must name an output port"),
            });
        }
        if let Some(existing) = self.outputs.get(&name).copied() {
            if existing != port {
                return Err(NetError::InvalidConnection {
                    what: format!("output '{name}' is already bound to {existing}"),
                });
            }
        }
        self.outputs.insert(name, port);
        Ok(())
    }

    pub fn output(&self, name: &str) -> Option<PortId> {
        self.outputs.get(name).copied()
    }

    pub fn outputs(&self) -> &BTreeMap<String, PortId> {
        &self.outputs
    }

    /// Names of the network inputs the executor must set.
    pub fn input_names(&self) -> BTreeSet<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match &b.primitive {
                Primitive::Input { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> &StateRegistry {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateRegistry {
        &mut self.states
    }

    /// Topological block order. Edges into delay blocks are ignored, so the
    /// only cycles allowed are those broken by a `Pre` block.
    pub fn evaluation_order(&self) -> NetResult<Vec<BlockId>> {
        let mut adj: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let mut in_degree: Vec<usize> = vec![0; self.blocks.len()];

        for c in &self.connections {
            let from = self.port(c.from)?.block;
            let to = self.port(c.to)?.block;
            if self.block(to)?.primitive.is_delay() {
                continue;
            }
            adj.entry(from).or_default().push(to);
            in_degree[to.slot()] += 1;
        }

        // Kahn's algorithm; lowest id first keeps the order deterministic.
        let mut ready: BTreeSet<BlockId> = self
            .blocks
            .iter()
            .filter(|b| in_degree[b.id.slot()] == 0)
            .map(|b| b.id)
            .collect();
        let mut order = Vec::with_capacity(self.blocks.len());

        while let Some(block) = ready.pop_first() {
            order.push(block);
            if let Some(next) = adj.get(&block) {
                for n in next {
                    let deg = &mut in_degree[n.slot()];
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(*n);
                    }
                }
            }
        }

        if order.len() != self.blocks.len() {
            return Err(NetError::TopologyError {
                what: "fragment contains a cycle without a delay".to_string(),
            });
        }
        Ok(order)
    }

    /// Every input is connected and every cycle passes through a delay.
    pub fn validate(&self) -> NetResult<()> {
        for port in self.ports.iter().filter(|p| p.is_input()) {
            if !self.is_connected(port.id) {
                let block = self.block(port.block)?;
                return Err(NetError::TopologyError {
                    what: format!(
                        "input {} of '{}' block {} is not connected",
                        port.slot,
                        block.primitive.name(),
                        block.id
                    ),
                });
            }
        }
        self.evaluation_order()?;
        Ok(())
    }

    /// Debug view as pretty-printed JSON. Not an executor format.
    pub fn to_json(&self) -> NetResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| NetError::Export(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use cf_core::{BinaryOp, UnaryOp, Value};

    use super::*;

    fn constant(frag: &mut NetFragment, v: f64) -> PortId {
        frag.add_source(
            Primitive::Constant {
                value: Value::Double(v),
            },
            DataKind::Double,
        )
        .unwrap()
    }

    #[test]
    fn empty_fragment() {
        let frag = NetFragment::new();
        assert!(frag.blocks().is_empty());
        assert!(frag.validate().is_ok());
    }

    #[test]
    fn kinds_must_agree() {
        let mut frag = NetFragment::new();
        let a = constant(&mut frag, 1.0);
        let not = frag
            .add_block(
                Primitive::Unary {
                    op: cf_core::UnaryOp::Not,
                },
                &[DataKind::Boolean],
                Some(DataKind::Boolean),
            )
            .unwrap();
        let input = frag.block(not).unwrap().inputs[0];
        let err = frag.connect(a, input).unwrap_err();
        assert!(matches!(err, NetError::InvalidConnection { .. }));
    }

    #[test]
    fn inputs_have_one_producer() {
        let mut frag = NetFragment::new();
        let a = constant(&mut frag, 1.0);
        let b = constant(&mut frag, 2.0);
        let id = frag
            .add_block(Primitive::Identity, &[DataKind::Double], Some(DataKind::Double))
            .unwrap();
        let input = frag.block(id).unwrap().inputs[0];
        frag.connect(a, input).unwrap();
        assert!(frag.connect(b, input).is_err());
        assert_eq!(frag.producer(input), Some(a));
    }

    #[test]
    fn open_inputs_fail_validation() {
        let mut frag = NetFragment::new();
        frag.add_block(Primitive::Identity, &[DataKind::Double], Some(DataKind::Double))
            .unwrap();
        assert!(matches!(
            frag.validate(),
            Err(NetError::TopologyError { .. })
        ));
    }

    #[test]
    fn order_respects_wires() {
        let mut frag = NetFragment::new();
        let a = constant(&mut frag, 1.0);
        let b = constant(&mut frag, 2.0);
        let sum = frag
            .add_wired(Primitive::Binary { op: BinaryOp::Add }, &[a, b], DataKind::Double)
            .unwrap();
        let order = frag.evaluation_order().unwrap();
        let pos = |p: PortId| {
            let block = frag.port(p).unwrap().block;
            order.iter().position(|b| *b == block).unwrap()
        };
        assert!(pos(a) < pos(sum));
        assert!(pos(b) < pos(sum));
    }

    #[test]
    fn delay_breaks_cycles() {
        let mut frag = NetFragment::new();
        let one = constant(&mut frag, 1.0);
        let pre = frag
            .add_block(
                Primitive::Pre {
                    initial: Value::Double(0.0),
                },
                &[DataKind::Double],
                Some(DataKind::Double),
            )
            .unwrap();
        let pre_out = frag.output_port(pre).unwrap();
        let sum = frag
            .add_wired(Primitive::Binary { op: BinaryOp::Add }, &[pre_out, one], DataKind::Double)
            .unwrap();
        let pre_in = frag.block(pre).unwrap().inputs[0];
        frag.connect(sum, pre_in).unwrap();
        assert!(frag.validate().is_ok());

        let mut cyclic = NetFragment::new();
        let id = cyclic
            .add_block(Primitive::Identity, &[DataKind::Double], Some(DataKind::Double))
            .unwrap();
        let out = cyclic.output_port(id).unwrap();
        let input = cyclic.block(id).unwrap().inputs[0];
        cyclic.connect(out, input).unwrap();
        assert!(cyclic.validate().is_err());
    }

    #[test]
    fn edge_detector_does_not_break_cycles() {
        let mut frag = NetFragment::new();
        let edge = frag
            .add_block(
                Primitive::Edge { rising: true },
                &[DataKind::Boolean],
                Some(DataKind::Boolean),
            )
            .unwrap();
        let out = frag.output_port(edge).unwrap();
        let not = frag
            .add_wired(Primitive::Unary { op: UnaryOp::Not }, &[out], DataKind::Boolean)
            .unwrap();
        let input = frag.block(edge).unwrap().inputs[0];
        frag.connect(not, input).unwrap();
        assert!(!Primitive::Edge { rising: true }.is_delay());
        assert!(frag.validate().is_err());
    }

    #[test]
    fn json_view_lists_blocks() {
        let mut frag = NetFragment::new();
        let a = constant(&mut frag, 1.5);
        frag.expose("a", a).unwrap();
        let json = frag.to_json().unwrap();
        assert!(json.contains("\"Constant\""));
        assert!(json.contains("\"a\""));
    }
}
