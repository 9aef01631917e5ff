//! One compile session: lowers expressions into a single network fragment.

use std::collections::HashMap;
use std::sync::Arc;

use cf_core::{DataKind, ExprId, PortId, UnaryOp, Value};
use cf_expr::{ExprArena, ExprKind, Host, PlaceholderId};
use cf_net::{NetFragment, Primitive};
use tracing::{debug, trace};

use crate::config::CompileConfig;
use crate::error::{CompileResult, MappingError};
use crate::mapper::MapperRegistry;
use crate::params::Parameters;
use crate::resolver::{PlaceholderFactory, PlaceholderRef, Resolution};

#[derive(Debug, Clone)]
struct OpenPlaceholder {
    placeholder: PlaceholderRef,
    /// Input of the identity block standing in for the placeholder.
    input: PortId,
    resolved: bool,
}

/// Lowering state for one compile request.
///
/// Each node is lowered at most once per session; every later use shares the
/// same output port.
pub struct Session<'a> {
    arena: &'a ExprArena,
    registry: &'a MapperRegistry,
    params: &'a Parameters,
    config: &'a CompileConfig,
    host: Host<'a>,
    fragment: NetFragment,
    lowered: HashMap<ExprId, PortId>,
    constants: HashMap<Value, PortId>,
    placeholders: Vec<OpenPlaceholder>,
    factories: Vec<Arc<dyn PlaceholderFactory + 'a>>,
}

impl<'a> Session<'a> {
    pub fn new(
        arena: &'a ExprArena,
        registry: &'a MapperRegistry,
        params: &'a Parameters,
        config: &'a CompileConfig,
        host: Host<'a>,
    ) -> Self {
        debug!(nodes = arena.len(), "compile session started");
        Self {
            arena,
            registry,
            params,
            config,
            host,
            fragment: NetFragment::new(),
            lowered: HashMap::new(),
            constants: HashMap::new(),
            placeholders: Vec::new(),
            factories: Vec::new(),
        }
    }

    pub fn arena(&self) -> &'a ExprArena {
        self.arena
    }

    pub fn params(&self) -> &'a Parameters {
        self.params
    }

    pub fn config(&self) -> &'a CompileConfig {
        self.config
    }

    pub fn host(&self) -> Host<'a> {
        self.host
    }

    pub fn fragment(&self) -> &NetFragment {
        &self.fragment
    }

    pub fn fragment_mut(&mut self) -> &mut NetFragment {
        &mut self.fragment
    }

    /// Port already produced for `id` in this session.
    pub fn lowered(&self, id: ExprId) -> Option<PortId> {
        self.lowered.get(&id).copied()
    }

    /// Lower `id` and its dependencies; returns the node's output port.
    pub fn lower(&mut self, id: ExprId) -> CompileResult<PortId> {
        if let Some(port) = self.lowered.get(&id) {
            return Ok(*port);
        }
        let arena = self.arena;
        let node = arena.node(id)?;

        let mut inputs = Vec::new();
        for dep in node.dependencies() {
            inputs.push(self.lower(dep)?);
        }

        let keys = node.kind.mapper_keys();
        let registry = self.registry;
        let (key, mapper) = registry
            .lookup(&keys)
            .ok_or_else(|| MappingError::Unmappable {
                kind: node.kind.type_name().to_string(),
                keys: keys.join(", "),
            })?;
        let port = mapper.lower(self, id, node, &inputs)?;

        let produced = self.fragment.port(port)?.kind;
        if produced != node.data {
            return Err(MappingError::constraint(format!(
                "mapper '{key}' produced {produced} for {id}, expected {}",
                node.data
            )));
        }
        trace!(%id, mapper = key, port = %port, "lowered node");
        self.lowered.insert(id, port);
        Ok(port)
    }

    /// Add a block fed by `inputs` and return its output port.
    pub fn add(&mut self, primitive: Primitive, inputs: &[PortId], output: DataKind) -> CompileResult<PortId> {
        if inputs.is_empty() {
            return Ok(self.fragment.add_source(primitive, output)?);
        }
        Ok(self.fragment.add_wired(primitive, inputs, output)?)
    }

    /// Shared constant block for `value`.
    pub fn const_port(&mut self, value: Value) -> CompileResult<PortId> {
        if let Some(port) = self.constants.get(&value) {
            return Ok(*port);
        }
        let kind = value.kind();
        let port = self
            .fragment
            .add_source(Primitive::Constant { value: value.clone() }, kind)?;
        self.constants.insert(value, port);
        Ok(port)
    }

    pub fn constant_bool(&mut self, value: bool) -> CompileResult<PortId> {
        self.const_port(Value::Boolean(value))
    }

    /// Disjunction; `false` for no ports, the port itself for one.
    pub fn any_of(&mut self, ports: &[PortId]) -> CompileResult<PortId> {
        match ports {
            [] => self.constant_bool(false),
            [one] => Ok(*one),
            _ => self.add(Primitive::AnyOf, ports, DataKind::Boolean),
        }
    }

    /// Conjunction; `true` for no ports, the port itself for one.
    pub fn all_of(&mut self, ports: &[PortId]) -> CompileResult<PortId> {
        match ports {
            [] => self.constant_bool(true),
            [one] => Ok(*one),
            _ => self.add(Primitive::AllOf, ports, DataKind::Boolean),
        }
    }

    pub fn negate(&mut self, port: PortId) -> CompileResult<PortId> {
        self.add(Primitive::Unary { op: UnaryOp::Not }, &[port], DataKind::Boolean)
    }

    /// True once `port` has been true for `duration` seconds.
    pub fn timer(&mut self, port: PortId, duration: f64) -> CompileResult<PortId> {
        self.add(Primitive::Timer { duration }, &[port], DataKind::Boolean)
    }

    /// Ensure `port` carries a boolean.
    pub fn expect_boolean(&self, port: PortId, what: &str) -> CompileResult<()> {
        let kind = self.fragment.port(port)?.kind;
        if kind != DataKind::Boolean {
            return Err(MappingError::constraint(format!(
                "{what} must be boolean, found {kind}"
            )));
        }
        Ok(())
    }

    /// Identity block standing in for placeholder `id` until it is resolved.
    pub fn open_placeholder(&mut self, id: ExprId) -> CompileResult<PortId> {
        let arena = self.arena;
        let node = arena.node(id)?;
        let (pid, label) = match &node.kind {
            ExprKind::Placeholder { id, label } => (*id, label.clone()),
            other => {
                return Err(MappingError::constraint(format!(
                    "{id} is a {} node, not a placeholder",
                    other.type_name()
                )));
            }
        };
        let block = self
            .fragment
            .add_block(Primitive::Identity, &[node.data], Some(node.data))?;
        let input = self.fragment.block(block)?.inputs[0];
        let output = self.fragment.output_port(block)?;
        self.placeholders.push(OpenPlaceholder {
            placeholder: PlaceholderRef {
                expr: id,
                id: pid,
                label,
                data: node.data,
            },
            input,
            resolved: false,
        });
        Ok(output)
    }

    /// Register a factory consulted by [`Session::finish`].
    pub fn add_factory(&mut self, factory: impl PlaceholderFactory + 'a) {
        self.factories.push(Arc::new(factory));
    }

    /// Wire the placeholder `id` to `port`. Each placeholder is resolved once.
    pub fn resolve(&mut self, id: PlaceholderId, port: PortId) -> CompileResult<()> {
        let entry = self
            .placeholders
            .iter_mut()
            .find(|p| p.placeholder.id == id)
            .ok_or_else(|| {
                MappingError::constraint(format!("placeholder {} was not lowered", id.0))
            })?;
        if entry.resolved {
            return Err(MappingError::PlaceholderResolvedTwice {
                label: entry.placeholder.label.clone(),
            });
        }
        entry.resolved = true;
        let input = entry.input;
        let label = entry.placeholder.label.clone();
        self.fragment.connect(port, input)?;
        debug!(placeholder = %label, port = %port, "resolved placeholder");
        Ok(())
    }

    /// Placeholders lowered so far that still have no producer.
    pub fn unresolved(&self) -> Vec<PlaceholderRef> {
        self.placeholders
            .iter()
            .filter(|p| !p.resolved)
            .map(|p| p.placeholder.clone())
            .collect()
    }

    /// Resolve every open placeholder, then validate and return the fragment.
    ///
    /// Resolving one placeholder may lower expressions that open new ones, so
    /// factories are consulted until no unresolved placeholder remains.
    pub fn finish(mut self) -> CompileResult<NetFragment> {
        loop {
            let open = self.unresolved();
            if open.is_empty() {
                break;
            }
            let factories = self.factories.clone();
            for placeholder in open {
                let mut resolved = false;
                for factory in &factories {
                    if let Resolution::Resolved(port) = factory.resolve(&placeholder, &mut self)? {
                        self.resolve(placeholder.id, port)?;
                        resolved = true;
                        break;
                    }
                }
                if !resolved {
                    return Err(MappingError::UnresolvedPlaceholder {
                        label: placeholder.label,
                    });
                }
            }
        }
        self.fragment.validate()?;
        debug!(
            blocks = self.fragment.blocks().len(),
            connections = self.fragment.connections().len(),
            "compile session finished"
        );
        Ok(self.fragment)
    }
}
