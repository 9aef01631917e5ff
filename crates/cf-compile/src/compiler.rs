//! Compile entry point.

use std::collections::BTreeMap;

use cf_core::{ExprId, PortId, Value};
use cf_expr::{ExprArena, Host};
use cf_net::{ExceptionClass, SignalClass, StateKind};
use rayon::prelude::*;
use tracing::debug;

use crate::action::{lower_action, Action};
use crate::command::{lower_command, CommandSpec};
use crate::compiled::CompiledNet;
use crate::config::CompileConfig;
use crate::error::CompileResult;
use crate::mapper::MapperRegistry;
use crate::params::Parameters;
use crate::resolver::PortFactory;
use crate::session::Session;

/// What a request compiles.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowerable {
    Expr(ExprId),
    /// Action outside of any command; its ramps run at full speed.
    Action(Action),
    Command(CommandSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    pub target: Lowerable,
    pub params: Parameters,
    /// Expressions whose values are streamed back to host listeners.
    pub observed: Vec<ExprId>,
}

impl CompileRequest {
    pub fn new(target: Lowerable) -> Self {
        Self {
            target,
            params: Parameters::new(),
            observed: Vec::new(),
        }
    }

    pub fn expr(id: ExprId) -> Self {
        Self::new(Lowerable::Expr(id))
    }

    pub fn action(action: Action) -> Self {
        Self::new(Lowerable::Action(action))
    }

    pub fn command(command: CommandSpec) -> Self {
        Self::new(Lowerable::Command(command))
    }

    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }

    pub fn observe(mut self, id: ExprId) -> Self {
        if !self.observed.contains(&id) {
            self.observed.push(id);
        }
        self
    }
}

/// Compiles expressions, actions and commands into network fragments.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: MapperRegistry,
    config: CompileConfig,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileConfig::default())
    }
}

impl Compiler {
    /// Compiler with the built-in mappers.
    pub fn new(config: CompileConfig) -> Self {
        Self::with_registry(MapperRegistry::with_defaults(), config)
    }

    pub fn with_registry(registry: MapperRegistry, config: CompileConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MapperRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Compile one request. Any error aborts the whole session.
    pub fn lower(
        &self,
        arena: &ExprArena,
        host: Host<'_>,
        request: &CompileRequest,
    ) -> CompileResult<CompiledNet> {
        self.config.check()?;
        let mut session = Session::new(arena, &self.registry, &request.params, &self.config, host);

        let (root, ports) = match &request.target {
            Lowerable::Expr(id) => {
                let port = session.lower(*id)?;
                session.fragment_mut().expose("out", port)?;
                (Some(port), None)
            }
            Lowerable::Action(action) => {
                let ramps = action.override_placeholders();
                if !ramps.is_empty() {
                    session.add_factory(PortFactory::for_all(ramps, |s: &mut Session<'_>| {
                        s.const_port(Value::Double(1.0))
                    }));
                }
                (None, Some(lower_action(&mut session, action)?))
            }
            Lowerable::Command(command) => (None, Some(lower_command(&mut session, command)?)),
        };

        if let Some(ports) = &ports {
            for (channel, port) in &ports.outputs {
                session.fragment_mut().expose(channel.clone(), *port)?;
            }
            for (class, port) in ports.states.iter() {
                session.fragment_mut().states_mut().register(class.clone(), *port);
            }
        }

        let mut observed = BTreeMap::new();
        for id in &request.observed {
            let port = session.lower(*id)?;
            let channel = format!("observed.{id}");
            session.fragment_mut().expose(channel.clone(), port)?;
            observed.insert(*id, channel);
        }

        let (states, exceptions) = aggregate_signals(&mut session)?;
        let fragment = session.finish()?;
        debug!(
            request = ports.as_ref().map(|p| p.name.as_str()).unwrap_or("expression"),
            states = states.len(),
            exceptions = exceptions.len(),
            "compiled request"
        );
        Ok(CompiledNet {
            fragment,
            root,
            states,
            exceptions,
            observed,
        })
    }

    /// Compile independent requests in parallel. Results keep request order.
    pub fn lower_all(
        &self,
        arena: &ExprArena,
        host: Host<'_>,
        requests: &[CompileRequest],
    ) -> Vec<CompileResult<CompiledNet>> {
        requests
            .par_iter()
            .map(|request| self.lower(arena, host, request))
            .collect()
    }
}

/// One port per registered state kind, and one per exception class and each
/// of its ancestors, so a lookup by any class in the hierarchy finds every
/// port that raises it.
#[allow(clippy::type_complexity)]
fn aggregate_signals(
    session: &mut Session<'_>,
) -> CompileResult<(BTreeMap<StateKind, PortId>, BTreeMap<ExceptionClass, PortId>)> {
    let registry = session.fragment().states().clone();

    let mut kinds: Vec<StateKind> = Vec::new();
    for (class, _) in registry.iter() {
        if let SignalClass::State(kind) = class {
            if !kinds.contains(kind) {
                kinds.push(kind.clone());
            }
        }
    }
    let mut states = BTreeMap::new();
    for kind in kinds {
        let port = session.any_of(&registry.state_ports(&kind))?;
        states.insert(kind, port);
    }

    let mut exceptions = BTreeMap::new();
    for class in registry.exception_classes() {
        let mut current = Some(class);
        while let Some(c) = current {
            if !exceptions.contains_key(&c) {
                let port = session.any_of(&registry.exception_ports(&c))?;
                exceptions.insert(c.clone(), port);
            }
            current = c.parent();
        }
    }
    Ok((states, exceptions))
}
