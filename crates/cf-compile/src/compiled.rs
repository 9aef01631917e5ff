//! Result of a successful compile.

use std::collections::BTreeMap;

use cf_core::{ExprId, PortId};
use cf_net::{ExceptionClass, NetFragment, NetResult, NetSimulator, StateKind};

/// A validated network fragment plus lookups for the ports the executor and
/// host listeners care about.
#[derive(Debug, Clone)]
pub struct CompiledNet {
    pub(crate) fragment: NetFragment,
    pub(crate) root: Option<PortId>,
    pub(crate) states: BTreeMap<StateKind, PortId>,
    pub(crate) exceptions: BTreeMap<ExceptionClass, PortId>,
    pub(crate) observed: BTreeMap<ExprId, String>,
}

impl CompiledNet {
    pub fn fragment(&self) -> &NetFragment {
        &self.fragment
    }

    pub fn into_fragment(self) -> NetFragment {
        self.fragment
    }

    /// Output port of the compiled expression, if the request targeted one.
    pub fn root(&self) -> Option<PortId> {
        self.root
    }

    /// Port asserting `kind`; `None` if the state never occurs.
    pub fn state_port(&self, kind: &StateKind) -> Option<PortId> {
        self.states.get(kind).copied()
    }

    /// Port raised for `class` or any subclass; `None` if nothing raises it.
    pub fn exception_port(&self, class: &ExceptionClass) -> Option<PortId> {
        self.exceptions.get(class).copied()
    }

    /// Exception classes (including ancestors) that can be raised.
    pub fn exception_classes(&self) -> impl Iterator<Item = &ExceptionClass> {
        self.exceptions.keys()
    }

    /// Output channel carrying an observed expression.
    pub fn channel(&self, expr: ExprId) -> Option<&str> {
        self.observed.get(&expr).map(String::as_str)
    }

    pub fn observed(&self) -> impl Iterator<Item = (ExprId, &str)> {
        self.observed.iter().map(|(id, ch)| (*id, ch.as_str()))
    }

    /// Reference simulator over the compiled fragment.
    pub fn simulator(&self, period_s: f64) -> NetResult<NetSimulator<'_>> {
        NetSimulator::new(&self.fragment, period_s)
    }
}
