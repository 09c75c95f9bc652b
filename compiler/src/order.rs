//! Execution order planning.
//!
//! The base order lists one client adapter per topology step. The
//! [`OrderExpander`] then inserts synthetic side-effect steps for every
//! enabled aspect, before or after the steps it applies to.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::declaration::{match_topology, AspectConfig, AspectPosition, AspectScope, TopologyStep};
use crate::diagnostics::{
    Diagnostics, Outcome, STEP_NOT_IN_TOPOLOGY, TOPOLOGY_STEP_DUPLICATE, TOPOLOGY_STEP_UNMATCHED,
    UNVERIFIED_SYNTHETIC_STEP,
};
use crate::model::{StepModel, Transport};
use crate::naming;

/// Input and output domain types a step declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepContract {
    /// Declared step name, used for aspect targeting
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
}

/// Declared contracts keyed by client identifier.
#[derive(Debug, Clone, Default)]
pub struct StepContracts(BTreeMap<String, StepContract>);

impl StepContracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: &[StepModel], transport: Transport) -> Self {
        let mut contracts = Self::new();
        for model in models {
            contracts.insert(
                model.client_identifier(transport),
                StepContract {
                    name: Some(model.name.clone()),
                    input_type: model.declared_input_type().map(str::to_string),
                    output_type: model.declared_output_type().map(str::to_string),
                },
            );
        }
        contracts
    }

    pub fn insert(&mut self, identifier: impl Into<String>, contract: StepContract) {
        self.0.insert(identifier.into(), contract);
    }

    pub fn get(&self, identifier: &str) -> Option<&StepContract> {
        self.0.get(identifier)
    }
}

/// Checks whether a generated identifier actually exists downstream.
pub trait SymbolResolver {
    fn resolves(&self, identifier: &str) -> bool;
}

impl<F> SymbolResolver for F
where
    F: Fn(&str) -> bool,
{
    fn resolves(&self, identifier: &str) -> bool {
        self(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntheticStep {
    pub identifier: String,
    pub aspect: String,
    pub type_name: String,
    /// Base step the side effect was inserted next to
    pub parent: String,
    pub position: AspectPosition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderExpansion {
    pub order: Vec<String>,
    pub synthetic: Vec<SyntheticStep>,
}

impl OrderExpansion {
    pub fn unchanged(base: &[String]) -> Self {
        Self {
            order: base.to_vec(),
            synthetic: Vec::new(),
        }
    }

    pub fn synthetic_step(&self, identifier: &str) -> Option<&SyntheticStep> {
        self.synthetic.iter().find(|s| s.identifier == identifier)
    }

    /// Side-effect identifier -> base step it observes.
    pub fn side_effect_parents(&self) -> BTreeMap<String, String> {
        self.synthetic
            .iter()
            .map(|s| (s.identifier.clone(), s.parent.clone()))
            .collect()
    }
}

pub struct OrderExpander<'a> {
    aspects: &'a BTreeMap<String, AspectConfig>,
    contracts: &'a StepContracts,
    topology: &'a [TopologyStep],
    base_namespace: &'a str,
    transport: Transport,
    resolver: Option<&'a dyn SymbolResolver>,
}

impl<'a> OrderExpander<'a> {
    pub fn new(
        aspects: &'a BTreeMap<String, AspectConfig>,
        contracts: &'a StepContracts,
        topology: &'a [TopologyStep],
        base_namespace: &'a str,
        transport: Transport,
    ) -> Self {
        Self {
            aspects,
            contracts,
            topology,
            base_namespace,
            transport,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn SymbolResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn eligible_aspects(&self) -> Vec<(&'a str, &'a AspectConfig)> {
        self.aspects
            .iter()
            .filter(|(name, config)| {
                config.enabled
                    && naming::normalize_token(name) != naming::CLIENT_EXCLUDED_ASPECT
            })
            .map(|(name, config)| (name.as_str(), config))
            .collect()
    }

    /// Expand `base`, which must already be free of duplicates.
    pub fn expand(&self, base: &[String]) -> Outcome<OrderExpansion> {
        if base.is_empty() || self.aspects.is_empty() {
            return Outcome::clean(OrderExpansion::unchanged(base));
        }
        if base.iter().any(|id| naming::is_side_effect_identifier(id)) {
            tracing::debug!("order already contains side effects, not expanding again");
            return Outcome::clean(OrderExpansion::unchanged(base));
        }
        let eligible = self.eligible_aspects();
        if eligible.is_empty() {
            return Outcome::clean(OrderExpansion::unchanged(base));
        }

        let (before, after): (Vec<_>, Vec<_>) = eligible
            .into_iter()
            .partition(|(_, config)| config.position == AspectPosition::BeforeStep);

        let mut expansion = OrderExpansion::default();
        let mut diagnostics = Diagnostics::new();
        let mut inserted: HashSet<(String, String)> = HashSet::new();

        for step in base {
            for &(aspect, config) in &before {
                self.insert(step, aspect, config, &mut inserted, &mut expansion, &mut diagnostics);
            }
            expansion.order.push(step.clone());
            for &(aspect, config) in &after {
                self.insert(step, aspect, config, &mut inserted, &mut expansion, &mut diagnostics);
            }
        }

        tracing::debug!(
            base = base.len(),
            expanded = expansion.order.len(),
            synthetic = expansion.synthetic.len(),
            "expanded execution order"
        );
        Outcome::with(expansion, diagnostics)
    }

    fn insert(
        &self,
        step: &str,
        aspect: &str,
        config: &AspectConfig,
        inserted: &mut HashSet<(String, String)>,
        expansion: &mut OrderExpansion,
        diagnostics: &mut Diagnostics,
    ) {
        if !self.in_scope(step, config) {
            return;
        }
        let Some(type_name) = self.resolve_type(step, config.position) else {
            tracing::debug!(step, aspect, "no type resolved, skipping side effect");
            return;
        };

        let key = (
            naming::normalize_token(aspect),
            naming::normalize_type_name(&type_name),
        );
        if !inserted.insert(key) {
            return;
        }

        let namespace = naming::namespace_of(step).unwrap_or(self.base_namespace);
        let identifier =
            naming::side_effect_identifier(namespace, aspect, &type_name, self.transport);

        if let Some(resolver) = self.resolver {
            if !resolver.resolves(&identifier) {
                diagnostics.warn(
                    UNVERIFIED_SYNTHETIC_STEP,
                    identifier.clone(),
                    format!("side effect for aspect '{}' does not resolve", aspect),
                );
            }
        }

        expansion.order.push(identifier.clone());
        expansion.synthetic.push(SyntheticStep {
            identifier,
            aspect: aspect.to_string(),
            type_name,
            parent: step.to_string(),
            position: config.position,
        });
    }

    fn in_scope(&self, step: &str, config: &AspectConfig) -> bool {
        match config.scope {
            AspectScope::Global => true,
            AspectScope::Steps => {
                let keys = self.step_keys(step);
                config
                    .target_steps
                    .iter()
                    .map(|t| naming::normalize_token(t))
                    .any(|t| !t.is_empty() && keys.contains(&t))
            }
        }
    }

    /// Normalized names a step may be targeted by.
    fn step_keys(&self, step: &str) -> Vec<String> {
        let simple = naming::simple_name(step);
        let stem = simple
            .strip_suffix(self.transport.adapter_suffix())
            .unwrap_or(simple);
        let mut keys = vec![
            naming::normalize_token(simple),
            naming::normalize_token(stem),
            naming::normalize_token(naming::step_base_name(stem)),
        ];
        if let Some(name) = self.contracts.get(step).and_then(|c| c.name.as_deref()) {
            keys.push(naming::normalize_token(name));
        }
        keys
    }

    /// Declared contract first, then the topology entry the step matches.
    fn resolve_type(&self, step: &str, position: AspectPosition) -> Option<String> {
        let declared = self.contracts.get(step).and_then(|c| match position {
            AspectPosition::BeforeStep => c.input_type.as_deref(),
            AspectPosition::AfterStep => c.output_type.as_deref(),
        });
        if let Some(declared) = declared.filter(|t| !naming::is_void_type(t)) {
            return Some(declared.to_string());
        }

        let entry = self.topology_entry(step)?;
        let type_name = match position {
            AspectPosition::BeforeStep => entry.input_type.trim(),
            AspectPosition::AfterStep => entry.output_type.trim(),
        };
        (!naming::is_void_type(type_name)).then(|| type_name.to_string())
    }

    fn topology_entry(&self, step: &str) -> Option<&'a TopologyStep> {
        let keys = self.step_keys(step);
        let topology = self.topology;
        topology
            .iter()
            .find(|t| keys.contains(&naming::normalize_token(&t.name)))
            .or_else(|| {
                let names: Vec<&str> = topology.iter().map(|t| t.name.as_str()).collect();
                naming::best_token_match(step, &names).map(|i| &topology[i])
            })
    }
}

/// Client adapter identifiers in topology order, first occurrence kept.
///
/// Without a topology the non-side-effect steps run in declaration order.
/// Topology entries that repeat an already ordered step, and declared steps
/// no topology entry reaches, are reported.
pub fn derive_base_order(
    topology: &[TopologyStep],
    models: &[StepModel],
    transport: Transport,
) -> Outcome<Vec<String>> {
    let mut diagnostics = Diagnostics::new();
    let mut order: Vec<String> = Vec::new();

    if topology.is_empty() {
        for model in models.iter().filter(|m| !m.side_effect) {
            let identifier = model.client_identifier(transport);
            if !order.contains(&identifier) {
                order.push(identifier);
            }
        }
        return Outcome::with(order, diagnostics);
    }

    for (step, matched) in topology.iter().zip(match_topology(topology, models)) {
        let Some(index) = matched else {
            diagnostics.warn(
                TOPOLOGY_STEP_UNMATCHED,
                step.name.clone(),
                "topology step matches no declared step",
            );
            continue;
        };
        let identifier = models[index].client_identifier(transport);
        if order.contains(&identifier) {
            diagnostics.warn(
                TOPOLOGY_STEP_DUPLICATE,
                step.name.clone(),
                format!(
                    "topology step resolves to '{}', which is already ordered",
                    models[index].name
                ),
            );
        } else {
            order.push(identifier);
        }
    }

    for model in models.iter().filter(|m| !m.side_effect) {
        if !order.contains(&model.client_identifier(transport)) {
            diagnostics.warn(
                STEP_NOT_IN_TOPOLOGY,
                model.name.clone(),
                "declared step is not reached by any topology entry",
            );
        }
    }

    Outcome::with(order, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!("acme.Process{}GrpcClientStep", n))
            .collect()
    }

    fn contracts(entries: &[(&str, &str, &str)]) -> StepContracts {
        let mut contracts = StepContracts::new();
        for (step, input, output) in entries {
            contracts.insert(
                format!("acme.Process{}GrpcClientStep", step),
                StepContract {
                    name: Some(step.to_string()),
                    input_type: Some(input.to_string()),
                    output_type: Some(output.to_string()),
                },
            );
        }
        contracts
    }

    fn aspects(entries: Vec<(&str, AspectConfig)>) -> BTreeMap<String, AspectConfig> {
        entries
            .into_iter()
            .map(|(name, config)| (name.to_string(), config))
            .collect()
    }

    #[test]
    fn test_after_aspect_follows_each_step() {
        let contracts = contracts(&[
            ("Parse", "acme.Raw", "acme.Order"),
            ("Price", "acme.Order", "acme.Invoice"),
        ]);
        let aspects = aspects(vec![("persistence", AspectConfig::default())]);
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc);

        let outcome = expander.expand(&ids(&["Parse", "Price"]));
        assert_eq!(
            outcome.value.order,
            vec![
                "acme.ProcessParseGrpcClientStep",
                "acme.PersistenceOrderSideEffectGrpcClientStep",
                "acme.ProcessPriceGrpcClientStep",
                "acme.PersistenceInvoiceSideEffectGrpcClientStep",
            ]
        );
        assert_eq!(
            outcome.value.side_effect_parents()["acme.PersistenceOrderSideEffectGrpcClientStep"],
            "acme.ProcessParseGrpcClientStep"
        );
    }

    #[test]
    fn test_before_aspect_uses_input_type() {
        let contracts = contracts(&[("Parse", "acme.Raw", "acme.Order")]);
        let aspects = aspects(vec![("audit", AspectConfig::before())]);
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc);

        let order = expander.expand(&ids(&["Parse"])).value.order;
        assert_eq!(
            order,
            vec![
                "acme.AuditRawSideEffectGrpcClientStep",
                "acme.ProcessParseGrpcClientStep",
            ]
        );
    }

    #[test]
    fn test_same_aspect_and_type_inserted_once() {
        let contracts = contracts(&[
            ("Enrich", "acme.Order", "acme.Order"),
            ("Validate", "acme.Order", "acme.Order"),
        ]);
        let aspects = aspects(vec![("persistence", AspectConfig::default())]);
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc);

        let outcome = expander.expand(&ids(&["Enrich", "Validate"]));
        assert_eq!(outcome.value.synthetic.len(), 1);
        let count = outcome
            .value
            .order
            .iter()
            .filter(|id| naming::is_side_effect_identifier(id))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let contracts = contracts(&[("Parse", "acme.Raw", "acme.Order")]);
        let aspects = aspects(vec![
            ("persistence", AspectConfig::default()),
            ("audit", AspectConfig::before()),
        ]);
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc);

        let once = expander.expand(&ids(&["Parse"])).value.order;
        let twice = expander.expand(&once).value.order;
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_short_circuits() {
        let contracts = contracts(&[("Parse", "acme.Raw", "acme.Order")]);
        let base = ids(&["Parse"]);

        let none = BTreeMap::new();
        let expander = OrderExpander::new(&none, &contracts, &[], "acme", Transport::Grpc);
        assert_eq!(expander.expand(&base).value.order, base);
        assert!(expander.expand(&[]).value.order.is_empty());

        let only_cache = aspects(vec![
            ("cache", AspectConfig::default()),
            ("persistence", AspectConfig::default().disabled()),
        ]);
        let expander = OrderExpander::new(&only_cache, &contracts, &[], "acme", Transport::Grpc);
        assert_eq!(expander.expand(&base).value.order, base);
    }

    #[test]
    fn test_step_scope_matches_normalized_names() {
        let contracts = contracts(&[
            ("Parse", "acme.Raw", "acme.Order"),
            ("Price", "acme.Order", "acme.Invoice"),
        ]);
        let aspects = aspects(vec![(
            "persistence",
            AspectConfig::default().targeting(&["PRICE"]),
        )]);
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc);

        let outcome = expander.expand(&ids(&["Parse", "Price"]));
        assert_eq!(outcome.value.synthetic.len(), 1);
        assert_eq!(outcome.value.synthetic[0].type_name, "acme.Invoice");
    }

    #[test]
    fn test_topology_fallback_resolves_type() {
        let contracts = StepContracts::new();
        let topology = vec![TopologyStep::new("validate-order", "acme.Order", "acme.Checked")];
        let aspects = aspects(vec![("persistence", AspectConfig::default())]);
        let expander =
            OrderExpander::new(&aspects, &contracts, &topology, "acme", Transport::Grpc);

        let outcome = expander.expand(&ids(&["ValidateOrder", "Unknown"]));
        assert_eq!(
            outcome.value.order,
            vec![
                "acme.ProcessValidateOrderGrpcClientStep",
                "acme.PersistenceCheckedSideEffectGrpcClientStep",
                "acme.ProcessUnknownGrpcClientStep",
            ]
        );
    }

    #[test]
    fn test_unverified_identifiers_warn() {
        let contracts = contracts(&[("Parse", "acme.Raw", "acme.Order")]);
        let aspects = aspects(vec![("persistence", AspectConfig::default())]);
        let resolver = |id: &str| !id.contains("SideEffect");
        let expander = OrderExpander::new(&aspects, &contracts, &[], "acme", Transport::Grpc)
            .with_resolver(&resolver);

        let outcome = expander.expand(&ids(&["Parse"]));
        assert_eq!(outcome.value.order.len(), 2);
        assert!(outcome.diagnostics.has_code(UNVERIFIED_SYNTHETIC_STEP));
    }

    #[test]
    fn test_derive_base_order_dedups_and_warns() {
        use crate::declaration::StepDeclaration;
        use crate::extract::extract_step;

        let models: Vec<StepModel> = ["parse", "price"]
            .iter()
            .map(|name| {
                extract_step(
                    &StepDeclaration {
                        name: name.to_string(),
                        namespace: Some("acme".to_string()),
                        ..Default::default()
                    },
                    None,
                )
                .unwrap()
            })
            .collect();
        let topology = vec![
            TopologyStep::new("Parse", "A", "B"),
            TopologyStep::new("price", "B", "C"),
            TopologyStep::new("parse", "C", "D"),
            TopologyStep::new("ship", "D", "E"),
        ];

        let outcome = derive_base_order(&topology, &models, Transport::Grpc);
        assert_eq!(
            outcome.value,
            vec![
                "acme.ProcessParseGrpcClientStep",
                "acme.ProcessPriceGrpcClientStep"
            ]
        );
        assert!(outcome.diagnostics.has_code(TOPOLOGY_STEP_UNMATCHED));
        let repeated: Vec<_> = outcome
            .diagnostics
            .with_code(TOPOLOGY_STEP_DUPLICATE)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(repeated, vec!["parse"]);
    }

    #[test]
    fn test_base_order_reports_steps_left_out() {
        use crate::declaration::StepDeclaration;
        use crate::extract::extract_step;

        let models: Vec<StepModel> = ["validate-order", "ship", "archive"]
            .iter()
            .map(|name| {
                extract_step(
                    &StepDeclaration {
                        name: name.to_string(),
                        namespace: Some("acme".to_string()),
                        ..Default::default()
                    },
                    None,
                )
                .unwrap()
            })
            .collect();
        let topology = vec![
            TopologyStep::new("validate-order", "acme.Order", "acme.Checked"),
            TopologyStep::new("ship-order", "acme.Checked", "acme.Shipment"),
        ];

        let outcome = derive_base_order(&topology, &models, Transport::Grpc);
        assert_eq!(
            outcome.value,
            vec![
                "acme.ProcessValidateOrderGrpcClientStep",
                "acme.ProcessShipGrpcClientStep"
            ]
        );
        assert!(!outcome.diagnostics.has_code(TOPOLOGY_STEP_DUPLICATE));
        let missing: Vec<_> = outcome
            .diagnostics
            .with_code(STEP_NOT_IN_TOPOLOGY)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(missing, vec!["archive"]);
    }
}
