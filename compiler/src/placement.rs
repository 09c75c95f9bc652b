//! Network placement: which module serves each step, and where.
//!
//! Overrides come from flat `pipeline.*` properties:
//!
//! ```text
//! pipeline.client.base-port=9000
//! pipeline.module.orders.host=orders.internal
//! pipeline.module.orders.steps=validate-order, price
//! pipeline.module.audit.aspects=persistence
//! ```

use serde::Serialize;
use std::collections::BTreeMap;

use crate::diagnostics::{
    Diagnostics, Outcome, DUPLICATE_ASPECT_OVERRIDE, DUPLICATE_MODULE, DUPLICATE_STEP_OVERRIDE,
};
use crate::error::CompileError;
use crate::model::{DeploymentRole, StepModel, Transport};
use crate::naming::{self, DEFAULT_BASE_PORT, DEFAULT_HOST};
use crate::order::OrderExpansion;

const PREFIX: &str = "pipeline.";
const MODULE_PREFIX: &str = "pipeline.module.";
const BASE_PORT_KEY: &str = "pipeline.client.base-port";
const TLS_KEY: &str = "pipeline.client.tls-configuration-name";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleConfig {
    pub name: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// In declaration order
    pub modules: Vec<ModuleConfig>,
    /// Normalized step name -> module
    pub step_modules: BTreeMap<String, String>,
    /// Normalized aspect name -> module
    pub aspect_modules: BTreeMap<String, String>,
    pub base_port: u16,
    pub tls_configuration_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            step_modules: BTreeMap::new(),
            aspect_modules: BTreeMap::new(),
            base_port: DEFAULT_BASE_PORT,
            tls_configuration_name: None,
        }
    }
}

impl ClientConfig {
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    fn module_mut(&mut self, name: &str) -> &mut ModuleConfig {
        let index = match self.modules.iter().position(|m| m.name == name) {
            Some(index) => index,
            None => {
                self.modules.push(ModuleConfig {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.modules.len() - 1
            }
        };
        &mut self.modules[index]
    }
}

/// Parse `key=value` override lines. Blank lines and lines starting with `#`
/// or `!` are skipped, as are keys outside the `pipeline.` prefix.
pub fn parse_client_config(text: &str) -> Result<Outcome<ClientConfig>, CompileError> {
    let mut config = ClientConfig::default();
    let mut diagnostics = Diagnostics::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            return Err(CompileError::InvalidModuleConfig {
                key: line.to_string(),
                reason: format!("line {} is not a key=value pair", line_no + 1),
            });
        };
        let key = key.trim();
        let value = value.trim();
        if !key.starts_with(PREFIX) {
            continue;
        }

        match key {
            BASE_PORT_KEY => config.base_port = parse_port(key, value)?,
            TLS_KEY => {
                config.tls_configuration_name = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            _ => {
                let Some((module, property)) = key
                    .strip_prefix(MODULE_PREFIX)
                    .and_then(|rest| rest.rsplit_once('.'))
                    .filter(|(module, _)| !module.is_empty())
                else {
                    return Err(CompileError::InvalidModuleConfig {
                        key: key.to_string(),
                        reason: "unknown property".to_string(),
                    });
                };
                apply_module_property(&mut config, &mut diagnostics, key, module, property, value)?;
            }
        }
    }

    tracing::debug!(
        modules = config.modules.len(),
        step_overrides = config.step_modules.len(),
        aspect_overrides = config.aspect_modules.len(),
        "parsed client configuration"
    );
    Ok(Outcome::with(config, diagnostics))
}

fn parse_port(key: &str, value: &str) -> Result<u16, CompileError> {
    value
        .parse::<u16>()
        .map_err(|_| CompileError::InvalidModuleConfig {
            key: key.to_string(),
            reason: format!("'{}' is not a valid port", value),
        })
}

fn apply_module_property(
    config: &mut ClientConfig,
    diagnostics: &mut Diagnostics,
    key: &str,
    module: &str,
    property: &str,
    value: &str,
) -> Result<(), CompileError> {
    match property {
        "host" => {
            let entry = config.module_mut(module);
            if entry.host.is_some() {
                diagnostics.warn(DUPLICATE_MODULE, module, format!("'{}' set twice, keeping first", key));
            } else {
                entry.host = Some(value.to_string());
            }
        }
        "port" => {
            let port = parse_port(key, value)?;
            let entry = config.module_mut(module);
            if entry.port.is_some() {
                diagnostics.warn(DUPLICATE_MODULE, module, format!("'{}' set twice, keeping first", key));
            } else {
                entry.port = Some(port);
            }
        }
        "steps" | "aspects" => {
            config.module_mut(module);
            let (map, code) = if property == "steps" {
                (&mut config.step_modules, DUPLICATE_STEP_OVERRIDE)
            } else {
                (&mut config.aspect_modules, DUPLICATE_ASPECT_OVERRIDE)
            };
            for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let normalized = naming::normalize_token(name);
                match map.get(&normalized) {
                    Some(existing) if existing != module => diagnostics.warn(
                        code,
                        name,
                        format!(
                            "already assigned to module '{}', ignoring '{}'",
                            existing, module
                        ),
                    ),
                    Some(_) => {}
                    None => {
                        map.insert(normalized, module.to_string());
                    }
                }
            }
        }
        _ => {
            return Err(CompileError::InvalidModuleConfig {
                key: key.to_string(),
                reason: format!("unknown module property '{}'", property),
            })
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Identifier in the expanded order
    pub step: String,
    pub client_name: String,
    pub module: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_configuration_name: Option<String>,
}

fn role_token(role: DeploymentRole) -> &'static str {
    match role {
        DeploymentRole::PipelineServer => "pipeline",
        DeploymentRole::OrchestratorClient => "orchestrator",
        DeploymentRole::PluginServer | DeploymentRole::PluginClient => "plugin",
        DeploymentRole::RestServer => "rest",
    }
}

/// Place every entry of the expanded order.
///
/// Module indices follow declaration order in `config`; modules only reached
/// through defaults are appended in the order they are first needed. A module
/// without an explicit port gets `base_port + index + 1`; running past the
/// last port is an error on `pipeline.client.base-port`.
pub fn resolve_placements(
    expansion: &OrderExpansion,
    models: &[StepModel],
    transport: Transport,
    config: &ClientConfig,
) -> Result<Vec<Placement>, CompileError> {
    let mut modules: Vec<String> = config.modules.iter().map(|m| m.name.clone()).collect();

    let assignments: Vec<(String, String, String)> = expansion
        .order
        .iter()
        .map(|identifier| {
            let (client_name, module) = match expansion.synthetic_step(identifier) {
                Some(synthetic) => {
                    let name = format!(
                        "{}-{}",
                        naming::to_kebab_case(&synthetic.aspect),
                        naming::to_kebab_case(&naming::normalize_type_name(&synthetic.type_name))
                    );
                    let module = config
                        .aspect_modules
                        .get(&naming::normalize_token(&synthetic.aspect))
                        .cloned()
                        .unwrap_or_else(|| {
                            naming::default_side_effect_module(&synthetic.aspect, &synthetic.type_name)
                        });
                    (naming::client_name("plugin", &name), module)
                }
                None => {
                    let model = models
                        .iter()
                        .find(|m| m.client_identifier(transport) == *identifier);
                    let (role, service_name) = match model {
                        Some(m) => (m.role, m.service_name.clone()),
                        None => (DeploymentRole::PipelineServer, service_from_identifier(identifier, transport)),
                    };
                    let base = naming::step_base_name(&service_name);
                    let module = model
                        .and_then(|m| step_override(config, m))
                        .or_else(|| {
                            config
                                .step_modules
                                .get(&naming::normalize_token(base))
                                .cloned()
                        })
                        .unwrap_or_else(|| naming::default_step_module(&service_name));
                    (naming::client_name(role_token(role), base), module)
                }
            };
            if !modules.contains(&module) {
                modules.push(module.clone());
            }
            (identifier.clone(), client_name, module)
        })
        .collect();

    assignments
        .into_iter()
        .map(|(step, client_name, module)| -> Result<Placement, CompileError> {
            let index = modules.iter().position(|m| *m == module).unwrap_or(0);
            let declared = config.module(&module);
            let host = declared
                .and_then(|m| m.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = match declared.and_then(|m| m.port) {
                Some(port) => port,
                None => default_port(config.base_port, index, &module)?,
            };
            Ok(Placement {
                step,
                client_name,
                module,
                host,
                port,
                tls_configuration_name: config.tls_configuration_name.clone(),
            })
        })
        .collect()
}

fn default_port(base_port: u16, index: usize, module: &str) -> Result<u16, CompileError> {
    u16::try_from(index + 1)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .ok_or_else(|| CompileError::InvalidModuleConfig {
            key: BASE_PORT_KEY.to_string(),
            reason: format!(
                "base port {} leaves no default port for module '{}' (index {})",
                base_port, module, index
            ),
        })
}

fn step_override(config: &ClientConfig, model: &StepModel) -> Option<String> {
    [
        model.name.as_str(),
        model.service_name.as_str(),
        naming::step_base_name(&model.service_name),
    ]
    .iter()
    .find_map(|name| config.step_modules.get(&naming::normalize_token(name)).cloned())
}

fn service_from_identifier(identifier: &str, transport: Transport) -> String {
    let simple = naming::simple_name(identifier);
    simple
        .strip_suffix(transport.adapter_suffix())
        .unwrap_or(simple)
        .to_string()
}
