//! Headless host for the card desktop runtime.

pub mod script;
pub mod store;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use card_engine::Stack;
use desktop_runtime::{ContributionManifest, DesktopConfig, DesktopContribution, DesktopRuntime};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use script::{parse_script, run_script, ScriptStep, SessionReport, StepRecord};
pub use store::JsonDomainStore;

/// Reads a JSON file into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Builds a runtime over a JSON domain store, registers `stacks`, and installs the stock
/// selectors.
pub fn build_runtime(
    config: DesktopConfig,
    manifests: Vec<ContributionManifest>,
    stacks: Vec<Stack>,
    domain_state: Value,
) -> Result<DesktopRuntime<JsonDomainStore>> {
    let contributions = manifests.into_iter().map(DesktopContribution::from).collect();
    let mut runtime = DesktopRuntime::new(config, contributions, JsonDomainStore::new(domain_state))
        .context("failed to compose desktop contributions")?;

    for stack in stacks {
        let id = stack.id.clone();
        runtime
            .register_stack(stack)
            .with_context(|| format!("failed to register stack `{id}`"))?;
    }
    install_selectors(&mut runtime);
    Ok(runtime)
}

/// `domain.get` reads `args.path` (dotted) from the domain document; `domain.record` reads
/// `state[args.domain][args.id]`.
fn install_selectors(runtime: &mut DesktopRuntime<JsonDomainStore>) {
    let selectors = runtime.engine_mut().selectors_mut();
    selectors.register("domain.get", |state: &Value, args, _| {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return Value::Null;
        };
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(state, |value, segment| match value {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                other => other.get(segment),
            })
            .cloned()
            .unwrap_or(Value::Null)
    });
    selectors.register("domain.record", |state: &Value, args, _| {
        let domain = args.get("domain").and_then(Value::as_str);
        let id = args.get("id").and_then(Value::as_str);
        match (domain, id) {
            (Some(domain), Some(id)) => state
                .get(domain)
                .and_then(|records| records.get(id))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    });
}
