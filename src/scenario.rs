//! End-to-end scenario registry.
//!
//! Each scenario names a node image the collector is exercised against.
//! `init_scenario_table` narrows the registry to the scenarios a run asked for.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// CPU architecture of a scenario's node image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

/// One E2E scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub distro: String,
    pub arch: Arch,
    pub gpu: bool,
}

/// Selected scenarios keyed by name.
pub type ScenarioTable = BTreeMap<String, Scenario>;

fn scenario(name: &str, description: &str, distro: &str, arch: Arch, gpu: bool) -> Scenario {
    Scenario {
        name: name.to_string(),
        description: description.to_string(),
        distro: distro.to_string(),
        arch,
        gpu,
    }
}

/// Every known scenario, in registration order.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "base",
            "default node image with no special configuration",
            "ubuntu1804",
            Arch::Amd64,
            false,
        ),
        scenario(
            "ubuntu2204",
            "Ubuntu 22.04 node image",
            "ubuntu2204",
            Arch::Amd64,
            false,
        ),
        scenario(
            "marinerv1",
            "CBL-Mariner 1.0 node image",
            "marinerv1",
            Arch::Amd64,
            false,
        ),
        scenario(
            "marinerv2",
            "CBL-Mariner 2.0 node image",
            "marinerv2",
            Arch::Amd64,
            false,
        ),
        scenario(
            "ubuntu2204-arm64",
            "Ubuntu 22.04 node image on an ARM64 VM size",
            "ubuntu2204",
            Arch::Arm64,
            false,
        ),
        scenario(
            "marinerv2-arm64",
            "CBL-Mariner 2.0 node image on an ARM64 VM size",
            "marinerv2",
            Arch::Arm64,
            false,
        ),
        scenario(
            "gpu",
            "Ubuntu 18.04 node image on a GPU VM size with driver install",
            "ubuntu1804",
            Arch::Amd64,
            true,
        ),
    ]
}

/// Build the table of scenarios to run.
///
/// `None` selects the whole registry. Names in `selection` that match no
/// scenario are warned about and otherwise ignored.
pub fn init_scenario_table(selection: Option<&BTreeSet<String>>) -> ScenarioTable {
    let registry = scenarios();
    if let Some(selection) = selection {
        for unknown in selection
            .iter()
            .filter(|name| !registry.iter().any(|scenario| &scenario.name == *name))
        {
            tracing::warn!(scenario = %unknown, "unknown E2E scenario requested");
        }
    }

    let mut table = ScenarioTable::new();
    for scenario in registry {
        if selection.is_some_and(|selection| !selection.contains(&scenario.name)) {
            continue;
        }
        tracing::info!(
            scenario = %scenario.name,
            description = %scenario.description,
            "will run E2E scenario"
        );
        table.insert(scenario.name.clone(), scenario);
    }
    table
}

/// Parse a comma-separated scenario list; blank items are dropped.
pub fn parse_selection(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
