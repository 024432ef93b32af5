//! Order command: print the resolved execution order without running anything.

use cellflow_core::graph::{find_cycle, resolve_order};
use cellflow_core::{CellEngine, CellId, Error};

use crate::colors;
use crate::plan::Plan;

/// Print the order in which `cell` (or every cell) would run.
pub fn execute(plan_path: &str, cell: Option<&str>) -> anyhow::Result<()> {
    let plan = Plan::load(plan_path)?;
    let engine = CellEngine::new();
    plan.register(&engine);

    let registry = engine.snapshot();

    let roots: Vec<CellId> = match cell {
        Some(target) => vec![CellId::from(target)],
        None => registry.ids().cloned().collect(),
    };

    if let Some(cycle) = find_cycle(&registry, &roots) {
        anyhow::bail!("{}", Error::CyclicDependency(cycle));
    }

    let resolution = resolve_order(&registry, &roots);
    for missing in &resolution.missing {
        println!("{}warning:{} {}", colors::YELLOW, colors::RESET, missing);
    }

    for (index, id) in resolution.order.iter().enumerate() {
        let prerequisites = registry.prerequisites(id.as_str()).unwrap_or_default();
        if prerequisites.is_empty() {
            println!("{:>3}. {}", index + 1, id);
        } else {
            println!(
                "{:>3}. {} {}(after {}){}",
                index + 1,
                id,
                colors::DIM,
                prerequisites
                    .iter()
                    .map(CellId::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                colors::RESET
            );
        }
    }

    Ok(())
}
