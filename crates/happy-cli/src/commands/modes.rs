use std::fmt::Write;

use clap::ValueEnum;
use happy_shared::modes::{AgentFlavor, model_modes_for_flavor, permission_modes_for_flavor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flavor {
    Claude,
    Codex,
    Gemini,
}

impl From<Flavor> for AgentFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Claude => AgentFlavor::Claude,
            Flavor::Codex => AgentFlavor::Codex,
            Flavor::Gemini => AgentFlavor::Gemini,
        }
    }
}

/// Selector listing for one flavor, in cycle order.
pub fn describe(flavor: AgentFlavor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{flavor:?}");
    let _ = writeln!(out, "  Permission modes:");
    for mode in permission_modes_for_flavor(flavor) {
        let _ = writeln!(out, "    {:<12} {}", mode.label(), mode.description());
    }
    let models = model_modes_for_flavor(flavor);
    if models.is_empty() {
        let _ = writeln!(out, "  Model modes: none");
    } else {
        let _ = writeln!(out, "  Model modes:");
        for mode in models {
            let _ = writeln!(out, "    {}", mode.label());
        }
    }
    out
}

/// Print the modes for `flavor`, or for every flavor.
pub fn run(flavor: Option<Flavor>) -> anyhow::Result<()> {
    let flavors: Vec<AgentFlavor> = match flavor {
        Some(f) => vec![f.into()],
        None => vec![AgentFlavor::Claude, AgentFlavor::Codex, AgentFlavor::Gemini],
    };
    for (i, flavor) in flavors.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", describe(flavor));
    }
    Ok(())
}
