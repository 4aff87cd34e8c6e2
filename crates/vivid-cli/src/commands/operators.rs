//! Operator catalogue listing.

use clap::Args;

use vivid_registry::OperatorRegistry;

use crate::EXIT_OK;

/// Arguments for `vivid operators`.
#[derive(Args, Debug)]
pub struct OperatorsArgs {
    /// Filter by output kind (Texture, Audio, Value, AudioValue).
    #[arg(long)]
    pub kind: Option<String>,

    /// Also list each operator's parameters with ranges and defaults.
    #[arg(long)]
    pub params: bool,
}

/// Prints the registered operator types.
pub fn run(args: OperatorsArgs) -> anyhow::Result<i32> {
    let registry = OperatorRegistry::new();

    for descriptor in registry.all() {
        if let Some(filter) = &args.kind
            && !descriptor.kind.tag().eq_ignore_ascii_case(filter)
        {
            continue;
        }
        println!(
            "{:<14} {:<11} {}",
            descriptor.id,
            descriptor.kind.tag(),
            descriptor.description
        );
        if args.params
            && let Some(op) = registry.create(descriptor.id)
        {
            for decl in op.params() {
                println!(
                    "    {:<12} {:<6} [{} .. {}] default {:?}",
                    decl.name,
                    decl.kind.tag(),
                    decl.min,
                    decl.max,
                    &decl.default[..decl.kind.components()]
                );
            }
        }
    }

    Ok(EXIT_OK)
}
