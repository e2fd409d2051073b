//! CLI subcommand implementations

pub mod invoke;
pub mod pending;
pub mod status;

use clap::ValueEnum;

/// Resource kind as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    #[value(alias = "AutoscalingGroup")]
    AutoscalingGroup,
    #[value(alias = "ComputeInstance")]
    ComputeInstance,
    #[value(alias = "DatabaseInstance")]
    DatabaseInstance,
    #[value(name = "function", aliases = ["FunctionResource", "function-resource"])]
    FunctionResource,
}

impl KindArg {
    /// Name the service uses for this kind
    pub fn api_name(&self) -> &'static str {
        match self {
            KindArg::AutoscalingGroup => "AutoscalingGroup",
            KindArg::ComputeInstance => "ComputeInstance",
            KindArg::DatabaseInstance => "DatabaseInstance",
            KindArg::FunctionResource => "FunctionResource",
        }
    }
}
