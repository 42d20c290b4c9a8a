//! The HTN planning core: agent catalogs, the decomposition kernel, and the
//! primitive operations that carry a plan from spec to SQL.

mod agent;
mod builtin;
mod kernel;
mod primitives;

pub use agent::{
    compile, load_agents_from_dir, AgentConfig, Method, MethodCatalog, MethodConfig, Predicate,
    PredicateConfig, PredicateOp, Step, StepConfig, TaskConfig,
};
pub use builtin::{builtin_agents, DEFAULT_AGENT, ROOT_TASK};
pub use kernel::{plan, CancellationToken};
pub use primitives::{PrimitiveCtx, PrimitiveRegistry};
