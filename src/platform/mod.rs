//! Platform Module - narrow interfaces to the SOAR host
//!
//! The host hands every script its parameters, collects its results and keeps
//! the connector context. Each concern is a separate interface here:
//!
//! - `params.rs`: typed parameter extraction
//! - `result.rs`: outcome, tables, links, attachments
//! - `context.rs`: connector key-value context
//! - `alert.rs`: alert/event model
//! - `action.rs`: action context and the single failure funnel
//! - `connector.rs`: the connector cycle

pub mod action;
pub mod alert;
pub mod connector;
pub mod context;
pub mod params;
pub mod result;

pub use action::{conclude, ActionContext};
pub use alert::{AlertInfo, EnvironmentResolver, Event, Priority};
pub use connector::{
    run_connector, AlertSource, ConnectorContext, ConnectorError, ConnectorRun, ConnectorSettings,
};
pub use context::{ContextStore, FileContextStore, MemoryContextStore};
pub use params::{Invocation, InvocationParams, Param, ParamError, ParameterSource};
pub use result::{
    ActionOutcome, Attachment, CsvRow, DataTable, ExecutionState, ResultSink, ScriptOutput,
    ScriptResult, Tabular,
};
