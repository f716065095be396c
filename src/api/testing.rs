//! Drivers that run entry points against a scripted transport

use std::time::Instant;

use crate::http::mock::MockTransport;
use crate::platform::connector::NoOverflow;
use crate::platform::{
    ActionContext, ActionOutcome, ConnectorContext, ConnectorError, ConnectorRun, InvocationParams,
    MemoryContextStore, ScriptOutput,
};

use super::registry::{ActionFn, ConnectorFn};

pub fn run_action(action: ActionFn, params: &InvocationParams, mock: &MockTransport) -> (ActionOutcome, ScriptOutput) {
    let mut output = ScriptOutput::default();
    let outcome = {
        let mut ctx = ActionContext::new(params, &mut output, mock);
        action(&mut ctx)
    };
    (outcome, output)
}

/// Re-invocation of an async action with the state it returned earlier
pub fn resume_action(
    action: ActionFn,
    params: &InvocationParams,
    mock: &MockTransport,
    additional_data: &str,
) -> (ActionOutcome, ScriptOutput) {
    let mut output = ScriptOutput::default();
    let outcome = {
        let mut ctx = ActionContext::new(params, &mut output, mock);
        ctx.is_first_run = false;
        ctx.additional_data = Some(additional_data.to_string());
        action(&mut ctx)
    };
    (outcome, output)
}

pub fn run_connector(
    connector: ConnectorFn,
    params: &InvocationParams,
    mock: &MockTransport,
    store: &mut MemoryContextStore,
    is_test_run: bool,
) -> Result<ConnectorRun, ConnectorError> {
    let mut overflow = NoOverflow;
    let mut ctx = ConnectorContext {
        params,
        store,
        transports: mock,
        overflow: &mut overflow,
        is_test_run,
        started: Instant::now(),
    };
    connector(&mut ctx)
}
