//! Postfix evaluation against a single worker.
//!
//! Tokens are walked left to right. Literals go on a local stack; each
//! operator pops `b` then `a` and sends `a op b` to the selected worker with
//! the owner's delay for that operator. Calls are strictly sequential.

use std::sync::Arc;
use std::time::{Duration, Instant};

use distcalc_common::{OperationRequest, OwnerId};
use distcalc_metrics::MetricsRegistry;
use tracing::debug;

use crate::delays::DelayTable;
use crate::error::EvaluationError;
use crate::parser::{PostfixExpression, Token};
use crate::worker_client::WorkerClient;

pub struct Evaluator {
    client: Arc<dyn WorkerClient>,
    dispatch_timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl Evaluator {
    /// `dispatch_timeout` is added to each operator's delay to bound the
    /// corresponding `execute` call.
    pub fn new(
        client: Arc<dyn WorkerClient>,
        dispatch_timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            client,
            dispatch_timeout,
            metrics,
        }
    }

    pub async fn evaluate(
        &self,
        postfix: &PostfixExpression,
        worker: &str,
        delays: &DelayTable,
        owner: OwnerId,
    ) -> Result<f64, EvaluationError> {
        let mut stack: Vec<f64> = Vec::new();

        for token in postfix.tokens() {
            match token {
                Token::Literal(raw) => {
                    let value = raw.parse::<f64>().map_err(|_| {
                        EvaluationError::Malformed(format!("invalid literal '{}'", raw))
                    })?;
                    if !value.is_finite() {
                        return Err(EvaluationError::Overflow);
                    }
                    stack.push(value);
                }
                Token::Operator(op) => {
                    let (b, a) = match (stack.pop(), stack.pop()) {
                        (Some(b), Some(a)) => (b, a),
                        _ => {
                            return Err(EvaluationError::Malformed(format!(
                                "operator '{}' is missing an operand",
                                op
                            )))
                        }
                    };
                    let delay = delays
                        .delay_for(owner, op)
                        .await
                        .ok_or(EvaluationError::MissingDelay(op))?;

                    let request = OperationRequest {
                        op: op.symbol().to_string(),
                        a,
                        b,
                        delay_ms: delay.as_millis() as u64,
                    };
                    let value = self.call(worker, request, delay).await?;
                    debug!("{} {} {} = {} on {}", a, op, b, value, worker);
                    stack.push(value);
                }
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            _ => Err(EvaluationError::Malformed(format!(
                "expression left {} values on the stack",
                stack.len()
            ))),
        }
    }

    async fn call(
        &self,
        worker: &str,
        request: OperationRequest,
        delay: Duration,
    ) -> Result<f64, EvaluationError> {
        let timeout = delay + self.dispatch_timeout;
        let start = Instant::now();
        self.metrics.record_dispatch(worker);

        let result = match tokio::time::timeout(timeout, self.client.execute(worker, request, timeout)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EvaluationError::from_worker(worker, e)),
            Err(_) => Err(EvaluationError::Worker {
                worker: worker.to_string(),
                message: format!("execute timed out after {}ms", timeout.as_millis()),
            }),
        };

        self.metrics.record_call("execute", start, result.is_ok());
        result
    }
}
