//! Callback delivery.

use crate::error::BindingResult;
use crate::host::{HostFunction, HostValue};

/// A resolved callback waiting to be invoked.
///
/// Holds the function and the receiver it is called on. `complete` consumes
/// the callback, so it fires at most once.
#[derive(Debug)]
pub struct PendingCallback {
    function: HostFunction,
    receiver: HostValue,
}

impl PendingCallback {
    /// Retains `function` to be called later with `receiver` as `this`.
    pub fn new(function: HostFunction, receiver: HostValue) -> Self {
        Self { function, receiver }
    }

    /// Returns the callback function.
    pub fn function(&self) -> &HostFunction {
        &self.function
    }

    /// Invokes the callback with `(error-or-null, result...)`.
    ///
    /// `Ok(values)` becomes `(null, values...)`; `Err(e)` becomes `(error)`.
    pub fn complete(self, outcome: BindingResult<Vec<HostValue>>) {
        let argv = match outcome {
            Ok(values) => {
                let mut argv = Vec::with_capacity(values.len() + 1);
                argv.push(HostValue::Null);
                argv.extend(values);
                argv
            }
            Err(err) => vec![err.to_host_value()],
        };
        self.function.call(&self.receiver, &argv);
    }
}
