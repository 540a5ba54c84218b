//! Call-argument and callback resolver.
//!
//! Storage operations take a variable number of arguments with an optional
//! options object just before a mandatory trailing callback. [`resolve`]
//! classifies the arguments once, by an ordered rule table, and returns
//! either the resolved `(options, callback)` pair or a setup error.
//!
//! Setup errors are the only errors the binding reports synchronously: with
//! no callback found there is nothing to report through.

use crate::callback::PendingCallback;
use crate::error::{BindingError, BindingResult};
use crate::host::{HostValue, OptionsObject};
use tracing::warn;

/// Where an operation expects its options and callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgLayout {
    /// Index of the optional options object, if the operation takes one.
    pub options: Option<usize>,
    /// Index of the callback when every argument is supplied.
    pub callback: usize,
}

impl ArgLayout {
    /// A lone callback in position 0.
    pub const ONE_ARG: ArgLayout = ArgLayout::callback_at(0);

    /// Callback at `callback`, no options slot.
    pub const fn callback_at(callback: usize) -> Self {
        Self {
            options: None,
            callback,
        }
    }

    /// Options at `options`, callback right after it.
    pub const fn with_options(options: usize) -> Self {
        Self {
            options: Some(options),
            callback: options + 1,
        }
    }
}

/// The outcome of a successful resolution.
#[derive(Debug)]
pub struct ResolvedCall {
    /// The options object, if the caller passed one. Other objects in the
    /// options slot resolve to `None`.
    pub options: Option<OptionsObject>,
    /// The callback every later result and error goes through.
    pub callback: PendingCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Callback at `layout.callback`, no options.
    TrailingCallback,
    /// Options omitted: callback sits in the options slot.
    CallbackInOptionsSlot,
    /// Options and callback both present.
    OptionsAndCallback,
}

struct Rule {
    matches: fn(&ArgLayout, &[HostValue]) -> bool,
    outcome: Outcome,
}

fn is_function_at(args: &[HostValue], index: usize) -> bool {
    args.get(index).is_some_and(HostValue::is_function)
}

/// Any object is accepted in the options slot; only options objects carry
/// readable properties.
fn is_object_at(args: &[HostValue], index: usize) -> bool {
    args.get(index).is_some_and(HostValue::is_object)
}

/// Evaluated in order; the first match wins.
const RULES: &[Rule] = &[
    Rule {
        matches: |layout, args| layout.options.is_none() && is_function_at(args, layout.callback),
        outcome: Outcome::TrailingCallback,
    },
    Rule {
        matches: |layout, args| {
            layout.options.is_some()
                && layout
                    .callback
                    .checked_sub(1)
                    .is_some_and(|index| is_function_at(args, index))
        },
        outcome: Outcome::CallbackInOptionsSlot,
    },
    Rule {
        matches: |layout, args| {
            layout
                .options
                .is_some_and(|index| is_object_at(args, index))
                && is_function_at(args, layout.callback)
        },
        outcome: Outcome::OptionsAndCallback,
    },
];

/// Locates the options object and callback of a call to `operation`.
///
/// `receiver` is bound as `this` when the callback is eventually invoked.
///
/// # Errors
///
/// Returns [`BindingError::Setup`] when `args` is empty or no rule locates a
/// callable argument.
pub fn resolve(
    operation: &str,
    receiver: &HostValue,
    args: &[HostValue],
    layout: ArgLayout,
) -> BindingResult<ResolvedCall> {
    if args.is_empty() {
        warn!(operation, "called without arguments");
        return Err(BindingError::missing_callback(operation));
    }

    let outcome = RULES
        .iter()
        .find(|rule| (rule.matches)(&layout, args))
        .map(|rule| rule.outcome);

    let (options, callback_index) = match outcome {
        Some(Outcome::TrailingCallback) => (None, layout.callback),
        Some(Outcome::CallbackInOptionsSlot) => (None, layout.callback - 1),
        Some(Outcome::OptionsAndCallback) => {
            let options = layout
                .options
                .and_then(|index| args.get(index))
                .and_then(HostValue::as_options)
                .cloned();
            (options, layout.callback)
        }
        None => {
            warn!(operation, argc = args.len(), "no callback argument");
            return Err(BindingError::missing_callback(operation));
        }
    };

    let function = args
        .get(callback_index)
        .and_then(HostValue::as_function)
        .cloned()
        .ok_or_else(|| BindingError::missing_callback(operation))?;

    Ok(ResolvedCall {
        options,
        callback: PendingCallback::new(function, receiver.clone()),
    })
}
