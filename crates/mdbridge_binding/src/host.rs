//! Host runtime value model.
//!
//! The binding only needs a handful of questions answered about a host value:
//! is it absent, is it a byte buffer, how long is it, where are its bytes, what
//! is its UTF-8 text, is it callable, is it an options object. [`HostValue`]
//! models exactly that surface.
//!
//! Host objects belong to the host thread. Every type here is `!Send`, so a
//! live host buffer or callback cannot be moved onto a worker thread; worker
//! jobs must carry [`OwnedCopy`](crate::OwnedCopy) values instead.

use bytes::Bytes;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Pins a type to the host thread.
type HostThread = PhantomData<Rc<()>>;

/// A host-managed byte buffer.
///
/// Cloning a buffer clones the host's handle, not the bytes: every clone
/// points at the same storage, which stays alive while any handle does.
#[derive(Clone)]
pub struct HostBuffer {
    bytes: Bytes,
    _host: HostThread,
}

impl HostBuffer {
    /// Wraps bytes already owned by the host.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            _host: PhantomData,
        }
    }

    /// Allocates a host buffer holding a copy of `data`.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(data),
            _host: PhantomData,
        }
    }

    /// Creates a zero-length buffer.
    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
            _host: PhantomData,
        }
    }

    /// Returns the byte length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a pointer to the buffer's storage.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Returns the buffer's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("len", &self.len())
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

impl PartialEq for HostBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl From<Vec<u8>> for HostBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for HostBuffer {
    fn from(data: &[u8]) -> Self {
        Self::copy_from_slice(data)
    }
}

/// A callable host function.
///
/// Invoked as `function.call(receiver, argv)`.
#[derive(Clone)]
pub struct HostFunction {
    inner: Rc<dyn Fn(&HostValue, &[HostValue])>,
}

impl HostFunction {
    /// Wraps a closure as a host function.
    pub fn new(f: impl Fn(&HostValue, &[HostValue]) + 'static) -> Self {
        Self { inner: Rc::new(f) }
    }

    /// Calls the function with `receiver` bound as `this`.
    pub fn call(&self, receiver: &HostValue, argv: &[HostValue]) {
        (self.inner)(receiver, argv);
    }

    /// Returns true if both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction")
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// A plain options object: string-keyed properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsObject {
    props: BTreeMap<String, HostValue>,
}

impl OptionsObject {
    /// Creates an empty options object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<HostValue>) {
        self.props.insert(key.into(), value.into());
    }

    /// Reads a property.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.props.get(key)
    }

    /// Reads a boolean property; non-boolean values are ignored.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.props.get(key) {
            Some(HostValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}

/// A value owned by the host runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HostValue {
    /// `undefined`, also used for missing arguments.
    #[default]
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Boolean(bool),
    /// A number.
    Number(f64),
    /// A string.
    Text(String),
    /// A byte buffer.
    Buffer(HostBuffer),
    /// An array.
    Array(Vec<HostValue>),
    /// A plain options object.
    Options(OptionsObject),
    /// A callable function.
    Function(HostFunction),
    /// An error object carrying its message.
    Error(String),
}

impl HostValue {
    /// Returns true for `null` and `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// Returns true for object values: options, arrays, buffers, functions
    /// and errors.
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            HostValue::Options(_)
                | HostValue::Array(_)
                | HostValue::Buffer(_)
                | HostValue::Function(_)
                | HostValue::Error(_)
        )
    }

    /// Returns true if the value is callable.
    pub fn is_function(&self) -> bool {
        matches!(self, HostValue::Function(_))
    }

    /// Returns the buffer if this value is one.
    pub fn as_buffer(&self) -> Option<&HostBuffer> {
        match self {
            HostValue::Buffer(buf) => Some(buf),
            _ => None,
        }
    }

    /// Returns the options object if this value is one.
    pub fn as_options(&self) -> Option<&OptionsObject> {
        match self {
            HostValue::Options(opts) => Some(opts),
            _ => None,
        }
    }

    /// Returns the function if this value is one.
    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the string if this value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to its host string form.
    ///
    /// Buffers decode lossily as UTF-8. Non-string values stringify the way
    /// the host's `String(value)` does.
    pub fn to_host_string(&self) -> Cow<'_, str> {
        match self {
            HostValue::Undefined => Cow::Borrowed("undefined"),
            HostValue::Null => Cow::Borrowed("null"),
            HostValue::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            HostValue::Number(n) => Cow::Owned(format_number(*n)),
            HostValue::Text(s) => Cow::Borrowed(s),
            HostValue::Buffer(buf) => String::from_utf8_lossy(buf.as_bytes()),
            HostValue::Array(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            Cow::Borrowed("")
                        } else {
                            item.to_host_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            HostValue::Options(_) => Cow::Borrowed("[object Object]"),
            HostValue::Function(_) => Cow::Borrowed("function () { [native code] }"),
            HostValue::Error(msg) => Cow::Owned(format!("Error: {msg}")),
        }
    }

    /// Returns the byte length the binding would marshal for this value.
    ///
    /// Buffers report their own length; anything else reports the length of
    /// its UTF-8 string form.
    pub fn byte_length(&self) -> usize {
        match self {
            HostValue::Buffer(buf) => buf.len(),
            other => other.to_host_string().len(),
        }
    }
}

/// Formats a number like the host's `String(number)`: shortest round-trip
/// digits, plain notation in `[1e-6, 1e21)`, exponent form outside it.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // Covers -0
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&n.abs()) {
        return n.to_string();
    }

    let exp = format!("{n:e}");
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
        _ => exp,
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Text(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Text(s)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<HostBuffer> for HostValue {
    fn from(buf: HostBuffer) -> Self {
        HostValue::Buffer(buf)
    }
}

impl From<OptionsObject> for HostValue {
    fn from(opts: OptionsObject) -> Self {
        HostValue::Options(opts)
    }
}

impl From<HostFunction> for HostValue {
    fn from(f: HostFunction) -> Self {
        HostValue::Function(f)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Array(items)
    }
}
