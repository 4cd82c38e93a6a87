// Copyright 2024 The NativeLink Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error type shared by every crate in the task processor stack.
//!
//! Mirrors the gRPC-style status code taxonomy so the same `Error` can be
//! returned from a leaf validation helper or surfaced (eventually) across a
//! wire boundary without a conversion step.

use std::borrow::Cow;
use std::fmt;

/// Status codes, modeled after the gRPC status code space. Only the subset
/// actually produced by this crate's users is listed; the others exist so
/// downstream conversions (eg. from a future wire protocol) have a home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An error carrying a status [`Code`] and a breadcrumb trail of context
/// messages. Each call to [`ResultExt::err_tip`] appends a new message to
/// the back of the trail rather than replacing the original, so the trail
/// reads inner-to-outer when printed: the root cause first, each later
/// layer of context after it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Error {
    pub code: Code,
    pub messages: Vec<Cow<'static, str>>,
}

impl Error {
    #[must_use]
    pub fn new(code: Code, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            messages: vec![message.into()],
        }
    }

    /// Adds a context message to the back of the trail without changing
    /// `code`. Used by [`ResultExt::err_tip`].
    #[must_use]
    pub fn append(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.messages.push(message.into());
        self
    }

    /// Combines two errors into one, keeping `self`'s code and appending
    /// `other`'s messages to the trail. Used when an eviction-like event
    /// needs to report both the triggering condition and the original
    /// cause.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.messages.extend(other.messages);
        self
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {{ code: {:?}, messages: {:?} }}", self.code, self.messages)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} : {}", self.code, self.messages.join(" : "))
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::new(Code::Unknown, message)
    }
}

impl From<&'static str> for Error {
    fn from(message: &'static str) -> Self {
        Self::new(Code::Unknown, message)
    }
}

/// Adds `.err_tip()` style context-stacking to any `Result<T, Error>` (or
/// `Result<T, E: Into<Error>>`) and an infallible companion on `Option`.
pub trait ResultExt<T> {
    /// Adds a context message if this is an `Err`, lazily evaluated so the
    /// happy path pays nothing.
    fn err_tip<F: FnOnce() -> S, S: Into<Cow<'static, str>>>(self, tip_fn: F) -> Result<T, Error>;

    /// Like [`ResultExt::err_tip`] but also overrides the error's `code`.
    fn err_tip_with_code<F: FnOnce(&Error) -> (Code, S), S: Into<Cow<'static, str>>>(
        self,
        tip_fn: F,
    ) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn err_tip<F: FnOnce() -> S, S: Into<Cow<'static, str>>>(self, tip_fn: F) -> Result<T, Error> {
        self.map_err(|e| e.into().append(tip_fn()))
    }

    fn err_tip_with_code<F: FnOnce(&Error) -> (Code, S), S: Into<Cow<'static, str>>>(
        self,
        tip_fn: F,
    ) -> Result<T, Error> {
        self.map_err(|e| {
            let e = e.into();
            let (code, message) = tip_fn(&e);
            Error {
                code,
                ..e.append(message)
            }
        })
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn err_tip<F: FnOnce() -> S, S: Into<Cow<'static, str>>>(self, tip_fn: F) -> Result<T, Error> {
        self.ok_or_else(|| Error::new(Code::NotFound, tip_fn()))
    }

    fn err_tip_with_code<F: FnOnce(&Error) -> (Code, S), S: Into<Cow<'static, str>>>(
        self,
        tip_fn: F,
    ) -> Result<T, Error> {
        match self {
            Some(v) => Ok(v),
            None => {
                let placeholder = Error::new(Code::NotFound, "");
                let (code, message) = tip_fn(&placeholder);
                Err(Error::new(code, message))
            }
        }
    }
}

/// Builds an [`Error`] with an explicit [`Code`], formatting the remaining
/// arguments like `format!`.
#[macro_export]
macro_rules! make_err {
    ($code:expr, $($arg:tt)+) => {{
        $crate::Error::new($code, format!($($arg)+))
    }};
}

/// Shorthand for `make_err!(Code::InvalidArgument, ...)`; used for errors
/// whose root cause is bad caller input (unknown action name, bad task
/// type) rather than an internal invariant violation.
#[macro_export]
macro_rules! make_input_err {
    ($($arg:tt)+) => {{
        $crate::Error::new($crate::Code::InvalidArgument, format!($($arg)+))
    }};
}

/// Returns early with an error if `cond` holds. Mirrors an `assert!` but
/// produces a recoverable `Error` instead of panicking.
#[macro_export]
macro_rules! error_if {
    ($cond:expr, $($arg:tt)+) => {
        if $cond {
            return Err($crate::make_input_err!($($arg)+));
        }
    };
}
