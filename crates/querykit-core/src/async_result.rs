//! Lifecycle state of a remote operation.
//!
//! [`AsyncResult`] replaces ad-hoc `loading`/`error`/`data` flags with a
//! single closed enum. Consumers are expected to [`fold`](AsyncResult::fold)
//! over it (or `match`), so adding a state is a compile error everywhere the
//! value is consumed.
//!
//! # Examples
//!
//! ```rust
//! use querykit_core::AsyncResult;
//!
//! let state: AsyncResult<String, u32> = AsyncResult::success(41);
//! let label = state.map(|n| n + 1).fold(
//!     || "idle".to_string(),
//!     || "loading".to_string(),
//!     |err| format!("failed: {err}"),
//!     |n| format!("got {n}"),
//! );
//! assert_eq!(label, "got 42");
//! ```

/// The state of a remote operation.
///
/// `Failure` and `Success` are terminal: once a logical request reaches one
/// of them the value never changes. A new request produces a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AsyncResult<E, A> {
    /// No request has been issued yet.
    #[default]
    NotStarted,

    /// A request has been issued and has not produced a terminal outcome.
    InProgress,

    /// The request failed; carries the classified error.
    Failure(E),

    /// The request succeeded; carries the decoded payload.
    Success(A),
}

impl<E, A> AsyncResult<E, A> {
    /// Create a `NotStarted` value.
    pub const fn not_started() -> Self {
        Self::NotStarted
    }

    /// Create an `InProgress` value.
    pub const fn in_progress() -> Self {
        Self::InProgress
    }

    /// Create a terminal `Success` value.
    pub const fn success(value: A) -> Self {
        Self::Success(value)
    }

    /// Create a terminal `Failure` value.
    pub const fn failure(error: E) -> Self {
        Self::Failure(error)
    }

    /// Consume the value, dispatching to exactly one of the four handlers.
    pub fn fold<R>(
        self,
        on_not_started: impl FnOnce() -> R,
        on_in_progress: impl FnOnce() -> R,
        on_failure: impl FnOnce(E) -> R,
        on_success: impl FnOnce(A) -> R,
    ) -> R {
        match self {
            Self::NotStarted => on_not_started(),
            Self::InProgress => on_in_progress(),
            Self::Failure(error) => on_failure(error),
            Self::Success(value) => on_success(value),
        }
    }

    /// Like [`fold`](Self::fold) but borrows the payloads.
    pub fn fold_ref<R>(
        &self,
        on_not_started: impl FnOnce() -> R,
        on_in_progress: impl FnOnce() -> R,
        on_failure: impl FnOnce(&E) -> R,
        on_success: impl FnOnce(&A) -> R,
    ) -> R {
        self.as_ref()
            .fold(on_not_started, on_in_progress, on_failure, on_success)
    }

    /// Apply `f` to a `Success` payload; every other state passes through.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> AsyncResult<E, B> {
        match self {
            Self::NotStarted => AsyncResult::NotStarted,
            Self::InProgress => AsyncResult::InProgress,
            Self::Failure(error) => AsyncResult::Failure(error),
            Self::Success(value) => AsyncResult::Success(f(value)),
        }
    }

    /// Apply `f` to a `Failure` payload; every other state passes through.
    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> AsyncResult<F, A> {
        match self {
            Self::NotStarted => AsyncResult::NotStarted,
            Self::InProgress => AsyncResult::InProgress,
            Self::Failure(error) => AsyncResult::Failure(f(error)),
            Self::Success(value) => AsyncResult::Success(value),
        }
    }

    /// Borrow the payloads.
    pub fn as_ref(&self) -> AsyncResult<&E, &A> {
        match self {
            Self::NotStarted => AsyncResult::NotStarted,
            Self::InProgress => AsyncResult::InProgress,
            Self::Failure(error) => AsyncResult::Failure(error),
            Self::Success(value) => AsyncResult::Success(value),
        }
    }

    /// The success value, or `None` for any other state.
    pub fn to_option(self) -> Option<A> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the success value, if any.
    pub fn success_ref(&self) -> Option<&A> {
        self.as_ref().to_option()
    }

    /// Borrow the failure value, if any.
    pub fn failure_ref(&self) -> Option<&E> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Convert a terminal state into a `Result`; `None` while not terminal.
    pub fn into_result(self) -> Option<Result<A, E>> {
        match self {
            Self::NotStarted | Self::InProgress => None,
            Self::Failure(error) => Some(Err(error)),
            Self::Success(value) => Some(Ok(value)),
        }
    }

    /// `true` for `NotStarted`.
    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// `true` for `InProgress`.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// `true` for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// `true` for `Failure`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// `true` for `Success` and `Failure`.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl<E, A> From<Result<A, E>> for AsyncResult<E, A> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}
