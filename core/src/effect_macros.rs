//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants, particularly
//! for async work and cancellable timers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use link_session_core::async_effect;
///
/// async_effect! {
///     let result = cache.acquire(fetcher.as_ref(), true, &options).await;
///     Some(SessionAction::TokenAcquired { request, result })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use link_session_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(30),
///     action: SessionAction::RefreshDue { generation: 1 }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create an `Effect::Cancellable` around another effect
///
/// # Example
///
/// ```rust,ignore
/// use link_session_core::{cancellable, delay};
///
/// cancellable! {
///     id: REFRESH_TIMER,
///     effect: delay! { duration: wait, action: SessionAction::RefreshDue { generation } }
/// }
/// ```
#[macro_export]
macro_rules! cancellable {
    (
        id: $id:expr,
        effect: $effect:expr
    ) => {
        $crate::effect::Effect::Cancellable {
            id: $id,
            effect: ::std::boxed::Box::new($effect),
        }
    };
}
