/// Router Module Index
///
/// Splits routing by whether the caller context affects the response.

/// Routes whose response never depends on the caller.
/// These return data unfiltered and are meant for trusted consumers or public feeds.
pub mod public;

/// Routes that resolve the optional caller context (`MaybeUser`) and apply the
/// visibility policy or record the caller as author.
pub mod caller_aware;
