//! Registry trait for self-registering implementations.
//!
//! Pluggable backends (storage, custody ledger) expose a `Registry` type that
//! names the implementation as it appears in configuration and hands out the
//! factory that builds it.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Key of the implementation under its `implementations` table, for example
	/// `"memory"` in `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// Factory signature, defined by each pluggable module.
	type Factory;

	/// Returns the factory that builds this implementation from its config table.
	fn factory() -> Self::Factory;
}
