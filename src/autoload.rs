//! Module autoloading: resolves a uevent's `MODALIAS` to a kernel module,
//! deferring and retrying aliases that can't yet be resolved.

use std::collections::VecDeque;

/// Classification bitmask returned by a [`ModuleResolver`], generalizing
/// `insmod_by_dep`'s return value.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleLoadResult(u32);
bitflags! {
    impl ModuleLoadResult: u32 {
        /// The alias didn't resolve to any known module dependency graph —
        /// the backing filesystem (e.g. `/lib/modules`) may not be mounted
        /// yet.
        const BAD_DEP = 1 << 0;
        /// The caller is blacklisted from autoloading this module.
        const INVALID_CALLER_BLACK = 1 << 1;
        /// The alias itself didn't match any known module alias table
        /// entry yet.
        const BAD_ALIAS = 1 << 2;
    }
}

impl ModuleLoadResult {
    /// Mask of results that mean "retry later", not "this alias is
    /// permanently unloadable".
    const RETRYABLE: Self = Self::BAD_DEP.union(Self::INVALID_CALLER_BLACK).union(Self::BAD_ALIAS);

    /// Gets whether this result means the caller should defer `modalias`
    /// and retry it on a later event.
    pub const fn should_retry(self) -> bool {
        self.intersects(Self::RETRYABLE)
    }
}

/// Resolves a module alias to a loaded kernel module, generalizing
/// `insmod_by_dep`.
///
/// There is no meaningful no-op implementation of this trait — a host
/// embedding this crate must supply one backed by its own module-loading
/// mechanism (e.g. shelling out to `modprobe`, or a `libkmod` binding).
pub trait ModuleResolver {
    /// Attempts to load whatever module provides `modalias`.
    ///
    /// `blacklist` is the set of module names this resolver should refuse
    /// to load even on a direct match; `None` when the deferred-retry path
    /// is not subject to the blacklist that gates on-event loading (mirrors
    /// `module_probe`'s bypass of `ueventd`'s own blacklist).
    fn resolve(&mut self, modalias: &str, blacklist: Option<&std::collections::HashSet<String>>) -> ModuleLoadResult;
}

/// Drives the deferred-retry FIFO and blacklist-gated resolution described
/// by `handle_module_loading`/`handle_deferred_module_loading`.
#[derive(Default)]
pub struct ModuleAutoloader {
    blacklist: std::collections::HashSet<String>,
    deferred: VecDeque<String>,
}

impl ModuleAutoloader {
    /// Creates a new [ModuleAutoloader] with an empty blacklist and queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module name that autoloading must never load, even on a
    /// direct alias match.
    pub fn blacklist(&mut self, module: impl Into<String>) {
        self.blacklist.insert(module.into());
    }

    /// Gets whether `module` is blacklisted.
    pub fn is_blacklisted(&self, module: &str) -> bool {
        self.blacklist.contains(module)
    }

    /// Drains the deferred-retry queue, attempting each alias again; any
    /// alias that still isn't resolvable is pushed back onto the queue for
    /// the next call. Retries are gated by the same blacklist as a fresh
    /// attempt, matching `handle_deferred_module_loading`'s call to
    /// `insmod_by_dep` with `get_module_blacklist()` — only the unrelated
    /// `module_probe` path bypasses the blacklist.
    fn retry_deferred(&mut self, resolver: &mut dyn ModuleResolver) {
        let pending: Vec<String> = self.deferred.drain(..).collect();

        for modalias in pending {
            log::info!("deferred loading of module for {modalias}");
            let result = resolver.resolve(&modalias, Some(&self.blacklist));

            if result.should_retry() {
                self.deferred.push_back(modalias);
            }
        }
    }

    /// One-shot module load that bypasses both the deferral queue and the
    /// blacklist, matching `module_probe`'s direct `insmod_by_dep` call
    /// with no blacklist path ("not to reuse ueventd's black list").
    ///
    /// Unlike [`Self::handle_modalias`], this never defers: a transient
    /// failure is just reported to the caller via the returned
    /// [`ModuleLoadResult`], not queued for retry.
    pub fn probe_once(&self, modalias: &str, resolver: &mut dyn ModuleResolver) -> ModuleLoadResult {
        resolver.resolve(modalias, None)
    }

    /// Handles a `MODALIAS` from an `add` event: drains the deferred queue,
    /// then attempts `modalias` itself, deferring it if unresolved.
    ///
    /// A no-op if `modalias` is empty (no `MODALIAS` key on the event).
    pub fn handle_modalias(&mut self, modalias: &str, resolver: &mut dyn ModuleResolver) {
        self.retry_deferred(resolver);

        if modalias.is_empty() {
            return;
        }

        let result = resolver.resolve(modalias, Some(&self.blacklist));

        if result.should_retry() && !self.deferred.contains(&modalias.to_owned()) {
            log::info!("add to queue for deferred module loading: {modalias}");
            self.deferred.push_back(modalias.to_owned());
        }
    }

    /// Gets the number of aliases currently queued for retry.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}
