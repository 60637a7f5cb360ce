/// Longest chain of nested resolutions a single request may build
///
/// Cycles are normally caught as soon as they repeat, this bound only stops
/// configurations which keep producing new services without ever repeating one.
///
/// Every nested resolution adds a few frames to the stack polling the request.
/// Unoptimized builds on a 2 MiB thread (the default for spawned threads and tests)
/// overflow somewhere between 150 and 200 levels, so the default stays below that.
/// Raise it only together with the stack size of the threads driving resolutions.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// Tunables of a [crate::ServiceContainer]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSettings {
    pub max_resolution_depth: usize,
}
impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
        }
    }
}
impl ContainerSettings {
    pub fn with_max_resolution_depth(mut self, max_resolution_depth: usize) -> Self {
        self.max_resolution_depth = max_resolution_depth;
        self
    }
}
