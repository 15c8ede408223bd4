/// How persistent ids are assigned to new entities
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PidType {
    /// Each entity gets a unique random pid
    #[default]
    RandomPids,
    /// The pid of an entity is its id
    UsePidAsId,
}

/// Configuration of an [`EntityStore`](crate::EntityStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub pid_type: PidType,
    /// Initial row capacity of new archetypes
    pub default_capacity: usize,
    /// Seed for random pids. Uses entropy if `None`
    pub seed: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pid_type: PidType::default(),
            default_capacity: 32,
            seed: None,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pid_type(mut self, pid_type: PidType) -> Self {
        self.pid_type = pid_type;
        self
    }

    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
