//! Interpreter configuration

/// Limits and switches for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Text content longer than this is reset to empty
    pub max_content: usize,
    /// Copies with more nodes than this are discarded
    pub max_copy: usize,
    /// Literal and duplicated strings are cut to this many bytes
    pub max_string: usize,
    /// Strings produced by operations are dropped above this many bytes
    pub max_result_string: usize,
    /// Allocation budget is `seed % (input_len * budget_factor + budget_base)`
    pub budget_factor: usize,
    pub budget_base: usize,
    /// Apply the allocation budget read from the first four input bytes
    pub use_budget: bool,
    /// Verify register handles after every step and the arena at the end
    pub check_consistency: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_content: 100,
            max_copy: 50,
            max_string: 100,
            max_result_string: 1000,
            budget_factor: 50,
            budget_base: 10,
            use_budget: true,
            check_consistency: cfg!(debug_assertions),
        }
    }
}

impl VmConfig {
    /// Allocation budget for an input of `input_len` bytes
    ///
    /// Zero means unlimited.
    pub fn budget_for(&self, seed: u32, input_len: usize) -> usize {
        let modulus = input_len
            .saturating_mul(self.budget_factor)
            .saturating_add(self.budget_base)
            .max(1);
        seed as usize % modulus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_content, 100);
        assert_eq!(config.max_copy, 50);
        assert_eq!(config.max_string, 100);
        assert_eq!(config.max_result_string, 1000);
    }

    #[test]
    fn test_budget_for() {
        let config = VmConfig::default();
        // 2 * 50 + 10 = 110
        assert_eq!(config.budget_for(0, 2), 0);
        assert_eq!(config.budget_for(115, 2), 5);
        assert_eq!(config.budget_for(109, 2), 109);
        assert_eq!(config.budget_for(u32::MAX, 0), u32::MAX as usize % 10);
    }
}
