/// Initialization flags of the two provider components.
///
/// Only the combined `is_ready()` is meaningful to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub api_client: bool,
    pub identity: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.api_client && self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_needs_both_flags() {
        let mut readiness = Readiness::default();
        assert!(!readiness.is_ready());
        readiness.identity = true;
        assert!(!readiness.is_ready());
        readiness.api_client = true;
        assert!(readiness.is_ready());
    }
}
