use std::collections::HashSet;

use scopy_core::store::DocumentStore;

/// 记录已占用的图纸编号与视图名称（不区分大小写）。
///
/// 查询与登记分离：`allocate_*` 只做查询，调用方确认候选值后再调用
/// `register_*` 登记，因此可以反复试探同一个候选而不会自我冲突。
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    persisted_sheet_numbers: HashSet<String>,
    persisted_view_names: HashSet<String>,
    batch_sheet_numbers: HashSet<String>,
    batch_view_names: HashSet<String>,
}

#[inline]
fn key(value: &str) -> String {
    value.to_uppercase()
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以文档中已有的图纸编号与视图名称作为初始占用集合。
    pub fn from_store<S: DocumentStore>(store: &S) -> Self {
        let mut registry = Self::new();
        for sheet in store.sheets() {
            registry.persisted_sheet_numbers.insert(key(&sheet.number));
        }
        for view in store.views() {
            registry.persisted_view_names.insert(key(&view.name));
        }
        registry
    }

    pub fn with_persisted<'a>(
        sheet_numbers: impl IntoIterator<Item = &'a str>,
        view_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            persisted_sheet_numbers: sheet_numbers.into_iter().map(key).collect(),
            persisted_view_names: view_names.into_iter().map(key).collect(),
            ..Self::default()
        }
    }

    pub fn is_sheet_number_available(&self, number: &str) -> bool {
        let key = key(number);
        !self.persisted_sheet_numbers.contains(&key) && !self.batch_sheet_numbers.contains(&key)
    }

    pub fn is_view_name_available(&self, name: &str) -> bool {
        let key = key(name);
        !self.persisted_view_names.contains(&key) && !self.batch_view_names.contains(&key)
    }

    /// 依次尝试 `base-1`、`base-2`……返回第一个可用编号。后缀没有上限。
    pub fn allocate_derived_sheet_number(&self, base: &str) -> String {
        derive_candidate(base, |candidate| self.is_sheet_number_available(candidate))
    }

    /// 与图纸编号相同的后缀规则，用于派生视图名称。
    pub fn allocate_derived_view_name(&self, base: &str) -> String {
        derive_candidate(base, |candidate| self.is_view_name_available(candidate))
    }

    /// 登记图纸编号，返回该编号此前是否未被占用。
    pub fn register_sheet_number(&mut self, number: &str) -> bool {
        let key = key(number);
        if self.persisted_sheet_numbers.contains(&key) {
            return false;
        }
        self.batch_sheet_numbers.insert(key)
    }

    pub fn register_view_name(&mut self, name: &str) -> bool {
        let key = key(name);
        if self.persisted_view_names.contains(&key) {
            return false;
        }
        self.batch_view_names.insert(key)
    }

    #[inline]
    pub fn registered_sheet_count(&self) -> usize {
        self.batch_sheet_numbers.len()
    }

    #[inline]
    pub fn registered_view_count(&self) -> usize {
        self.batch_view_names.len()
    }
}

fn derive_candidate(base: &str, available: impl Fn(&str) -> bool) -> String {
    let mut suffix: u64 = 0;
    loop {
        suffix += 1;
        let candidate = format!("{base}-{suffix}");
        if available(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_ignores_case() {
        let mut registry = IdentifierRegistry::with_persisted(["A1"], ["Level 1"]);
        assert!(!registry.is_sheet_number_available("a1"));
        assert!(!registry.is_view_name_available("LEVEL 1"));

        assert!(registry.register_sheet_number("b2"));
        assert!(!registry.is_sheet_number_available("B2"));
        assert!(!registry.register_sheet_number("B2"));
    }

    #[test]
    fn allocation_is_a_pure_query() {
        let mut registry = IdentifierRegistry::with_persisted(["A101"], []);
        let first = registry.allocate_derived_sheet_number("A101");
        let again = registry.allocate_derived_sheet_number("A101");
        assert_eq!(first, "A101-1");
        assert_eq!(first, again);
        assert!(registry.is_sheet_number_available(&first));

        registry.register_sheet_number(&first);
        assert!(!registry.is_sheet_number_available(&first));
        assert_eq!(registry.allocate_derived_sheet_number("A101"), "A101-2");
    }

    #[test]
    fn derived_numbers_are_pairwise_distinct() {
        let mut registry = IdentifierRegistry::with_persisted(["A101", "a101-3"], []);
        let mut seen = HashSet::new();
        for _ in 0..12 {
            let number = registry.allocate_derived_sheet_number("A101");
            assert!(registry.register_sheet_number(&number));
            assert!(seen.insert(number));
        }
        assert!(!seen.contains("A101-3"));
        assert!(seen.contains("A101-12"));
        assert!(seen.contains("A101-13"));
        assert_eq!(registry.registered_sheet_count(), 12);
    }

    #[test]
    fn persisted_names_cannot_be_registered_again() {
        let mut registry = IdentifierRegistry::with_persisted([], ["Section 1"]);
        assert!(!registry.register_view_name("section 1"));
        assert_eq!(registry.registered_view_count(), 0);
        assert_eq!(registry.allocate_derived_view_name("Section 1"), "Section 1-1");
    }
}
