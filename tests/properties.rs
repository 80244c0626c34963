use proptest::prelude::*;
use sheetpack::sheet::column_width;
use sheetpack::{
    resolve_sheet_names, sheet_name_len, StyleCatalog, StyleDescriptor, MAX_SHEET_NAME_LEN,
};
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn equal_styles_share_one_index(codes in proptest::collection::vec("[0#.,%]{1,6}", 1..40)) {
        let mut catalog = StyleCatalog::new();
        let mut seen = std::collections::HashMap::new();
        for code in &codes {
            let index = catalog.record(&StyleDescriptor::with_number_format(code.as_str()));
            let first = *seen.entry(code.clone()).or_insert(index);
            prop_assert_eq!(first, index);
            prop_assert!(catalog.contains_index(index));
        }
        prop_assert_eq!(catalog.len(), seen.len() + 1);
    }

    #[test]
    fn sheet_names_fit_and_stay_distinct(
        ids in proptest::collection::hash_set("[a-z_\u{1F600}\u{E9}]{1,40}", 1..40)
    ) {
        let ids: Vec<String> = ids.into_iter().collect();
        let names = resolve_sheet_names(&ids).unwrap();

        prop_assert_eq!(names.len(), ids.len());
        let distinct: HashSet<&String> = names.values().collect();
        prop_assert_eq!(distinct.len(), ids.len());
        for (id, name) in &names {
            prop_assert!(sheet_name_len(name) <= MAX_SHEET_NAME_LEN);
            if sheet_name_len(id) <= MAX_SHEET_NAME_LEN {
                prop_assert_eq!(id, name);
            }
        }
    }

    #[test]
    fn column_width_is_bounded(
        lens in proptest::collection::vec(0usize..200, 0..30),
        header_len in 0usize..60,
    ) {
        let max_len = lens.iter().copied().max().unwrap_or(0).max(header_len);
        let total_len = lens.iter().sum::<usize>() + header_len;
        let width = column_width(max_len, total_len, lens.len(), header_len);

        prop_assert!(width >= header_len as f64 * 1.2 - 1e-9);
        prop_assert!(width <= header_len.max(45) as f64 * 1.2 + 1e-9);
    }
}
