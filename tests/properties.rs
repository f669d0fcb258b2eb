use std::collections::HashSet;

use csv2sqlite::{
    data::{Row, Value},
    foreign_keys::{patch_rows, resolve_foreign_keys},
    inference::{classify_value, infer_kind},
    mapping::{ColumnRule, DataKind, KeyRole, MappingFile},
    naming::{sanitize_header, uniquify_names},
    store::{SqliteStore, Store},
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn signed_digit_runs_classify_as_integer(
        sign in prop_oneof![Just(""), Just("+"), Just("-")],
        digits in "[0-9]{1,18}"
    ) {
        prop_assert_eq!(classify_value(&format!("{sign}{digits}")), DataKind::Integer);
    }

    #[test]
    fn single_decimal_point_classifies_as_real(
        whole in "[0-9]{0,8}",
        fraction in "[0-9]{0,8}"
    ) {
        prop_assume!(!(whole.is_empty() && fraction.is_empty()));
        prop_assert_eq!(classify_value(&format!("{whole}.{fraction}")), DataKind::Real);
    }

    #[test]
    fn any_text_cell_makes_the_column_text(
        numbers in proptest::collection::vec("[0-9]{1,6}", 0..20),
        word in "[a-z]{1,6}",
        position in 0usize..20
    ) {
        let mut cells = numbers.into_iter().map(|n| vec![n]).collect::<Vec<_>>();
        let position = position.min(cells.len());
        cells.insert(position, vec![word]);
        prop_assert_eq!(infer_kind(&cells, 0, 0), DataKind::Text);
    }

    #[test]
    fn integer_and_real_mix_is_real(
        integers in proptest::collection::vec("[0-9]{1,6}", 0..10),
        reals in proptest::collection::vec("[0-9]{1,4}\\.[0-9]{1,4}", 1..10)
    ) {
        let cells = integers
            .into_iter()
            .chain(reals)
            .map(|cell| vec![cell])
            .collect::<Vec<_>>();
        prop_assert_eq!(infer_kind(&cells, 0, 0), DataKind::Real);
    }

    #[test]
    fn uniquified_names_are_distinct_and_stable(
        names in proptest::collection::vec(prop_oneof![
            Just("id".to_string()),
            Just("id_1".to_string()),
            Just("ID".to_string()),
            Just("name".to_string()),
            "[a-c]{1,2}",
        ], 0..12)
    ) {
        let unique = uniquify_names(&names);
        prop_assert_eq!(unique.len(), names.len());
        let distinct = unique
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect::<HashSet<_>>();
        prop_assert_eq!(distinct.len(), unique.len());
        prop_assert_eq!(uniquify_names(&unique), unique.clone());
    }

    #[test]
    fn sanitized_headers_are_identifier_safe(header in ".{0,24}") {
        let sanitized = sanitize_header(&header);
        prop_assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn patched_ids_come_from_the_resolution_table(
        cities in proptest::collection::vec("[A-Z][a-z]{0,3}", 1..40),
        seeded in proptest::collection::vec("[A-Z][a-z]{0,3}", 0..5)
    ) {
        let mut store = SqliteStore::in_memory().unwrap();
        let input = cities
            .iter()
            .enumerate()
            .map(|(idx, city)| vec![format!("p{idx}"), city.clone()])
            .collect::<Vec<Row>>();
        let mapping = city_mapping().resolve(None, &input, 0).unwrap();
        store.create_table(&mapping).unwrap();
        for value in seeded.iter().collect::<HashSet<_>>() {
            store.insert("city", &[("value", Value::from(value.as_str()))]).unwrap();
        }

        let tables = resolve_foreign_keys(&mut store, &mapping, &input).unwrap();
        let table = &tables[0];
        let distinct = cities.iter().collect::<HashSet<_>>();
        prop_assert!(table.len() >= distinct.len());

        let patched = patch_rows(input.clone(), &tables);
        prop_assert!(patched.unresolved.is_empty());
        for (raw, cells) in input.iter().zip(&patched.rows) {
            let Value::Integer(id) = cells[1] else {
                return Err(TestCaseError::fail(format!("unpatched cell {:?}", cells[1])));
            };
            prop_assert!(table.contains_id(id));
            prop_assert_eq!(table.id_for(&raw[1]), Some(id));
            prop_assert_eq!(&cells[0], &Value::Text(raw[0].clone()));
        }
    }
}

fn city_mapping() -> MappingFile {
    let mut name = ColumnRule::new(0);
    name.column_name = Some("name".into());
    name.data_type = Some(DataKind::Text);
    let mut city = ColumnRule::new(1);
    city.column_name = Some("city".into());
    city.data_type = Some(DataKind::Text);
    city.key = Some(KeyRole::Fk);
    MappingFile::new("people", vec![name, city])
}
