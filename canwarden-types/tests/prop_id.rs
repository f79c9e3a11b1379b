use proptest::prelude::*;

use canwarden_types::{parse_can_id, IdError, IdValue, MAX_CAN_ID};

proptest! {
    #[test]
    fn in_range_integers_parse_to_themselves(id in 0u32..=MAX_CAN_ID) {
        prop_assert_eq!(parse_can_id(&IdValue::Int(i64::from(id)), "f"), Ok(id));
    }

    #[test]
    fn text_encodings_agree_with_the_integer_form(id in 0u32..=MAX_CAN_ID) {
        let lower = format!("0x{id:x}");
        let upper = format!("0X{id:X}");
        let decimal = id.to_string();
        prop_assert_eq!(parse_can_id(&IdValue::Text(&lower), "f"), Ok(id));
        prop_assert_eq!(parse_can_id(&IdValue::Text(&upper), "f"), Ok(id));
        prop_assert_eq!(parse_can_id(&IdValue::Text(&decimal), "f"), Ok(id));
    }

    #[test]
    fn surrounding_whitespace_and_underscores_are_cosmetic(id in 0u32..=MAX_CAN_ID) {
        let hex = format!("{id:X}");
        // Underscore after every digit, the way long IDs get grouped in
        // hand-written rules files.
        let grouped: String = hex.chars().flat_map(|c| [c, '_']).collect();
        let text = format!("  0x{grouped} ");
        prop_assert_eq!(parse_can_id(&IdValue::Text(&text), "f"), Ok(id));
    }

    #[test]
    fn out_of_range_integers_are_rejected(
        id in prop_oneof![
            i64::from(MAX_CAN_ID) + 1..=i64::MAX,
            i64::MIN..0i64,
        ]
    ) {
        let err = parse_can_id(&IdValue::Int(id), "f").unwrap_err();
        let is_out_of_range =
            matches!(err, IdError::OutOfRange { value, .. } if value == i128::from(id));
        prop_assert!(is_out_of_range);
    }

    #[test]
    fn arbitrary_text_never_panics(s in ".{0,64}") {
        let _ = parse_can_id(&IdValue::Text(&s), "f");
    }

    #[test]
    fn errors_carry_the_field_path(s in "[^0-9].{0,16}", field in "[a-z.\\[\\]]{1,24}") {
        if let Err(err) = parse_can_id(&IdValue::Text(&s), &field) {
            prop_assert!(err.to_string().starts_with(&field));
        }
    }
}
