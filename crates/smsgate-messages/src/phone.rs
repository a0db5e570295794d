// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient phone number normalization.

use phonenumber::country;
use phonenumber::{Mode, Type};

use smsgate_core::{GatewayError, PhoneError};

/// Parses a region code such as `RU` or `US`.
pub fn parse_region(code: &str) -> Result<country::Id, GatewayError> {
    code.parse::<country::Id>()
        .map_err(|_| GatewayError::Config(format!("unknown phone region `{code}`")))
}

/// Validates `input` as a mobile number and returns it in E.164 form.
///
/// Numbers without a country code are read as belonging to `region`.
pub fn normalize(input: &str, region: country::Id) -> Result<String, PhoneError> {
    let number = phonenumber::parse(Some(region), input)
        .map_err(|e| PhoneError::Unparsable(e.to_string()))?;

    if !number.is_valid() {
        return Err(PhoneError::Invalid);
    }

    match number.number_type(&phonenumber::metadata::DATABASE) {
        Type::Mobile | Type::FixedLineOrMobile => {}
        _ => return Err(PhoneError::NotMobile),
    }

    Ok(number.format().mode(Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ru() -> country::Id {
        parse_region("RU").unwrap()
    }

    #[test]
    fn national_format_becomes_e164() {
        assert_eq!(normalize("8 (916) 123-45-67", ru()).unwrap(), "+79161234567");
        assert_eq!(normalize("+7 916 123 45 67", ru()).unwrap(), "+79161234567");
    }

    #[test]
    fn international_number_ignores_region() {
        assert_eq!(normalize("+1 202-555-0123", ru()).unwrap(), "+12025550123");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize("not-a-number", ru()).is_err());
        assert!(normalize("", ru()).is_err());
    }

    #[test]
    fn landline_is_not_mobile() {
        assert_eq!(normalize("+74951234567", ru()), Err(PhoneError::NotMobile));
    }

    #[test]
    fn unknown_region_is_a_config_error() {
        assert!(matches!(parse_region("QQ"), Err(GatewayError::Config(_))));
    }

    proptest! {
        #[test]
        fn normalizing_twice_changes_nothing(subscriber in "9[0-9]{9}", prefix in prop::sample::select(vec!["+7", "8", "+7 ", "7"])) {
            let input = format!("{prefix}{subscriber}");
            if let Ok(once) = normalize(&input, ru()) {
                prop_assert_eq!(normalize(&once, ru()), Ok(once.clone()));
            }
        }

        #[test]
        fn normalization_is_idempotent_for_arbitrary_input(input in "[+0-9 ()-]{0,20}") {
            if let Ok(once) = normalize(&input, ru()) {
                prop_assert_eq!(normalize(&once, ru()), Ok(once.clone()));
            }
        }
    }
}
