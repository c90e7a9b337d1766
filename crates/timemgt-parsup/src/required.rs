use crate::error::ParamError;
use crate::value::Params;

/// Field name paired with the message reported when it is absent.
pub type Rule<'a> = (&'a str, &'a str);

/// Check that every ruled field is present. All missing messages are
/// reported together, space-joined, in rule order.
///
/// Presence means the key exists; `""` or `null` satisfies the rule.
pub fn check_required(params: &Params, rules: &[Rule<'_>]) -> Result<(), ParamError> {
    let missing: Vec<&str> = rules
        .iter()
        .filter(|(field, _)| !params.contains_key(field))
        .map(|(_, message)| *message)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParamError::MissingFields(missing.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::ParamsPolicy;

    const RULES: &[Rule<'static>] = &[
        ("name", "tag name is required"),
        ("color", "color is required"),
        ("id", "tag id is required"),
    ];

    #[test]
    fn empty_object_reports_every_message() {
        let params = ParamsPolicy::default().sanitize(b"{}").unwrap();
        let err = check_required(&params, RULES).unwrap_err();
        let ParamError::MissingFields(message) = err else {
            panic!("expected MissingFields");
        };
        for (_, expected) in RULES {
            assert!(message.contains(expected), "{message}");
        }
    }

    #[test]
    fn present_but_empty_values_pass() {
        let params = ParamsPolicy::default()
            .sanitize(br#"{"name": "", "color": null, "id": ""}"#)
            .unwrap();
        assert_eq!(check_required(&params, RULES), Ok(()));
    }

    #[test]
    fn only_missing_fields_are_reported() {
        let params = ParamsPolicy::default()
            .sanitize(br#"{"name": "work"}"#)
            .unwrap();
        assert_eq!(
            check_required(&params, RULES),
            Err(ParamError::MissingFields(
                "color is required tag id is required".to_string()
            ))
        );
    }
}
