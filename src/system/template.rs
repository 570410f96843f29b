//! `{{NAME}}` placeholder substitution for configured paths and command bytes.

/// Replace every `{{NAME}}` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{{{}}}}}", name), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_occurrences() {
        let out = render("/sys/port{{PORT}}/p{{PORT}}_{{FAN}}", &[("PORT", "7"), ("FAN", "2")]);
        assert_eq!(out, "/sys/port7/p7_2");
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        assert_eq!(render("0x30 {{SPEED_HEX}}", &[("PORT", "1")]), "0x30 {{SPEED_HEX}}");
    }
}
