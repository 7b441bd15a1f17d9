use std::sync::LazyLock;

use regex::Regex;

use crate::error::SheetNameError;

static LEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\s*[/-]\s*\d+)\s+(.+)$").expect("valid leading class pattern")
});

static TRAILING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+(\d+\s*[/-]\s*\d+)$").expect("valid trailing class pattern")
});

static EMBEDDED_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*[/-]\s*\d+").expect("valid embedded class pattern"));

// LMS exports: "اللغة العربية 03 1"
static SPACED_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+(\d{1,2}\s+\d{1,2})$").expect("valid spaced class pattern")
});

/// Splits a worksheet title into `(subject, class_label)`.
pub fn parse_sheet_name(raw: &str) -> Result<(String, String), SheetNameError> {
    let name = collapse_whitespace(raw);

    if let Some(caps) = LEADING_LABEL.captures(&name) {
        return finish(&name, &caps[2], &caps[1]);
    }
    if let Some(caps) = TRAILING_LABEL.captures(&name) {
        return finish(&name, &caps[1], &caps[2]);
    }
    if let Some(found) = EMBEDDED_LABEL.find(&name) {
        let subject = format!("{} {}", &name[..found.start()], &name[found.end()..]);
        return finish(&name, &subject, found.as_str());
    }
    if let Some(caps) = SPACED_LABEL.captures(&name) {
        return finish(&name, &caps[1], &caps[2]);
    }

    Err(SheetNameError::NoClassLabel(raw.to_string()))
}

fn finish(name: &str, subject: &str, label: &str) -> Result<(String, String), SheetNameError> {
    let subject = collapse_whitespace(subject);
    if subject.is_empty() {
        return Err(SheetNameError::MissingSubject(name.to_string()));
    }
    let label = if label.contains('/') || label.contains('-') {
        label.split_whitespace().collect::<String>()
    } else {
        collapse_whitespace(label)
    };
    Ok((subject, label))
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(name: &str) -> (String, String) {
        parse_sheet_name(name).unwrap()
    }

    #[test]
    fn leading_slash_label() {
        assert_eq!(parsed("03/1 Arabic"), ("Arabic".into(), "03/1".into()));
    }

    #[test]
    fn trailing_slash_label() {
        assert_eq!(parsed("Arabic 03/1"), ("Arabic".into(), "03/1".into()));
    }

    #[test]
    fn dash_label() {
        assert_eq!(parsed("03-1 Math"), ("Math".into(), "03-1".into()));
        assert_eq!(parsed("Math 03-1"), ("Math".into(), "03-1".into()));
    }

    #[test]
    fn multi_word_subjects_keep_their_spacing() {
        assert_eq!(
            parsed("10/2   اللغة   العربية"),
            ("اللغة العربية".into(), "10/2".into())
        );
        assert_eq!(
            parsed("Islamic Studies 03 / 1"),
            ("Islamic Studies".into(), "03/1".into())
        );
    }

    #[test]
    fn embedded_label() {
        assert_eq!(parsed("Science 05/3 B"), ("Science B".into(), "05/3".into()));
    }

    #[test]
    fn lms_spaced_label() {
        assert_eq!(
            parsed("اللغة العربية 03 1"),
            ("اللغة العربية".into(), "03 1".into())
        );
    }

    #[test]
    fn rejects_names_without_class_label() {
        assert_eq!(
            parse_sheet_name("Sheet1"),
            Err(SheetNameError::NoClassLabel("Sheet1".into()))
        );
        assert_eq!(
            parse_sheet_name("Arabic"),
            Err(SheetNameError::NoClassLabel("Arabic".into()))
        );
    }

    #[test]
    fn rejects_label_without_subject() {
        assert_eq!(
            parse_sheet_name("03/1"),
            Err(SheetNameError::MissingSubject("03/1".into()))
        );
    }
}
